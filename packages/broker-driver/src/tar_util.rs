// ABOUTME: tar archive helpers for the Docker copy-in/copy-out surface
// ABOUTME: grounded on packages/sandbox's create_tar_archive/extract_tar_archive helpers

use std::io;
use tar::{Archive, Builder, Header};

use crate::types::DirEntry;

/// Builds a single-file tar archive in memory, suitable for
/// `upload_to_container`.
pub fn write_tar_entries(name: &str, bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, bytes)?;
    builder.into_inner()
}

/// Reads the bytes of the first regular file entry out of a tar archive
/// downloaded from a container. Returns `None` if the archive contains no
/// regular file (the path didn't exist).
pub fn read_bytes_as_tar(tar_bytes: &[u8]) -> io::Result<Option<Vec<u8>>> {
    let mut archive = Archive::new(tar_bytes);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type().is_file() {
            let mut buf = Vec::new();
            io::Read::read_to_end(&mut entry, &mut buf)?;
            return Ok(Some(buf));
        }
    }
    Ok(None)
}

/// Lists the immediate file/dir entries in a tar archive downloaded from a
/// container directory.
pub fn list_tar_entries(tar_bytes: &[u8]) -> io::Result<Vec<DirEntry>> {
    let mut archive = Archive::new(tar_bytes);
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        let path = entry.path()?.to_string_lossy().into_owned();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&path)
            .to_string();
        if name.is_empty() {
            continue;
        }
        entries.push(DirEntry {
            name,
            size: header.size().unwrap_or(0),
            mtime: header.mtime().unwrap_or(0) as i64,
        });
    }
    Ok(entries)
}
