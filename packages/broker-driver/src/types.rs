// ABOUTME: Types exchanged across the Container Driver capability surface

use std::collections::HashMap;

/// Result of a single `exec` call. Stdout/stderr are captured up to `CAP_BYTES`
/// and truncated with a sentinel if the process produced more.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub const OUTPUT_CAP_BYTES: usize = 1024 * 1024;
const TRUNCATION_SENTINEL: &[u8] = b"\n...[truncated]...\n";

pub(crate) fn cap_output(mut buf: Vec<u8>) -> Vec<u8> {
    if buf.len() > OUTPUT_CAP_BYTES {
        buf.truncate(OUTPUT_CAP_BYTES);
        buf.extend_from_slice(TRUNCATION_SENTINEL);
    }
    buf
}

/// One entry in a container directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub mtime: i64,
}

/// Labels attached to a created container; used for bookkeeping/inspection,
/// never interpreted by the driver itself.
pub type Labels = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_output_leaves_small_buffers_untouched() {
        let buf = b"hello".to_vec();
        assert_eq!(cap_output(buf.clone()), buf);
    }

    #[test]
    fn cap_output_truncates_oversized_buffers() {
        let buf = vec![b'a'; OUTPUT_CAP_BYTES + 100];
        let capped = cap_output(buf);
        assert!(capped.len() < OUTPUT_CAP_BYTES + 100);
        assert!(capped.ends_with(TRUNCATION_SENTINEL));
    }
}
