// ABOUTME: broker-files — the File Publisher: maps on-host result files to stable HTTP-fetchable URLs

pub mod error;
pub mod path_safety;
pub mod publisher;

pub use error::{FilesError, Result};
pub use publisher::FilePublisher;
