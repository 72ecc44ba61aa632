// ABOUTME: broker-driver — the Container Driver: the only crate that names the container runtime

pub mod docker;
pub mod driver;
pub mod error;
pub mod types;

mod tar_util;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use docker::DockerDriver;
pub use driver::ContainerDriver;
pub use error::{DriverError, Result};
pub use types::{DirEntry, ExecOutput};
