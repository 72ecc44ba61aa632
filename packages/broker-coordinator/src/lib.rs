// ABOUTME: broker-coordinator — the Execution Coordinator: per-sandbox serialization,
// ABOUTME: result-file diffing and the Install Record lifecycle

pub mod coordinator;
pub mod install;
pub mod locks;

pub use coordinator::{
    Coordinator, ExecuteCodeOutcome, ExecuteTerminalOutcome, InstallOutcome, InstallStatusOutcome,
    UploadOutcome,
};
pub use install::InstallTable;
pub use locks::SandboxLocks;
