// ABOUTME: broker-reaper — periodic idle-sandbox teardown, file pruning and I1 reconciliation

pub mod reaper;

pub use reaper::Reaper;
