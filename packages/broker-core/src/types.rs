// ABOUTME: Shared domain types for the sandbox broker
// ABOUTME: User, Sandbox, Install Record and Published File as defined in the data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. Id and username are unique; api_key is unique and
/// opaque. Created at registration; mutated only by password change or key
/// regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl User {
    /// The public view returned by `GET /api/users/me` — no password hash,
    /// no api key.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Persistent record of a sandbox: its opaque id, owning user, the bound
/// container id, and activity timestamps.
///
/// `id` is server-minted and globally unique. `container_id` is the runtime's
/// handle and may differ from `id` (see DESIGN.md: sandbox id vs container
/// id). Every sandbox in the registry MUST have a container_id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sandbox {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub container_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// The shape returned to clients by `list_sandboxes`/`create_sandbox`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxView {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Sandbox> for SandboxView {
    fn from(s: &Sandbox) -> Self {
        SandboxView {
            id: s.id.clone(),
            name: s.name.clone(),
            created_at: s.created_at,
        }
    }
}

/// Status of an in-flight or completed package installation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Installing,
    Success,
    Failed,
}

impl InstallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstallStatus::Success | InstallStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallStatus::Installing => "installing",
            InstallStatus::Success => "success",
            InstallStatus::Failed => "failed",
        }
    }
}

/// In-memory per (sandbox_id, package_name) install status. Lifetime: created
/// when `install_package` is first invoked for that pair, overwritten on
/// re-invocation, dropped when the sandbox is reaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRecord {
    pub record_id: String,
    pub sandbox_id: String,
    pub package: String,
    pub status: InstallStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

/// A host-side file produced by a sandbox execution and exposed at a stable
/// URL. Keyed by (sandbox_id, relative_path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedFile {
    pub sandbox_id: String,
    pub relative_path: String,
    pub on_host_absolute_path: String,
    pub created_at: DateTime<Utc>,
}

impl PublishedFile {
    /// URL form: `/sandbox/file/{sandbox_id}/{relative_path}`.
    pub fn url(&self) -> String {
        format!(
            "/sandbox/file/{}/{}",
            self.sandbox_id,
            percent_encode_path(&self.relative_path)
        )
    }
}

fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(percent_encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn percent_encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
