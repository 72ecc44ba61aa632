// ABOUTME: Typed request/response bodies for the 8 named Tool Surface operations
// ABOUTME: shared verbatim by the REST API and the MCP transport; unknown fields are rejected

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSandboxRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSandboxResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSummary {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSandboxesResponse {
    pub sandboxes: Vec<SandboxSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteSandboxRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSandboxResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutePythonCodeRequest {
    pub sandbox_id: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutePythonCodeResponse {
    pub stdout: String,
    pub stderr: String,
    pub file_links: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallPackageRequest {
    pub sandbox_id: String,
    pub package_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallPackageResponse {
    pub status: &'static str,
    pub record_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckPackageStatusRequest {
    pub sandbox_id: String,
    pub package_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckPackageStatusResponse {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteTerminalCommandRequest {
    pub sandbox_id: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteTerminalCommandResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadFileRequest {
    pub sandbox_id: String,
    pub local_file_path: String,
    pub dest_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFileResponse {
    pub path_in_container: String,
}
