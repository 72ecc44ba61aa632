// ABOUTME: Routes a named tool call + typed/validated arguments to the Execution Coordinator
// ABOUTME: the single chokepoint both the REST API and the MCP transport call through

use broker_core::{BrokerError, Result};
use broker_coordinator::Coordinator;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::types::*;

/// Dispatches one named Tool Surface operation. `arguments` is the raw JSON
/// body of the call; it is parsed into the operation's typed request with
/// unknown fields rejected before the Coordinator ever sees it.
pub async fn dispatch(
    tool_name: &str,
    arguments: Value,
    user_id: &str,
    coordinator: &Coordinator,
) -> Result<Value> {
    debug!(tool = %tool_name, user_id = %user_id, "dispatching tool call");

    match tool_name {
        "create_sandbox" => {
            let req: CreateSandboxRequest = parse_arguments(arguments)?;
            let sandbox = coordinator.create_sandbox(user_id, req.name).await?;
            to_value(CreateSandboxResponse { id: sandbox.id })
        }

        "list_sandboxes" => {
            let sandboxes = coordinator.list_sandboxes(user_id).await?;
            let sandboxes = sandboxes
                .into_iter()
                .map(|s| SandboxSummary {
                    id: s.id,
                    name: s.name,
                    created_at: s.created_at,
                })
                .collect();
            to_value(ListSandboxesResponse { sandboxes })
        }

        "delete_sandbox" => {
            let req: DeleteSandboxRequest = parse_arguments(arguments)?;
            coordinator.delete_sandbox(user_id, &req.id).await?;
            to_value(DeleteSandboxResponse { ok: true })
        }

        "execute_python_code" => {
            let req: ExecutePythonCodeRequest = parse_arguments(arguments)?;
            let outcome = coordinator
                .execute_code(user_id, &req.sandbox_id, &req.code)
                .await?;
            to_value(ExecutePythonCodeResponse {
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                file_links: outcome.file_links,
            })
        }

        "install_package_in_sandbox" => {
            let req: InstallPackageRequest = parse_arguments(arguments)?;
            let outcome = coordinator
                .install_package(user_id, &req.sandbox_id, &req.package_name)
                .await?;
            to_value(InstallPackageResponse {
                status: outcome.status.as_str(),
                record_id: outcome.record_id,
            })
        }

        "check_package_installation_status" => {
            let req: CheckPackageStatusRequest = parse_arguments(arguments)?;
            let outcome = coordinator
                .check_package_status(user_id, &req.sandbox_id, &req.package_name)
                .await?;
            let detail = if outcome.stderr_tail.is_empty() {
                outcome.stdout_tail
            } else {
                format!("{}\n{}", outcome.stdout_tail, outcome.stderr_tail)
            };
            to_value(CheckPackageStatusResponse {
                status: outcome.status.as_str(),
                detail,
            })
        }

        "execute_terminal_command" => {
            let req: ExecuteTerminalCommandRequest = parse_arguments(arguments)?;
            let outcome = coordinator
                .execute_terminal(user_id, &req.sandbox_id, &req.command)
                .await?;
            to_value(ExecuteTerminalCommandResponse {
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exit_code: outcome.exit_code,
            })
        }

        "upload_file_to_sandbox" => {
            let req: UploadFileRequest = parse_arguments(arguments)?;
            let outcome = coordinator
                .upload_file(
                    user_id,
                    &req.sandbox_id,
                    &req.local_file_path,
                    req.dest_path.as_deref(),
                )
                .await?;
            to_value(UploadFileResponse {
                path_in_container: outcome.path_in_container,
            })
        }

        other => Err(BrokerError::invalid_argument(format!("unknown tool: {other}"))),
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| BrokerError::invalid_argument(format!("invalid arguments: {e}")))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| BrokerError::internal(anyhow::anyhow!(e)))
}
