// ABOUTME: Tool Surface catalog — the schema descriptions served by `tools/list` over MCP
// ABOUTME: mirrors packages/mcp-server's Tool/ToolInputSchema shape

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolInputSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    pub properties: HashMap<String, ToolInputSchemaProperty>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchemaProperty {
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
}

fn property(type_name: &str, description: &str) -> ToolInputSchemaProperty {
    ToolInputSchemaProperty {
        type_name: type_name.to_string(),
        description: description.to_string(),
    }
}

fn schema(
    properties: Vec<(&str, ToolInputSchemaProperty)>,
    required: Vec<&str>,
) -> ToolInputSchema {
    ToolInputSchema {
        type_name: "object".to_string(),
        properties: properties
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        required: required.into_iter().map(str::to_string).collect(),
    }
}

/// The full set of named operations the broker exposes, identical over
/// REST and MCP. Every entry here must have a matching arm in
/// [`crate::dispatch::dispatch`].
pub fn catalog() -> Vec<Tool> {
    vec![
        Tool {
            name: "create_sandbox".to_string(),
            description: "Provision a new isolated Python execution environment".to_string(),
            input_schema: schema(
                vec![("name", property("string", "Optional display name for the sandbox"))],
                vec![],
            ),
        },
        Tool {
            name: "list_sandboxes".to_string(),
            description: "List the sandboxes owned by the caller".to_string(),
            input_schema: schema(vec![], vec![]),
        },
        Tool {
            name: "delete_sandbox".to_string(),
            description: "Tear down a sandbox and its container".to_string(),
            input_schema: schema(
                vec![("id", property("string", "Sandbox id to delete"))],
                vec!["id"],
            ),
        },
        Tool {
            name: "execute_python_code".to_string(),
            description: "Run Python source inside a sandbox and return stdout/stderr plus any produced file URLs".to_string(),
            input_schema: schema(
                vec![
                    ("sandbox_id", property("string", "Target sandbox id")),
                    ("code", property("string", "Python source to execute")),
                ],
                vec!["sandbox_id", "code"],
            ),
        },
        Tool {
            name: "install_package_in_sandbox".to_string(),
            description: "Start an asynchronous package install inside a sandbox".to_string(),
            input_schema: schema(
                vec![
                    ("sandbox_id", property("string", "Target sandbox id")),
                    ("package_name", property("string", "Package name to install")),
                ],
                vec!["sandbox_id", "package_name"],
            ),
        },
        Tool {
            name: "check_package_installation_status".to_string(),
            description: "Poll the status of a previously started package install".to_string(),
            input_schema: schema(
                vec![
                    ("sandbox_id", property("string", "Target sandbox id")),
                    ("package_name", property("string", "Package name to check")),
                ],
                vec!["sandbox_id", "package_name"],
            ),
        },
        Tool {
            name: "execute_terminal_command".to_string(),
            description: "Run a single shell command inside a sandbox".to_string(),
            input_schema: schema(
                vec![
                    ("sandbox_id", property("string", "Target sandbox id")),
                    ("command", property("string", "Shell command to run")),
                ],
                vec!["sandbox_id", "command"],
            ),
        },
        Tool {
            name: "upload_file_to_sandbox".to_string(),
            description: "Copy a host-side file into a sandbox's filesystem".to_string(),
            input_schema: schema(
                vec![
                    ("sandbox_id", property("string", "Target sandbox id")),
                    ("local_file_path", property("string", "Path of the file on the host")),
                    ("dest_path", property("string", "Destination directory inside the sandbox, defaults to /app/results")),
                ],
                vec!["sandbox_id", "local_file_path"],
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_all_eight_named_operations() {
        let names: Vec<&str> = catalog().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "create_sandbox",
                "list_sandboxes",
                "delete_sandbox",
                "execute_python_code",
                "install_package_in_sandbox",
                "check_package_installation_status",
                "execute_terminal_command",
                "upload_file_to_sandbox",
            ]
        );
    }

    #[test]
    fn execute_python_code_requires_sandbox_id_and_code() {
        let tool = catalog()
            .into_iter()
            .find(|t| t.name == "execute_python_code")
            .unwrap();
        assert_eq!(tool.input_schema.required, vec!["sandbox_id", "code"]);
    }
}
