//! MCP request handlers: routes JSON-RPC requests to the appropriate handler.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use sheetbridge_tools::registry::ToolRegistry;

use crate::error::McpError;
use crate::prompts;
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, InitializeParams, InitializeResult,
    ListChangedCapability, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, MCP_PROTOCOL_VERSION, McpTool, ReadResourceParams, ReadResourceResult,
    ResourcesCapability, ServerCapabilities, ServerInfo, TextContent,
};
use crate::resources::SheetResources;

/// Handles MCP requests by delegating to the tool registry, the sheet
/// resources, and the prompt catalog.
///
/// Clones share the initialized flag, so a clone can serve a request on
/// another task.
#[derive(Clone)]
pub struct RequestHandler {
    tool_registry: Arc<ToolRegistry>,
    resources: SheetResources,
    initialized: Arc<AtomicBool>,
    server_info: ServerInfo,
}

fn to_result<T: Serialize>(value: T, what: &str) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError {
        message: format!("Failed to serialize {}: {}", what, e),
    })
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, McpError> {
    serde_json::from_value(params)
        .map_err(|e| McpError::invalid_params(format!("Invalid {} params: {}", method, e)))
}

impl RequestHandler {
    pub fn new(
        tool_registry: Arc<ToolRegistry>,
        resources: SheetResources,
        server_info: ServerInfo,
    ) -> Self {
        Self {
            tool_registry,
            resources,
            initialized: Arc::new(AtomicBool::new(false)),
            server_info,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn require_initialized(&self) -> Result<(), McpError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(McpError::NotInitialized)
        }
    }

    /// Handle the `initialize` request.
    pub fn handle_initialize(&self, params: InitializeParams) -> Result<Value, McpError> {
        info!(
            client = %params.client_info.name,
            client_version = ?params.client_info.version,
            protocol_version = %params.protocol_version,
            "MCP client connecting"
        );

        self.initialized.store(true, Ordering::Release);

        to_result(
            InitializeResult {
                protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ListChangedCapability {
                        list_changed: Some(false),
                    }),
                    resources: Some(ResourcesCapability {
                        subscribe: Some(false),
                        list_changed: Some(false),
                    }),
                    prompts: Some(ListChangedCapability {
                        list_changed: Some(false),
                    }),
                },
                server_info: self.server_info.clone(),
            },
            "initialize result",
        )
    }

    /// Handle the `tools/list` request.
    pub fn handle_tools_list(&self) -> Result<Value, McpError> {
        self.require_initialized()?;

        let tools: Vec<McpTool> = self
            .tool_registry
            .list_definitions()
            .into_iter()
            .map(|def| McpTool {
                name: def.name,
                description: Some(def.description),
                input_schema: def.parameters,
            })
            .collect();

        debug!(count = tools.len(), "Listing tools");
        to_result(ListToolsResult { tools }, "tools list")
    }

    /// Handle the `tools/call` request.
    ///
    /// Tool failures become JSON-RPC errors; the spreadsheet error kind picks
    /// the code.
    pub async fn handle_tools_call(&self, params: CallToolParams) -> Result<Value, McpError> {
        self.require_initialized()?;

        let tool_name = &params.name;
        let arguments = match params.arguments {
            Some(Value::Null) | None => json!({}),
            Some(args) => args,
        };

        info!(tool = %tool_name, "Calling tool via MCP");

        match self.tool_registry.execute(tool_name, arguments).await {
            Ok(output) => {
                let is_error = output.is_error();
                to_result(
                    CallToolResult {
                        content: vec![TextContent::new(output.content)],
                        is_error: is_error.then_some(true),
                    },
                    "tool result",
                )
            }
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Tool execution failed");
                Err(e.into())
            }
        }
    }

    pub fn handle_resources_list(&self) -> Result<Value, McpError> {
        self.require_initialized()?;
        to_result(
            ListResourcesResult {
                resources: self.resources.list_resources(),
            },
            "resources list",
        )
    }

    pub fn handle_resource_templates_list(&self) -> Result<Value, McpError> {
        self.require_initialized()?;
        to_result(
            ListResourceTemplatesResult {
                resource_templates: self.resources.list_templates(),
            },
            "resource templates",
        )
    }

    pub async fn handle_resources_read(&self, params: ReadResourceParams) -> Result<Value, McpError> {
        self.require_initialized()?;
        let contents = self.resources.read_resource(&params.uri).await?;
        to_result(ReadResourceResult { contents }, "resource contents")
    }

    pub fn handle_prompts_list(&self) -> Result<Value, McpError> {
        self.require_initialized()?;
        to_result(
            ListPromptsResult {
                prompts: prompts::list_prompts(),
            },
            "prompts list",
        )
    }

    pub fn handle_prompts_get(&self, params: GetPromptParams) -> Result<Value, McpError> {
        self.require_initialized()?;
        debug!(prompt = %params.name, "Rendering prompt");
        to_result(prompts::get_prompt(&params.name, &params.arguments)?, "prompt")
    }

    /// Route a JSON-RPC method to the appropriate handler.
    pub async fn route(&self, method: &str, params: Value) -> Result<Value, McpError> {
        match method {
            "initialize" => {
                let init_params: InitializeParams = parse_params(method, params)?;
                self.handle_initialize(init_params)
            }
            "notifications/initialized" => {
                info!("MCP client initialized successfully");
                Ok(Value::Null)
            }
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => {
                let call_params: CallToolParams = parse_params(method, params)?;
                self.handle_tools_call(call_params).await
            }
            "resources/list" => self.handle_resources_list(),
            "resources/templates/list" => self.handle_resource_templates_list(),
            "resources/read" => {
                let read_params: ReadResourceParams = parse_params(method, params)?;
                self.handle_resources_read(read_params).await
            }
            "prompts/list" => self.handle_prompts_list(),
            "prompts/get" => {
                let get_params: GetPromptParams = parse_params(method, params)?;
                self.handle_prompts_get(get_params)
            }
            _ if method.starts_with("notifications/") => {
                debug!(method, "Ignoring notification");
                Ok(Value::Null)
            }
            _ => Err(McpError::method_not_found(method)),
        }
    }
}
