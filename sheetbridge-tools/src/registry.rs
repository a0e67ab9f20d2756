//! Tool registry: manages tool registration, argument validation, and execution.
//!
//! Tools are registered at startup. The registry keeps registration order so
//! `tools/list` is stable, validates call arguments against each tool's JSON
//! Schema before dispatch, and applies the tool's timeout.

use async_trait::async_trait;
use sheetbridge_core::error::ToolError;
use sheetbridge_core::types::{RiskLevel, ToolDefinition, ToolOutput};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tool timeout unless a tool overrides [`Tool::timeout`].
///
/// Generous because the first call may wait on an interactive login.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// The risk level of this tool.
    fn risk_level(&self) -> RiskLevel;

    /// Maximum execution time before timeout.
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }
}

struct Entry {
    tool: Arc<dyn Tool>,
    validator: Option<jsonschema::Validator>,
}

/// The tool registry holds all registered tools and handles execution.
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Returns error if a tool with the same name is already registered.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered { name });
        }

        let validator = match jsonschema::validator_for(&tool.parameters_schema()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool schema does not compile, arguments will not be validated");
                None
            }
        };

        debug!(tool = %name, "Registering tool");
        self.order.push(name.clone());
        self.tools.insert(name, Entry { tool, validator });
        Ok(())
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> Result<(), ToolError> {
        if self.tools.remove(name).is_none() {
            return Err(ToolError::NotFound {
                name: name.to_string(),
            });
        }
        self.order.retain(|n| n != name);
        debug!(tool = %name, "Unregistered tool");
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.tool.clone())
    }

    /// All tool definitions, in registration order.
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.ordered()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
                risk_level: tool.risk_level(),
            })
            .collect()
    }

    /// All tool names, in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check `args` against the tool's schema.
    pub fn validate(&self, name: &str, args: &serde_json::Value) -> Result<(), ToolError> {
        let entry = self.tools.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        let Some(ref validator) = entry.validator else {
            return Ok(());
        };

        let problems: Vec<String> = validator
            .iter_errors(args)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidArguments {
                name: name.to_string(),
                reason: problems.join("; "),
            })
        }
    }

    /// Execute a tool by name with the given arguments, applying validation and timeout.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let entry = self.tools.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        self.validate(name, &args)?;

        let timeout = entry.tool.timeout();
        info!(tool = %name, risk = %entry.tool.risk_level(), "Executing tool");

        match tokio::time::timeout(timeout, entry.tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                name: name.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|entry| &entry.tool))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    /// Configurable stand-in for a sheet tool.
    struct FakeTool {
        name: &'static str,
        schema: serde_json::Value,
        risk: RiskLevel,
        stall: Option<Duration>,
    }

    impl FakeTool {
        /// Reads a tab: requires `sheetId`, optional positive `limit`.
        fn reader() -> Self {
            Self {
                name: "read_tab",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "sheetId": { "type": "string", "minLength": 1 },
                        "limit": { "type": "integer", "minimum": 1 }
                    },
                    "required": ["sheetId"]
                }),
                risk: RiskLevel::ReadOnly,
                stall: None,
            }
        }

        fn named(name: &'static str, risk: RiskLevel) -> Self {
            Self {
                name,
                schema: json!({ "type": "object" }),
                risk,
                stall: None,
            }
        }

        /// Never finishes within its 100ms budget, like a login nobody completes.
        fn stalled() -> Self {
            Self {
                stall: Some(Duration::from_secs(60)),
                ..Self::named("stalled", RiskLevel::Write)
            }
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            self.schema.clone()
        }

        async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            let sheet = args["sheetId"].as_str().unwrap_or("-");
            Ok(ToolOutput::text(format!("{} read {}", self.name, sheet)))
        }

        fn risk_level(&self) -> RiskLevel {
            self.risk
        }

        fn timeout(&self) -> Duration {
            match self.stall {
                Some(_) => Duration::from_millis(100),
                None => DEFAULT_TOOL_TIMEOUT,
            }
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.list_definitions().is_empty());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        assert_ok!(registry.register(Arc::new(FakeTool::reader())));

        match assert_err!(registry.register(Arc::new(FakeTool::reader()))) {
            ToolError::AlreadyRegistered { name } => assert_eq!(name, "read_tab"),
            e => panic!("Expected AlreadyRegistered, got: {:?}", e),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_forgets_name_and_order() {
        let mut registry = ToolRegistry::new();
        assert_ok!(registry.register(Arc::new(FakeTool::reader())));
        assert_ok!(registry.unregister("read_tab"));
        assert!(registry.get("read_tab").is_none());
        assert!(registry.list_names().is_empty());
        assert_err!(registry.unregister("read_tab"));
    }

    #[test]
    fn test_listing_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        for (name, risk) in [
            ("zeta", RiskLevel::Destructive),
            ("alpha", RiskLevel::ReadOnly),
            ("mid", RiskLevel::Write),
        ] {
            assert_ok!(registry.register(Arc::new(FakeTool::named(name, risk))));
        }
        assert_eq!(registry.list_names(), vec!["zeta", "alpha", "mid"]);

        let defs = registry.list_definitions();
        let listed: Vec<(&str, RiskLevel)> =
            defs.iter().map(|d| (d.name.as_str(), d.risk_level)).collect();
        assert_eq!(
            listed,
            vec![
                ("zeta", RiskLevel::Destructive),
                ("alpha", RiskLevel::ReadOnly),
                ("mid", RiskLevel::Write),
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_passes_validated_args() {
        let mut registry = ToolRegistry::new();
        assert_ok!(registry.register(Arc::new(FakeTool::reader())));

        let output = assert_ok!(
            registry
                .execute("read_tab", json!({ "sheetId": "abc", "limit": 5 }))
                .await
        );
        assert_eq!(output.content, "read_tab read abc");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        match assert_err!(registry.execute("missing", json!({})).await) {
            ToolError::NotFound { name } => assert_eq!(name, "missing"),
            e => panic!("Expected NotFound, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_execute_rejects_schema_violations() {
        let mut registry = ToolRegistry::new();
        assert_ok!(registry.register(Arc::new(FakeTool::reader())));

        match assert_err!(registry.execute("read_tab", json!({})).await) {
            ToolError::InvalidArguments { name, reason } => {
                assert_eq!(name, "read_tab");
                assert!(reason.contains("sheetId"), "reason: {}", reason);
            }
            e => panic!("Expected InvalidArguments, got: {:?}", e),
        }

        let err = assert_err!(
            registry
                .execute("read_tab", json!({ "sheetId": "abc", "limit": 0 }))
                .await
        );
        match err {
            ToolError::InvalidArguments { reason, .. } => assert!(reason.contains("/limit")),
            e => panic!("Expected InvalidArguments, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let mut registry = ToolRegistry::new();
        assert_ok!(registry.register(Arc::new(FakeTool::stalled())));

        match assert_err!(registry.execute("stalled", json!({})).await) {
            ToolError::Timeout { name, timeout_secs } => {
                assert_eq!(name, "stalled");
                assert_eq!(timeout_secs, 0);
            }
            e => panic!("Expected Timeout, got: {:?}", e),
        }
    }
}
