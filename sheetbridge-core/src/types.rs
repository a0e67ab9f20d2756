//! Core types shared across the Sheetbridge crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Definition of a tool exposed to MCP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

/// How much a tool can change remote state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Reads only.
    #[default]
    ReadOnly,
    /// Writes cell values or tab layout.
    Write,
    /// Removes a spreadsheet or tab.
    Destructive,
}

impl RiskLevel {
    pub fn is_read_only(self) -> bool {
        self == RiskLevel::ReadOnly
    }

    pub fn is_destructive(self) -> bool {
        self == RiskLevel::Destructive
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::ReadOnly => write!(f, "read_only"),
            RiskLevel::Write => write!(f, "write"),
            RiskLevel::Destructive => write!(f, "destructive"),
        }
    }
}

/// The output of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolOutput {
    /// Create a simple text output.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Render a JSON value as pretty-printed text.
    pub fn json(value: &serde_json::Value) -> Self {
        let content = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(content)
    }

    /// Create an error output.
    pub fn error(message: impl Into<String>) -> Self {
        let mut output = Self::text(message);
        output
            .metadata
            .insert("is_error".into(), serde_json::Value::Bool(true));
        output
    }

    pub fn is_error(&self) -> bool {
        self.metadata
            .get("is_error")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
