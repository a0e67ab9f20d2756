//! Tool definition macro: the boilerplate shared by every spreadsheet tool.
//!
//! # Usage
//!
//! ```rust,ignore
//! sheet_tool!(
//!     ClearRangeTool,
//!     "clear_range",
//!     "Clear all values in a range.",
//!     Write,
//!     serde_json::json!({
//!         "type": "object",
//!         "properties": {
//!             "sheetId": { "type": "string" },
//!             "range": { "type": "string" }
//!         },
//!         "required": ["sheetId", "range"]
//!     }),
//!     |service, args: ClearRangeArgs| {
//!         service.clear_range(&args.sheet_id, &args.range).await?;
//!         Ok(json!({ "success": true }))
//!     }
//! );
//! ```

/// Define a tool backed by the shared [`SheetsService`](crate::sheets::SheetsService).
///
/// Generates:
/// - A struct holding an `Arc<SheetsService>`, plus `new()`
/// - `#[async_trait]` impl of `crate::registry::Tool`
/// - Argument decoding into `$req` (failures become `ToolError::InvalidArguments`)
/// - Result rendering as pretty JSON, with `SheetsError` wrapped in `ToolError::Sheets`
///
/// The body is evaluated in an async block and must produce
/// `Result<serde_json::Value, SheetsError>`, so `?` works on service calls.
macro_rules! sheet_tool {
    (
        $name:ident,
        $tool_name:expr,
        $desc:expr,
        $risk:ident,
        $schema:expr,
        |$service:ident, $args:ident : $req:ty| $body:expr
    ) => {
        pub struct $name {
            service: std::sync::Arc<$crate::sheets::SheetsService>,
        }

        impl $name {
            pub fn new(service: std::sync::Arc<$crate::sheets::SheetsService>) -> Self {
                Self { service }
            }
        }

        #[async_trait::async_trait]
        impl $crate::registry::Tool for $name {
            fn name(&self) -> &str {
                $tool_name
            }

            fn description(&self) -> &str {
                $desc
            }

            fn parameters_schema(&self) -> serde_json::Value {
                $schema
            }

            fn risk_level(&self) -> sheetbridge_core::types::RiskLevel {
                sheetbridge_core::types::RiskLevel::$risk
            }

            async fn execute(
                &self,
                raw_args: serde_json::Value,
            ) -> Result<sheetbridge_core::types::ToolOutput, sheetbridge_core::error::ToolError>
            {
                let $args: $req = $crate::sheet_tools::decode_args($tool_name, raw_args)?;
                let $service: &$crate::sheets::SheetsService = &self.service;
                let result: Result<serde_json::Value, sheetbridge_core::error::SheetsError> =
                    async { $body }.await;
                result
                    .map(|value| sheetbridge_core::types::ToolOutput::json(&value))
                    .map_err(|source| sheetbridge_core::error::ToolError::Sheets {
                        name: $tool_name.to_string(),
                        source,
                    })
            }
        }
    };
}
