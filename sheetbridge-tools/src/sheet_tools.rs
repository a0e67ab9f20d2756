//! The spreadsheet tools exposed over MCP.
//!
//! Each tool decodes its camelCase arguments, calls one [`SheetsService`]
//! operation, and returns the result as pretty-printed JSON text.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

use sheetbridge_core::error::ToolError;

use crate::registry::Tool;
use crate::sheets::{
    AddSheetTabRequest, AppendValuesRequest, BatchUpdateRequest, CreateSheetRequest,
    FindSheetsRequest, SheetsService, UpdateSheetRequest,
};

/// Decode tool arguments into a typed request.
pub(crate) fn decode_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    // Clients may omit `arguments` entirely for tools with no required fields.
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        name: tool.to_string(),
        reason: e.to_string(),
    })
}

fn success(message: &str) -> Value {
    json!({ "success": true, "message": message })
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// ── Argument shapes for single-field tools ──────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetIdArgs {
    pub sheet_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRangeArgs {
    pub sheet_id: String,
    #[serde(default)]
    pub range: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRangeArgs {
    pub sheet_id: String,
    pub range: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetArgs {
    pub sheet_id: String,
    pub ranges: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabArgs {
    pub sheet_id: String,
    pub tab_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTabArgs {
    pub sheet_id: String,
    pub tab_id: i64,
    pub new_title: String,
}

fn sheet_id_property(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

fn rows_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "description": description,
        "items": { "type": "array", "items": { "type": "string" } }
    })
}

fn value_input_option_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["RAW", "USER_ENTERED"],
        "description": "How to interpret input. USER_ENTERED parses formulas.",
        "default": "RAW"
    })
}

// ── Read tools ──────────────────────────────────────────────────────────────

sheet_tool!(
    FindSheetsTool,
    "find_sheets",
    "Search for Google Sheets in Google Drive",
    ReadOnly,
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "Search query to filter sheets by name" },
            "maxResults": {
                "type": "integer",
                "minimum": 1,
                "maximum": 100,
                "default": 10,
                "description": "Maximum results (1-100)"
            },
            "orderBy": {
                "type": "string",
                "enum": ["name", "createdTime", "modifiedTime"],
                "default": "modifiedTime",
                "description": "Sort field"
            }
        }
    }),
    |service, args: FindSheetsRequest| {
        let sheets = service.find_sheets(&args).await?;
        Ok(to_json(&sheets))
    }
);

sheet_tool!(
    GetSheetDataTool,
    "get_sheet_data",
    "Retrieve data from a Google Sheet",
    ReadOnly,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "range": {
                "type": "string",
                "description": "The range to read (e.g., A1:C10). Defaults to A1:Z1000"
            }
        },
        "required": ["sheetId"]
    }),
    |service, args: SheetRangeArgs| {
        let data = service
            .get_sheet_data(&args.sheet_id, args.range.as_deref())
            .await?;
        Ok(to_json(&data))
    }
);

sheet_tool!(
    BatchGetTool,
    "batch_get",
    "Read multiple ranges from a Google Sheet in a single API call",
    ReadOnly,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "ranges": {
                "type": "array",
                "minItems": 1,
                "description": "Array of ranges to read",
                "items": { "type": "string" }
            }
        },
        "required": ["sheetId", "ranges"]
    }),
    |service, args: BatchGetArgs| {
        let data = service.batch_get(&args.sheet_id, &args.ranges).await?;
        Ok(to_json(&data))
    }
);

sheet_tool!(
    GetSpreadsheetInfoTool,
    "get_spreadsheet_info",
    "Get full spreadsheet metadata: tabs, properties, named ranges",
    ReadOnly,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet")
        },
        "required": ["sheetId"]
    }),
    |service, args: SheetIdArgs| {
        let info = service.get_spreadsheet_info(&args.sheet_id).await?;
        Ok(to_json(&info))
    }
);

// ── Write tools ─────────────────────────────────────────────────────────────

sheet_tool!(
    CreateSheetTool,
    "create_sheet",
    "Create a new Google Sheet",
    Write,
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "minLength": 1, "description": "The title of the new sheet" },
            "sheets": {
                "type": "array",
                "description": "Sheet tabs to create",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "rowCount": { "type": "integer", "minimum": 1, "default": 1000 },
                        "columnCount": { "type": "integer", "minimum": 1, "default": 26 }
                    },
                    "required": ["name"]
                }
            }
        },
        "required": ["title"]
    }),
    |service, args: CreateSheetRequest| {
        let metadata = service.create_sheet(&args).await?;
        Ok(to_json(&metadata))
    }
);

sheet_tool!(
    UpdateSheetTool,
    "update_sheet",
    "Update data in a Google Sheet",
    Write,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "range": { "type": "string", "description": "The range to update (e.g., A1:C10)" },
            "values": rows_schema("Array of rows"),
            "majorDimension": { "type": "string", "enum": ["ROWS", "COLUMNS"], "default": "ROWS" },
            "valueInputOption": value_input_option_schema()
        },
        "required": ["sheetId", "range", "values"]
    }),
    |service, args: UpdateSheetRequest| {
        service.update_sheet(&args).await?;
        Ok(success("Sheet updated successfully"))
    }
);

sheet_tool!(
    AppendValuesTool,
    "append_values",
    "Append rows to a Google Sheet without needing to know the last row",
    Write,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "range": { "type": "string", "description": "Target range (e.g., Sheet1!A:A)" },
            "values": rows_schema("Array of rows to append"),
            "valueInputOption": value_input_option_schema()
        },
        "required": ["sheetId", "range", "values"]
    }),
    |service, args: AppendValuesRequest| {
        service.append_values(&args).await?;
        Ok(success("Values appended successfully"))
    }
);

sheet_tool!(
    ClearRangeTool,
    "clear_range",
    "Clear cell contents in a range without deleting the sheet structure",
    Write,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "range": { "type": "string", "description": "Range to clear (e.g., A1:C10)" }
        },
        "required": ["sheetId", "range"]
    }),
    |service, args: ClearRangeArgs| {
        service.clear_range(&args.sheet_id, &args.range).await?;
        Ok(success("Range cleared successfully"))
    }
);

sheet_tool!(
    BatchUpdateTool,
    "batch_update",
    "Write to multiple ranges in a Google Sheet in a single API call",
    Write,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "data": {
                "type": "array",
                "description": "Array of range/values pairs",
                "items": {
                    "type": "object",
                    "properties": {
                        "range": { "type": "string" },
                        "values": { "type": "array", "items": { "type": "array", "items": { "type": "string" } } }
                    },
                    "required": ["range", "values"]
                }
            },
            "valueInputOption": value_input_option_schema()
        },
        "required": ["sheetId", "data"]
    }),
    |service, args: BatchUpdateRequest| {
        service.batch_update(&args).await?;
        Ok(success("Batch update completed"))
    }
);

sheet_tool!(
    AddSheetTabTool,
    "add_sheet_tab",
    "Add a new tab to an existing spreadsheet",
    Write,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "title": { "type": "string", "minLength": 1, "description": "Title of the new tab" },
            "rowCount": { "type": "integer", "minimum": 1, "description": "Number of rows" },
            "columnCount": { "type": "integer", "minimum": 1, "description": "Number of columns" }
        },
        "required": ["sheetId", "title"]
    }),
    |service, args: AddSheetTabRequest| {
        let tab = service.add_sheet_tab(&args).await?;
        Ok(json!({ "success": true, "sheetId": tab.sheet_id, "title": tab.title }))
    }
);

sheet_tool!(
    RenameSheetTabTool,
    "rename_sheet_tab",
    "Rename a tab in a spreadsheet",
    Write,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "tabId": { "type": "integer", "description": "Numeric ID of the tab" },
            "newTitle": { "type": "string", "minLength": 1, "description": "New title for the tab" }
        },
        "required": ["sheetId", "tabId", "newTitle"]
    }),
    |service, args: RenameTabArgs| {
        service
            .rename_sheet_tab(&args.sheet_id, args.tab_id, &args.new_title)
            .await?;
        Ok(success("Sheet tab renamed"))
    }
);

// ── Destructive tools ───────────────────────────────────────────────────────

sheet_tool!(
    DeleteSheetTool,
    "delete_sheet",
    "Move a Google Sheet to trash (recoverable)",
    Destructive,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet to trash")
        },
        "required": ["sheetId"]
    }),
    |service, args: SheetIdArgs| {
        service.delete_sheet(&args.sheet_id).await?;
        Ok(success("Sheet moved to trash"))
    }
);

sheet_tool!(
    DeleteSheetTabTool,
    "delete_sheet_tab",
    "Delete a tab from a spreadsheet",
    Destructive,
    json!({
        "type": "object",
        "properties": {
            "sheetId": sheet_id_property("The ID of the Google Sheet"),
            "tabId": { "type": "integer", "description": "Numeric ID of the tab within the spreadsheet" }
        },
        "required": ["sheetId", "tabId"]
    }),
    |service, args: TabArgs| {
        service.delete_sheet_tab(&args.sheet_id, args.tab_id).await?;
        Ok(success("Sheet tab deleted"))
    }
);

/// Every spreadsheet tool, in the order `tools/list` reports them.
pub fn all_tools(service: Arc<SheetsService>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(FindSheetsTool::new(service.clone())),
        Arc::new(GetSheetDataTool::new(service.clone())),
        Arc::new(CreateSheetTool::new(service.clone())),
        Arc::new(UpdateSheetTool::new(service.clone())),
        Arc::new(DeleteSheetTool::new(service.clone())),
        Arc::new(AppendValuesTool::new(service.clone())),
        Arc::new(ClearRangeTool::new(service.clone())),
        Arc::new(BatchGetTool::new(service.clone())),
        Arc::new(BatchUpdateTool::new(service.clone())),
        Arc::new(GetSpreadsheetInfoTool::new(service.clone())),
        Arc::new(AddSheetTabTool::new(service.clone())),
        Arc::new(DeleteSheetTabTool::new(service.clone())),
        Arc::new(RenameSheetTabTool::new(service)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetbridge_core::config::{GoogleApiConfig, OAuthConfig};
    use sheetbridge_core::oauth::Authenticator;
    use sheetbridge_core::types::RiskLevel;

    fn tools() -> Vec<Arc<dyn Tool>> {
        let dir = std::env::temp_dir().join("sheetbridge-tools-unit-never-written");
        let config = OAuthConfig {
            client_id: "test-client".into(),
            token_path: Some(dir.join("tokens.json")),
            ..Default::default()
        };
        let auth = Authenticator::new(config, reqwest::Client::new());
        all_tools(Arc::new(SheetsService::new(auth, &GoogleApiConfig::default())))
    }

    #[test]
    fn test_tool_names_and_order() {
        let names: Vec<String> = tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "find_sheets",
                "get_sheet_data",
                "create_sheet",
                "update_sheet",
                "delete_sheet",
                "append_values",
                "clear_range",
                "batch_get",
                "batch_update",
                "get_spreadsheet_info",
                "add_sheet_tab",
                "delete_sheet_tab",
                "rename_sheet_tab",
            ]
        );
    }

    #[test]
    fn test_schemas_compile_and_are_objects() {
        for tool in tools() {
            let schema = tool.parameters_schema();
            assert_eq!(schema["type"], "object", "{}", tool.name());
            assert!(
                jsonschema::validator_for(&schema).is_ok(),
                "schema for {} does not compile",
                tool.name()
            );
        }
    }

    #[test]
    fn test_risk_levels() {
        for tool in tools() {
            let expected = match tool.name() {
                "delete_sheet" | "delete_sheet_tab" => RiskLevel::Destructive,
                "find_sheets" | "get_sheet_data" | "batch_get" | "get_spreadsheet_info" => {
                    RiskLevel::ReadOnly
                }
                _ => RiskLevel::Write,
            };
            assert_eq!(tool.risk_level(), expected, "{}", tool.name());
        }
    }

    #[test]
    fn test_decode_args_reports_tool_name() {
        let err = decode_args::<TabArgs>("delete_sheet_tab", json!({ "sheetId": "s" })).unwrap_err();
        match err {
            ToolError::InvalidArguments { name, reason } => {
                assert_eq!(name, "delete_sheet_tab");
                assert!(reason.contains("tabId"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_args_accepts_null_for_optional_only_tools() {
        let args: FindSheetsRequest = decode_args("find_sheets", Value::Null).unwrap();
        assert_eq!(args.max_results, 10);
    }

    #[tokio::test]
    async fn test_empty_sheet_id_fails_before_authentication() {
        let tool = tools().into_iter().find(|t| t.name() == "get_sheet_data").unwrap();
        let err = tool.execute(json!({ "sheetId": "" })).await.unwrap_err();
        match err {
            ToolError::Sheets { name, source } => {
                assert_eq!(name, "get_sheet_data");
                assert_eq!(source.to_string(), "Sheet ID is required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
