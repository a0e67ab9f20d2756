//! Canned prompts that steer a model through the spreadsheet tools.

use std::collections::HashMap;

use crate::error::McpError;
use crate::protocol::{GetPromptResult, McpPrompt, PromptArgument, PromptMessage, Role, TextContent};

const ANALYZE_SHEET_DATA: &str = "analyze_sheet_data";
const CREATE_REPORT_TEMPLATE: &str = "create_report_template";

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        description: Some(description.to_string()),
        required,
    }
}

/// Every prompt offered by `prompts/list`.
pub fn list_prompts() -> Vec<McpPrompt> {
    vec![
        McpPrompt {
            name: ANALYZE_SHEET_DATA.to_string(),
            description: Some("Analyze data in a Google Sheet and provide insights".to_string()),
            arguments: vec![
                argument("sheetId", "The Google Sheet ID", true),
                argument("range", "Range to analyze (e.g., A1:Z100)", false),
            ],
        },
        McpPrompt {
            name: CREATE_REPORT_TEMPLATE.to_string(),
            description: Some(
                "Create a structured report template in a Google Sheet".to_string(),
            ),
            arguments: vec![
                argument("title", "Report title", true),
                argument("sections", "Comma-separated list of report sections", false),
            ],
        },
    ]
}

/// Render a prompt. Missing optional arguments take their documented defaults.
pub fn get_prompt(name: &str, args: &HashMap<String, String>) -> Result<GetPromptResult, McpError> {
    let arg = |key: &str, default: &str| -> String {
        args.get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };

    let text = match name {
        ANALYZE_SHEET_DATA => format!(
            "Please analyze the data in Google Sheet \"{}\" (range: {}). First use the get_sheet_data tool to retrieve the data, then provide:\n\
             1. A summary of the data structure (columns, row count)\n\
             2. Key statistics or patterns\n\
             3. Any data quality issues\n\
             4. Actionable insights",
            arg("sheetId", ""),
            arg("range", "A1:Z100"),
        ),
        CREATE_REPORT_TEMPLATE => format!(
            "Create a new Google Sheet titled \"{}\" with the following report sections as tabs: {}. \
             Use the create_sheet tool, then use update_sheet to add headers and structure to each tab.",
            arg("title", "Report"),
            arg("sections", "Summary,Data,Analysis,Conclusions"),
        ),
        _ => {
            return Err(McpError::MethodNotFound {
                message: format!("Unknown prompt: {}", name),
            });
        }
    };

    Ok(GetPromptResult {
        description: None,
        messages: vec![PromptMessage {
            role: Role::User,
            content: TextContent::new(text),
        }],
    })
}
