//! Spreadsheets as MCP resources.
//!
//! Nothing is enumerated by `resources/list` (that would mean a Drive query
//! per listing); instead clients use the `sheet://{sheetId}` template and read
//! a sheet's default range as JSON.

use std::sync::Arc;
use tracing::{info, warn};

use sheetbridge_tools::sheets::SheetsService;

use crate::error::McpError;
use crate::protocol::{McpResource, ResourceContent, ResourceTemplate};

pub const SHEET_URI_SCHEME: &str = "sheet://";
const JSON_MIME: &str = "application/json";

/// Resolves `sheet://` URIs through the shared [`SheetsService`].
#[derive(Clone)]
pub struct SheetResources {
    service: Arc<SheetsService>,
}

impl SheetResources {
    pub fn new(service: Arc<SheetsService>) -> Self {
        Self { service }
    }

    pub fn list_resources(&self) -> Vec<McpResource> {
        Vec::new()
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: format!("{}{{sheetId}}", SHEET_URI_SCHEME),
            name: "Google Sheet".to_string(),
            description: Some("Cell values of a spreadsheet's default range, as JSON".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        }]
    }

    /// Read `sheet://<id>` as pretty-printed sheet data.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, McpError> {
        let sheet_id = parse_sheet_uri(uri).ok_or_else(|| McpError::InvalidRequest {
            message: format!("Invalid resource URI: {}", uri),
        })?;

        info!(uri, "Reading sheet resource");
        let data = self
            .service
            .get_sheet_data(sheet_id, None)
            .await
            .map_err(|e| {
                warn!(uri, error = %e, "Failed to read resource");
                McpError::from(e)
            })?;

        let text = serde_json::to_string_pretty(&data)?;
        Ok(vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME.to_string()),
            text: Some(text),
        }])
    }
}

/// The sheet ID in `sheet://<id>`, if the URI has that shape.
pub fn parse_sheet_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix(SHEET_URI_SCHEME).filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sheet_uri() {
        assert_eq!(parse_sheet_uri("sheet://abc123"), Some("abc123"));
        assert_eq!(parse_sheet_uri("sheet://a/b"), Some("a/b"));
        assert_eq!(parse_sheet_uri("sheet://"), None);
        assert_eq!(parse_sheet_uri("file:///etc/passwd"), None);
        assert_eq!(parse_sheet_uri("SHEET://abc"), None);
    }
}
