//! # Sheetbridge Tools
//!
//! The Google Sheets and Drive tool set served over MCP: a REST client that
//! authenticates through [`sheetbridge_core::oauth::Authenticator`], the
//! [`Tool`](registry::Tool) trait, and a schema-validating registry.

#[macro_use]
mod macros;

pub mod registry;
pub mod sheet_tools;
pub mod sheets;

use registry::ToolRegistry;
use sheetbridge_core::error::ToolError;
use sheets::SheetsService;
use std::sync::Arc;

/// Register every spreadsheet tool backed by `service`.
pub fn register_sheet_tools(
    registry: &mut ToolRegistry,
    service: Arc<SheetsService>,
) -> Result<(), ToolError> {
    for tool in sheet_tools::all_tools(service) {
        registry.register(tool)?;
    }
    Ok(())
}
