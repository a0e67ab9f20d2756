//! Google Sheets v4 / Drive v3 REST client.
//!
//! A thin pass-through: every operation asks the [`Authenticator`] for an
//! authorized client first (which may refresh or log in), issues one or two
//! REST calls, and maps the response into plain serializable types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{error, info};

use sheetbridge_core::config::GoogleApiConfig;
use sheetbridge_core::error::SheetsError;
use sheetbridge_core::oauth::{Authenticator, AuthorizedClient};

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
const DEFAULT_READ_RANGE: &str = "A1:Z1000";
const DRIVE_FILE_FIELDS: &str = "files(id,name,webViewLink,createdTime,modifiedTime,owners)";

// ── Request types ───────────────────────────────────────────────────────────

/// How Google interprets written values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    /// Stored exactly as given.
    #[default]
    Raw,
    /// Parsed as if typed into the UI (formulas, dates, numbers).
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MajorDimension {
    #[default]
    Rows,
    Columns,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    Name,
    CreatedTime,
    #[default]
    ModifiedTime,
}

impl OrderBy {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBy::Name => "name",
            OrderBy::CreatedTime => "createdTime",
            OrderBy::ModifiedTime => "modifiedTime",
        }
    }
}

fn default_max_results() -> u32 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSheetsRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub order_by: OrderBy,
}

fn default_row_count() -> u32 {
    1000
}

fn default_column_count() -> u32 {
    26
}

/// A tab to create along with a new spreadsheet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSpec {
    pub name: String,
    #[serde(default = "default_row_count")]
    pub row_count: u32,
    #[serde(default = "default_column_count")]
    pub column_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSheetRequest {
    pub title: String,
    #[serde(default)]
    pub sheets: Option<Vec<TabSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSheetRequest {
    pub sheet_id: String,
    pub range: String,
    pub values: Vec<Vec<String>>,
    #[serde(default)]
    pub major_dimension: MajorDimension,
    #[serde(default)]
    pub value_input_option: ValueInputOption,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendValuesRequest {
    pub sheet_id: String,
    pub range: String,
    pub values: Vec<Vec<String>>,
    #[serde(default)]
    pub value_input_option: ValueInputOption,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeValues {
    pub range: String,
    pub values: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    pub sheet_id: String,
    pub data: Vec<RangeValues>,
    #[serde(default)]
    pub value_input_option: ValueInputOption,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetTabRequest {
    pub sheet_id: String,
    pub title: String,
    #[serde(default)]
    pub row_count: Option<u32>,
    #[serde(default)]
    pub column_count: Option<u32>,
}

// ── Response types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMetadata {
    pub id: String,
    pub name: String,
    pub url: String,
    pub created_time: String,
    pub modified_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    pub sheet_id: String,
    pub sheet_name: String,
    pub range: String,
    pub values: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub sheet_id: Option<i64>,
    pub title: Option<String>,
    pub index: Option<i64>,
    pub row_count: Option<i64>,
    pub column_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedRangeInfo {
    pub name: Option<String>,
    pub range: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: Option<String>,
    pub title: Option<String>,
    pub locale: Option<String>,
    pub time_zone: Option<String>,
    pub url: Option<String>,
    pub sheets: Vec<TabInfo>,
    pub named_ranges: Vec<NamedRangeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedTab {
    pub sheet_id: i64,
    pub title: String,
}

// ── Service ─────────────────────────────────────────────────────────────────

/// Spreadsheet operations over the Google REST APIs.
pub struct SheetsService {
    auth: Authenticator,
    sheets_base_url: String,
    drive_base_url: String,
}

impl SheetsService {
    pub fn new(auth: Authenticator, config: &GoogleApiConfig) -> Self {
        Self {
            auth,
            sheets_base_url: config.sheets_base_url.trim_end_matches('/').to_string(),
            drive_base_url: config.drive_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub async fn find_sheets(
        &self,
        request: &FindSheetsRequest,
    ) -> Result<Vec<SheetMetadata>, SheetsError> {
        if !(1..=100).contains(&request.max_results) {
            return Err(SheetsError::validation(
                "maxResults must be between 1 and 100",
                "maxResults",
            ));
        }

        let mut query = format!("mimeType='{}'", SPREADSHEET_MIME_TYPE);
        if let Some(name) = request.query.as_deref().filter(|q| !q.is_empty()) {
            query.push_str(&format!(" and name contains '{}'", escape_drive_query(name)));
        }

        let client = self.client().await?;
        let page_size = request.max_results.to_string();
        let response = send(
            "find_sheets",
            client
                .get(&format!("{}/files", self.drive_base_url))
                .query(&[
                    ("q", query.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("orderBy", request.order_by.as_str()),
                    ("fields", DRIVE_FILE_FIELDS),
                ]),
        )
        .await?;

        let sheets: Vec<SheetMetadata> = response["files"]
            .as_array()
            .map(|files| files.iter().map(sheet_metadata_from_file).collect())
            .unwrap_or_default();

        info!(count = sheets.len(), query = ?request.query, "Found sheets");
        Ok(sheets)
    }

    pub async fn get_sheet_data(
        &self,
        sheet_id: &str,
        range: Option<&str>,
    ) -> Result<SheetData, SheetsError> {
        require_sheet_id(sheet_id)?;
        let range = range.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_READ_RANGE);

        let client = self.client().await?;
        let values = send(
            "get_sheet_data",
            client.get(&self.values_url(sheet_id, range, "")),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))?;

        let info = send(
            "get_sheet_data",
            client
                .get(&self.spreadsheet_url(sheet_id, ""))
                .query(&[("fields", "sheets.properties.title")]),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))?;

        let sheet_name = info["sheets"][0]["properties"]["title"]
            .as_str()
            .unwrap_or("Sheet1")
            .to_string();
        let data = SheetData {
            sheet_id: sheet_id.to_string(),
            sheet_name,
            range: range.to_string(),
            values: rows_from(&values["values"]),
        };

        info!(sheet_id, range, rows = data.values.len(), "Retrieved sheet data");
        Ok(data)
    }

    pub async fn create_sheet(
        &self,
        request: &CreateSheetRequest,
    ) -> Result<SheetMetadata, SheetsError> {
        if request.title.trim().is_empty() {
            return Err(SheetsError::validation("Title is required", "title"));
        }

        let tabs: Vec<Value> = match &request.sheets {
            Some(tabs) if !tabs.is_empty() => tabs
                .iter()
                .map(|tab| tab_properties(&tab.name, Some(tab.row_count), Some(tab.column_count)))
                .collect(),
            _ => vec![tab_properties(
                "Sheet1",
                Some(default_row_count()),
                Some(default_column_count()),
            )],
        };
        let body = json!({
            "properties": { "title": request.title },
            "sheets": tabs,
        });

        let client = self.client().await?;
        let response = send(
            "create_sheet",
            client
                .post(&format!("{}/spreadsheets", self.sheets_base_url))
                .json(&body),
        )
        .await?;

        let now = Utc::now().to_rfc3339();
        let metadata = SheetMetadata {
            id: str_field(&response["spreadsheetId"]),
            name: response["properties"]["title"]
                .as_str()
                .unwrap_or(&request.title)
                .to_string(),
            url: str_field(&response["spreadsheetUrl"]),
            created_time: now.clone(),
            modified_time: now,
            owner: None,
        };

        info!(sheet_id = %metadata.id, title = %request.title, "Created spreadsheet");
        Ok(metadata)
    }

    pub async fn update_sheet(&self, request: &UpdateSheetRequest) -> Result<(), SheetsError> {
        require_sheet_id(&request.sheet_id)?;
        let body = json!({
            "range": request.range,
            "majorDimension": request.major_dimension,
            "values": request.values,
        });

        let client = self.client().await?;
        send(
            "update_sheet",
            client
                .put(&self.values_url(&request.sheet_id, &request.range, ""))
                .query(&[("valueInputOption", request.value_input_option.as_str())])
                .json(&body),
        )
        .await
        .map_err(|e| for_spreadsheet(e, &request.sheet_id))?;

        info!(
            sheet_id = %request.sheet_id,
            range = %request.range,
            cells = cell_count(&request.values),
            "Updated sheet data"
        );
        Ok(())
    }

    /// Move a spreadsheet to the Drive trash. Recoverable from the Drive UI.
    pub async fn delete_sheet(&self, sheet_id: &str) -> Result<(), SheetsError> {
        require_sheet_id(sheet_id)?;

        let client = self.client().await?;
        send(
            "delete_sheet",
            client
                .patch(&format!(
                    "{}/files/{}",
                    self.drive_base_url,
                    urlencoding::encode(sheet_id)
                ))
                .json(&json!({ "trashed": true })),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))?;

        info!(sheet_id, "Trashed spreadsheet");
        Ok(())
    }

    pub async fn append_values(&self, request: &AppendValuesRequest) -> Result<(), SheetsError> {
        require_sheet_id(&request.sheet_id)?;

        let client = self.client().await?;
        send(
            "append_values",
            client
                .post(&self.values_url(&request.sheet_id, &request.range, ":append"))
                .query(&[("valueInputOption", request.value_input_option.as_str())])
                .json(&json!({ "values": request.values })),
        )
        .await
        .map_err(|e| for_spreadsheet(e, &request.sheet_id))?;

        info!(
            sheet_id = %request.sheet_id,
            range = %request.range,
            rows = request.values.len(),
            "Appended values"
        );
        Ok(())
    }

    pub async fn clear_range(&self, sheet_id: &str, range: &str) -> Result<(), SheetsError> {
        require_sheet_id(sheet_id)?;

        let client = self.client().await?;
        send(
            "clear_range",
            client
                .post(&self.values_url(sheet_id, range, ":clear"))
                .json(&json!({})),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))?;

        info!(sheet_id, range, "Cleared range");
        Ok(())
    }

    /// Read several ranges at once, keyed by the range Google reports back.
    pub async fn batch_get(
        &self,
        sheet_id: &str,
        ranges: &[String],
    ) -> Result<BTreeMap<String, Vec<Vec<String>>>, SheetsError> {
        require_sheet_id(sheet_id)?;
        if ranges.is_empty() {
            return Err(SheetsError::validation(
                "At least one range is required",
                "ranges",
            ));
        }

        let query: Vec<(&str, &str)> = ranges.iter().map(|r| ("ranges", r.as_str())).collect();
        let client = self.client().await?;
        let response = send(
            "batch_get",
            client
                .get(&format!(
                    "{}/spreadsheets/{}/values:batchGet",
                    self.sheets_base_url,
                    urlencoding::encode(sheet_id)
                ))
                .query(&query),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))?;

        let mut result = BTreeMap::new();
        for value_range in response["valueRanges"].as_array().into_iter().flatten() {
            if let Some(range) = value_range["range"].as_str() {
                result.insert(range.to_string(), rows_from(&value_range["values"]));
            }
        }

        info!(sheet_id, ranges = ranges.len(), "Batch get completed");
        Ok(result)
    }

    pub async fn batch_update(&self, request: &BatchUpdateRequest) -> Result<(), SheetsError> {
        require_sheet_id(&request.sheet_id)?;
        let body = json!({
            "valueInputOption": request.value_input_option,
            "data": request.data,
        });

        let client = self.client().await?;
        send(
            "batch_update",
            client
                .post(&format!(
                    "{}/spreadsheets/{}/values:batchUpdate",
                    self.sheets_base_url,
                    urlencoding::encode(&request.sheet_id)
                ))
                .json(&body),
        )
        .await
        .map_err(|e| for_spreadsheet(e, &request.sheet_id))?;

        info!(
            sheet_id = %request.sheet_id,
            ranges = request.data.len(),
            "Batch update completed"
        );
        Ok(())
    }

    pub async fn get_spreadsheet_info(&self, sheet_id: &str) -> Result<SpreadsheetInfo, SheetsError> {
        require_sheet_id(sheet_id)?;

        let client = self.client().await?;
        let response = send(
            "get_spreadsheet_info",
            client.get(&self.spreadsheet_url(sheet_id, "")),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))?;

        let properties = &response["properties"];
        let info = SpreadsheetInfo {
            spreadsheet_id: opt_str(&response["spreadsheetId"]),
            title: opt_str(&properties["title"]),
            locale: opt_str(&properties["locale"]),
            time_zone: opt_str(&properties["timeZone"]),
            url: opt_str(&response["spreadsheetUrl"]),
            sheets: response["sheets"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|sheet| {
                    let p = &sheet["properties"];
                    TabInfo {
                        sheet_id: p["sheetId"].as_i64(),
                        title: opt_str(&p["title"]),
                        index: p["index"].as_i64(),
                        row_count: p["gridProperties"]["rowCount"].as_i64(),
                        column_count: p["gridProperties"]["columnCount"].as_i64(),
                    }
                })
                .collect(),
            named_ranges: response["namedRanges"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|nr| NamedRangeInfo {
                    name: opt_str(&nr["name"]),
                    range: nr["range"].clone(),
                })
                .collect(),
        };

        info!(sheet_id, tabs = info.sheets.len(), "Retrieved spreadsheet info");
        Ok(info)
    }

    pub async fn add_sheet_tab(&self, request: &AddSheetTabRequest) -> Result<AddedTab, SheetsError> {
        require_sheet_id(&request.sheet_id)?;
        let properties = tab_properties(&request.title, request.row_count, request.column_count);

        let response = self
            .structural_update(
                "add_sheet_tab",
                &request.sheet_id,
                json!({ "addSheet": properties }),
            )
            .await?;

        let added = &response["replies"][0]["addSheet"]["properties"];
        let tab = AddedTab {
            sheet_id: added["sheetId"].as_i64().unwrap_or(0),
            title: added["title"]
                .as_str()
                .unwrap_or(&request.title)
                .to_string(),
        };

        info!(sheet_id = %request.sheet_id, title = %tab.title, "Added sheet tab");
        Ok(tab)
    }

    pub async fn delete_sheet_tab(&self, sheet_id: &str, tab_id: i64) -> Result<(), SheetsError> {
        require_sheet_id(sheet_id)?;
        self.structural_update(
            "delete_sheet_tab",
            sheet_id,
            json!({ "deleteSheet": { "sheetId": tab_id } }),
        )
        .await?;

        info!(sheet_id, tab_id, "Deleted sheet tab");
        Ok(())
    }

    pub async fn rename_sheet_tab(
        &self,
        sheet_id: &str,
        tab_id: i64,
        new_title: &str,
    ) -> Result<(), SheetsError> {
        require_sheet_id(sheet_id)?;
        if new_title.trim().is_empty() {
            return Err(SheetsError::validation("New title is required", "newTitle"));
        }
        self.structural_update(
            "rename_sheet_tab",
            sheet_id,
            json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": tab_id, "title": new_title },
                    "fields": "title",
                }
            }),
        )
        .await?;

        info!(sheet_id, tab_id, new_title, "Renamed sheet tab");
        Ok(())
    }

    /// `spreadsheets.batchUpdate` with a single request.
    async fn structural_update(
        &self,
        operation: &'static str,
        sheet_id: &str,
        request: Value,
    ) -> Result<Value, SheetsError> {
        let client = self.client().await?;
        send(
            operation,
            client
                .post(&self.spreadsheet_url(sheet_id, ":batchUpdate"))
                .json(&json!({ "requests": [request] })),
        )
        .await
        .map_err(|e| for_spreadsheet(e, sheet_id))
    }

    async fn client(&self) -> Result<AuthorizedClient, SheetsError> {
        Ok(self.auth.authorized_client().await?)
    }

    fn spreadsheet_url(&self, sheet_id: &str, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}{}",
            self.sheets_base_url,
            urlencoding::encode(sheet_id),
            suffix
        )
    }

    fn values_url(&self, sheet_id: &str, range: &str, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.sheets_base_url,
            urlencoding::encode(sheet_id),
            urlencoding::encode(range),
            suffix
        )
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Send a request and decode the JSON body, classifying HTTP failures.
async fn send(operation: &'static str, request: reqwest::RequestBuilder) -> Result<Value, SheetsError> {
    let response = request.send().await.map_err(|e| {
        error!(operation, error = %e, "Google API request failed");
        SheetsError::Network {
            message: e.to_string(),
        }
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| SheetsError::Network {
        message: e.to_string(),
    })?;

    if !status.is_success() {
        let message = google_error_message(&body);
        error!(operation, status = status.as_u16(), message = %message, "Google API error");
        return Err(SheetsError::from_status(status.as_u16(), message));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| SheetsError::Api {
        status: status.as_u16(),
        message: format!("Invalid JSON from Google API: {}", e),
    })
}

/// Extract `error.message` from a Google error body.
fn google_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn require_sheet_id(sheet_id: &str) -> Result<(), SheetsError> {
    if sheet_id.trim().is_empty() {
        return Err(SheetsError::validation("Sheet ID is required", "sheetId"));
    }
    Ok(())
}

/// Name the spreadsheet in a generic 404.
fn for_spreadsheet(err: SheetsError, sheet_id: &str) -> SheetsError {
    match err {
        SheetsError::NotFound { id: None, .. } => SheetsError::NotFound {
            resource: "Spreadsheet".to_string(),
            id: Some(sheet_id.to_string()),
        },
        other => other,
    }
}

/// Escape a value for use inside a single-quoted Drive query string.
pub fn escape_drive_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn tab_properties(title: &str, row_count: Option<u32>, column_count: Option<u32>) -> Value {
    let mut properties = json!({ "title": title });
    let mut grid = serde_json::Map::new();
    if let Some(rows) = row_count.filter(|n| *n > 0) {
        grid.insert("rowCount".into(), json!(rows));
    }
    if let Some(cols) = column_count.filter(|n| *n > 0) {
        grid.insert("columnCount".into(), json!(cols));
    }
    if !grid.is_empty() {
        properties["gridProperties"] = Value::Object(grid);
    }
    json!({ "properties": properties })
}

fn sheet_metadata_from_file(file: &Value) -> SheetMetadata {
    SheetMetadata {
        id: str_field(&file["id"]),
        name: str_field(&file["name"]),
        url: str_field(&file["webViewLink"]),
        created_time: str_field(&file["createdTime"]),
        modified_time: str_field(&file["modifiedTime"]),
        owner: opt_str(&file["owners"][0]["displayName"]),
    }
}

/// Rows of cells, each cell rendered as a string.
fn rows_from(values: &Value) -> Vec<Vec<String>> {
    values
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(cell_to_string).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn str_field(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn opt_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn cell_count(values: &[Vec<String>]) -> usize {
    values.iter().map(Vec::len).sum()
}
