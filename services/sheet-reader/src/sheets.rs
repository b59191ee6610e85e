//! Minimal Google Sheets values client
//!
//! One call: `spreadsheets.values.get` for a single A1 range, rows first.

use google_auth::CredentialHandle;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Production Sheets API root
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Response body of `values.get`. `values` is omitted when the range is empty.
#[derive(Debug, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Read-only Sheets client.
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, SHEETS_API_BASE)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch `{sheet_name}!{range}` as rows of display strings.
    pub async fn read_rows(
        &self,
        credentials: &CredentialHandle,
        spreadsheet_id: &str,
        sheet_name: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>> {
        let url = values_url(&self.base_url, spreadsheet_id, sheet_name, range)?;
        debug!(%url, "requesting sheet values");

        let response = self
            .http
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                credentials.authorization_header(),
            )
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value_range: ValueRange = response
            .json()
            .await
            .map_err(|e| Error::Decode(e.to_string()))?;
        info!(
            range = value_range.range.as_deref().unwrap_or(range),
            rows = value_range.values.len(),
            "sheet values received"
        );

        Ok(value_range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

/// `{base}/{spreadsheet_id}/values/{sheet_name}!{range}?majorDimension=ROWS`
///
/// Path segments are percent-encoded, so sheet names with spaces or non-ASCII
/// characters are safe.
pub fn values_url(
    base_url: &str,
    spreadsheet_id: &str,
    sheet_name: &str,
    range: &str,
) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::InvalidRequest(format!("invalid Sheets base URL {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::InvalidRequest(format!("Sheets base URL {base_url} cannot have a path")))?
        .pop_if_empty()
        .push(spreadsheet_id)
        .push("values")
        .push(&format!("{sheet_name}!{range}"));
    url.query_pairs_mut().append_pair("majorDimension", "ROWS");
    Ok(url)
}

/// Display text of one cell. Strings print bare, empty cells print nothing.
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `[idx]\tcell\tcell...` for each row, indices from zero.
pub fn format_rows(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| format!("[{idx}]\t{}", row.join("\t")))
        .collect()
}
