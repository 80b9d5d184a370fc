// src/sync/source.rs
// External table sources for the reconciliation loop.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::classifier::{Row, Table};
use crate::config::SheetsConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

/// Anything that can produce the current external table.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch_table(&self) -> Result<Table, FetchError>;

    /// Short human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Google Sheets `values:batchGet` over a single range.
pub struct SheetsSource {
    client: reqwest::Client,
    config: SheetsConfig,
}

impl SheetsSource {
    pub fn new(config: SheetsConfig, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/{}/values:batchGet",
            self.config.base_url.trim_end_matches('/'),
            self.config.spreadsheet_id
        )
    }
}

#[async_trait]
impl TableSource for SheetsSource {
    async fn fetch_table(&self) -> Result<Table, FetchError> {
        let mut request = self
            .client
            .get(self.url())
            .query(&[("ranges", self.config.range.as_str())]);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let table = parse_batch_get(&body)?;
        debug!(rows = table.len(), "Fetched external table");
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("sheets:{}!{}", self.config.spreadsheet_id, self.config.range)
    }
}

/// Rows of the first value range.
///
/// A range with no `values` is an empty sheet, not an error. Non-string
/// cells are rendered as text.
pub fn parse_batch_get(body: &Value) -> Result<Table, FetchError> {
    let range = body
        .get("valueRanges")
        .and_then(Value::as_array)
        .and_then(|ranges| ranges.first())
        .ok_or_else(|| FetchError::Malformed("missing valueRanges[0]".to_string()))?;

    let Some(values) = range.get("values") else {
        return Ok(Vec::new());
    };
    let rows = values
        .as_array()
        .ok_or_else(|| FetchError::Malformed("values is not an array".to_string()))?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| -> Result<Row, FetchError> {
            let cells = row
                .as_array()
                .ok_or_else(|| FetchError::Malformed(format!("row {} is not an array", index)))?;
            Ok(cells.iter().map(cell_text).collect())
        })
        .collect()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// In-process table, swapped at will. Used for tests and for replaying a
/// table loaded by other means.
#[derive(Default)]
pub struct StaticSource {
    table: Mutex<Option<Table>>,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(table: Table) -> Self {
        Self {
            table: Mutex::new(Some(table)),
            ..Default::default()
        }
    }

    pub fn set_table(&self, table: Table) {
        *self.table.lock() = Some(table);
    }

    /// Every following fetch fails until a table is set again.
    pub fn set_unreachable(&self) {
        *self.table.lock() = None;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableSource for StaticSource {
    async fn fetch_table(&self) -> Result<Table, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.table
            .lock()
            .clone()
            .ok_or_else(|| FetchError::Http("source unreachable".to_string()))
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_batch_get() {
        let body = json!({
            "spreadsheetId": "abc",
            "valueRanges": [{
                "range": "Sheet1!A1:G3",
                "majorDimension": "ROWS",
                "values": [["1", "M1", "d1"], ["", "1", "S1", "d2"], ["", "", "1", "D", "d", 10.5]]
            }]
        });
        let table = parse_batch_get(&body).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], vec!["1", "M1", "d1"]);
        assert_eq!(table[2][5], "10.5");
    }

    #[test]
    fn test_range_without_values_is_empty() {
        let body = json!({"valueRanges": [{"range": "Sheet1!A1:Z1000", "majorDimension": "ROWS"}]});
        assert!(parse_batch_get(&body).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(
            parse_batch_get(&json!({})),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_batch_get(&json!({"valueRanges": []})),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_batch_get(&json!({"valueRanges": [{"values": [1, 2]}]})),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_sheets_url() {
        let source = SheetsSource::new(
            SheetsConfig {
                spreadsheet_id: "sheet-id".into(),
                range: "Sheet1".into(),
                api_key: None,
                access_token: None,
                base_url: "http://localhost:9999/v4/spreadsheets/".into(),
            },
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            source.url(),
            "http://localhost:9999/v4/spreadsheets/sheet-id/values:batchGet"
        );
        assert_eq!(source.describe(), "sheets:sheet-id!Sheet1");
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new(vec![vec!["a".to_string()]]);
        assert_eq!(source.fetch_table().await.unwrap().len(), 1);

        source.set_unreachable();
        assert!(source.fetch_table().await.is_err());
        assert_eq!(source.fetch_count(), 2);
    }
}
