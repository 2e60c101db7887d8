use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::error::PipelineError;
use crate::http_client::{self, RetryConfig, is_transport_error, retry_with_backoff};

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

const SERVICE: &str = "spreadsheet";

pub trait SheetSource {
    /// Rows of a rectangular range, trailing empty cells already trimmed by the source.
    fn get_rows(&self, range: &str) -> Result<Vec<Vec<String>>, PipelineError>;
}

/// The `values.get` response shape, also used for local row dumps.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueRange {
    fn into_rows(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub enum SheetsAuth {
    ApiKey(String),
    Bearer(String),
}

pub struct SheetsApiSource {
    agent: ureq::Agent,
    api_base: Url,
    spreadsheet_id: String,
    auth: SheetsAuth,
    retry: RetryConfig,
}

impl SheetsApiSource {
    pub fn new(
        api_base: &str,
        spreadsheet_id: &str,
        auth: SheetsAuth,
        retry: RetryConfig,
    ) -> Result<Self, PipelineError> {
        let api_base = Url::parse(api_base).map_err(|err| {
            PipelineError::Input(format!("invalid spreadsheet base url {api_base}: {err}"))
        })?;
        Ok(Self {
            agent: http_client::agent(),
            api_base,
            spreadsheet_id: spreadsheet_id.to_string(),
            auth,
            retry,
        })
    }

    fn values_url(&self, range: &str) -> Result<Url, PipelineError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PipelineError::Input(format!(
                    "spreadsheet base url cannot hold a path: {}",
                    self.api_base
                ))
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        if let SheetsAuth::ApiKey(key) = &self.auth {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

impl SheetSource for SheetsApiSource {
    fn get_rows(&self, range: &str) -> Result<Vec<Vec<String>>, PipelineError> {
        let url = self.values_url(range)?;
        let result = retry_with_backoff(
            self.retry,
            || {
                let request = match &self.auth {
                    SheetsAuth::Bearer(token) => self
                        .agent
                        .get(url.as_str())
                        .set("Authorization", &format!("Bearer {token}")),
                    SheetsAuth::ApiKey(_) => self.agent.get(url.as_str()),
                };
                request.call()
            },
            is_transport_error,
        );
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(PipelineError::upstream(
                    SERVICE,
                    format!("HTTP {code} reading range {range}"),
                ));
            }
            Err(err) => return Err(PipelineError::upstream(SERVICE, err.to_string())),
        };
        let values: ValueRange = response
            .into_json()
            .map_err(|err| PipelineError::upstream(SERVICE, format!("invalid json: {err}")))?;

        let rows = values.into_rows();
        info!(
            spreadsheet_id = %self.spreadsheet_id,
            range = %range,
            rows = rows.len(),
            "read survey rows"
        );
        Ok(rows)
    }
}

/// A saved `values.get` response on disk. The range is ignored.
pub struct JsonRowsFile {
    path: PathBuf,
}

impl JsonRowsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SheetSource for JsonRowsFile {
    fn get_rows(&self, _range: &str) -> Result<Vec<Vec<String>>, PipelineError> {
        let raw = fs::read(&self.path).map_err(|err| {
            PipelineError::Input(format!("failed to read {}: {err}", self.path.display()))
        })?;
        let values: ValueRange = serde_json::from_slice(&raw).map_err(|err| {
            PipelineError::Input(format!("failed to parse {}: {err}", self.path.display()))
        })?;

        let rows = values.into_rows();
        info!(path = %self.path.display(), rows = rows.len(), "read survey rows");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::test_server::{http_response, serve_responses};

    #[test]
    fn api_source_reads_ragged_rows_with_api_key() {
        let body = concat!(
            r#"{"range":"Form!C2:F5","majorDimension":"ROWS","#,
            r#""values":[["a","b"],["","x","y","z"],[]]}"#
        );
        let (base, requests) = serve_responses(vec![http_response(200, body)]);
        let source = SheetsApiSource::new(
            &base,
            "sheet-id",
            SheetsAuth::ApiKey("k1".to_string()),
            RetryConfig::with_attempts(1),
        )
        .unwrap();

        let rows = source.get_rows("C2:F").unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["", "x", "y", "z"], vec![]]);
        assert_eq!(
            requests.recv().unwrap(),
            "GET /v4/spreadsheets/sheet-id/values/C2:F?key=k1 HTTP/1.1"
        );
    }

    #[test]
    fn api_source_reports_denied_access_as_upstream() {
        let (base, _requests) = serve_responses(vec![http_response(403, "{}")]);
        let source = SheetsApiSource::new(
            &base,
            "sheet-id",
            SheetsAuth::Bearer("t".to_string()),
            RetryConfig::with_attempts(1),
        )
        .unwrap();
        assert!(matches!(
            source.get_rows("C2:F"),
            Err(PipelineError::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn empty_range_has_no_values_key() {
        let values: ValueRange = serde_json::from_str(r#"{"range":"C2:F"}"#).unwrap();
        assert!(values.into_rows().is_empty());
    }

    #[test]
    fn non_string_cells_are_rendered_as_text() {
        let values: ValueRange =
            serde_json::from_str(r#"{"values":[["Ana", 7, null, true]]}"#).unwrap();
        assert_eq!(values.into_rows(), vec![vec!["Ana", "7", "", "true"]]);
    }

    #[test]
    fn missing_rows_file_is_input_error() {
        let source = JsonRowsFile::new(PathBuf::from("/nonexistent/rows.json"));
        assert!(matches!(source.get_rows("C2:F"), Err(PipelineError::Input(_))));
    }
}
