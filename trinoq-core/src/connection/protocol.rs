//! Wire types of the Trino client REST protocol

use serde::Deserialize;
use serde_json::Value;

/// One page of a statement's progress, as returned by `/v1/statement`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    pub id: String,
    #[serde(default)]
    pub info_uri: Option<String>,
    #[serde(default)]
    pub next_uri: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
    #[serde(default)]
    pub data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    pub stats: Option<StatementStats>,
    #[serde(default)]
    pub error: Option<QueryError>,
}

impl QueryResults {
    pub fn state(&self) -> &str {
        self.stats.as_ref().map(|s| s.state.as_str()).unwrap_or("UNKNOWN")
    }
}

/// Column name and Trino type signature, e.g. `varchar(10)` or `timestamp(3)`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementStats {
    pub state: String,
    #[serde(default)]
    pub processed_rows: u64,
}

/// Failure reported by the engine for the statement
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    pub message: String,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_running_page() {
        let body = r#"{
            "id": "20240101_000000_00001_abcde",
            "infoUri": "http://localhost:8080/ui/query.html?20240101_000000_00001_abcde",
            "nextUri": "http://localhost:8080/v1/statement/executing/20240101_000000_00001_abcde/y1/1",
            "columns": [{"name": "_col0", "type": "integer", "typeSignature": {"rawType": "integer", "arguments": []}}],
            "data": [[1]],
            "stats": {"state": "RUNNING", "processedRows": 1, "queued": false}
        }"#;

        let page: QueryResults = serde_json::from_str(body).unwrap();
        assert_eq!(page.state(), "RUNNING");
        assert!(page.next_uri.is_some());
        assert_eq!(page.columns.unwrap()[0].type_name, "integer");
        assert_eq!(page.data.unwrap(), vec![vec![Value::from(1)]]);
    }

    #[test]
    fn test_parse_failed_page() {
        let body = r#"{
            "id": "q",
            "stats": {"state": "FAILED"},
            "error": {
                "message": "line 1:15: Table 'hive.default.nope' does not exist",
                "errorCode": 46,
                "errorName": "TABLE_NOT_FOUND",
                "errorType": "USER_ERROR"
            }
        }"#;

        let page: QueryResults = serde_json::from_str(body).unwrap();
        let error = page.error.unwrap();
        assert_eq!(error.error_name.as_deref(), Some("TABLE_NOT_FOUND"));
        assert_eq!(error.error_code, Some(46));
    }
}
