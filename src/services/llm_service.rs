use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value as JsonValue};

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{Table, Value};

/// Raw response of the external tabular query engine, before any repair
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    Table(Table),
    Text(String),
    Number(f64),
    List(Vec<JsonValue>),
    Mapping(serde_json::Map<String, JsonValue>),
    Empty,
    Other(JsonValue),
}

impl EngineResponse {
    /// Map the gateway's `result` payload onto a response shape
    pub fn from_json(result: JsonValue) -> Self {
        match result {
            JsonValue::Null => EngineResponse::Empty,
            JsonValue::String(s) if s.is_empty() => EngineResponse::Empty,
            JsonValue::String(s) => EngineResponse::Text(s),
            JsonValue::Number(n) => match n.as_f64() {
                Some(v) => EngineResponse::Number(v),
                None => EngineResponse::Other(JsonValue::Number(n)),
            },
            JsonValue::Array(items) => EngineResponse::List(items),
            JsonValue::Object(map) => match table_from_payload(&map) {
                Some(table) => EngineResponse::Table(table),
                None => EngineResponse::Mapping(map),
            },
            other => EngineResponse::Other(other),
        }
    }
}

/// `{"columns": [...], "rows": [[...], ...]}` is the gateway's dataframe encoding
fn table_from_payload(map: &serde_json::Map<String, JsonValue>) -> Option<Table> {
    let columns = map.get("columns")?.as_array()?;
    let rows = map.get("rows")?.as_array()?;
    let headers: Vec<String> = columns
        .iter()
        .map(|c| match c {
            JsonValue::String(s) => s.clone(),
            JsonValue::Object(o) => o.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string(),
            other => other.to_string(),
        })
        .collect();

    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = row.as_array()?;
        parsed.push(cells.iter().cloned().map(Value::from).collect());
    }

    let name = map.get("name").and_then(|n| n.as_str()).unwrap_or("result");
    Some(Table::from_rows(name, headers, parsed))
}

fn table_to_payload(table: &Table) -> JsonValue {
    let rows: Vec<JsonValue> = table
        .rows
        .iter()
        .map(|row| JsonValue::Array(row.iter().map(JsonValue::from).collect()))
        .collect();
    json!({
        "name": table.name,
        "columns": table.column_names(),
        "dtypes": table.columns.iter().map(|c| c.column_type).collect::<Vec<_>>(),
        "rows": rows,
    })
}

/// Capability: answer a natural-language question about a table
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, table: &Table, question: &str) -> Result<EngineResponse, AppError>;
}

/// LLM-backed tabular query engine reached over HTTP
pub struct LlmService {
    gateway_url: String,
    api_key: Option<String>,
    model: String,
    http_client: HttpClient,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        Self {
            gateway_url: config.llm.gateway_url.clone(),
            api_key: config.llm.api_key.clone(),
            model: config.llm.model.clone(),
            http_client: HttpClient::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.gateway_url.trim().is_empty()
    }
}

#[async_trait]
impl QueryEngine for LlmService {
    async fn query(&self, table: &Table, question: &str) -> Result<EngineResponse, AppError> {
        if !self.is_configured() {
            return Err(AppError::AiAnalysisFailed("LLM gateway is not configured".to_string()));
        }

        tracing::debug!(
            "Sending question to LLM gateway ({} rows x {} columns): {}",
            table.row_count(),
            table.column_count(),
            question
        );

        let mut request = self.http_client.post(&self.gateway_url).json(&json!({
            "model": self.model,
            "question": question,
            "table": table_to_payload(table),
        }));

        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::AiAnalysisFailed(format!("Failed to call LLM gateway: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::AiAnalysisFailed(format!(
                "LLM gateway returned error {}: {}",
                status, error_text
            )));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| AppError::AiAnalysisFailed(format!("Failed to parse LLM gateway response: {}", e)))?;

        if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
            return Err(AppError::AiAnalysisFailed(error.to_string()));
        }

        let result = body.get("result").cloned().unwrap_or(JsonValue::Null);
        Ok(EngineResponse::from_json(result))
    }
}
