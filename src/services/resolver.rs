// Query Resolver
//
// Two-tier dispatch for a natural-language question against one table:
//   1. a deterministic "<column> of <value>" lookup answered locally;
//   2. otherwise the external query engine, whose response is normalized and,
//      when it dropped columns of the original table, repaired through a join key.
//
// Apart from an empty question, every path ends in an Answer so the presenter
// always has something to render.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::api::middleware::AppError;
use crate::models::{Answer, ColumnType, Table, Value};
use crate::services::llm_service::{EngineResponse, QueryEngine};

static SIMPLE_LOOKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?P<col>[\w\s]+?)\s+of\s+(?P<val>.+?)\s*\.?$").expect("valid regex")
});

/// Preferred join keys when restoring dropped columns, in priority order
const JOIN_KEY_PREFERENCE: [&str; 4] = ["user_id", "id", "name", "email"];

pub const NO_VALID_RESPONSE: &str = "No valid response.";
pub const UNRECOGNIZED_QUERY: &str = "Invalid or unrecognized query.";

/// Result of the local lookup stage
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Resolved(Table),
    Fallthrough,
}

pub struct QueryResolver {
    engine: Arc<dyn QueryEngine>,
}

impl QueryResolver {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    /// Answer `question` against `table`
    pub async fn resolve(&self, table: &Table, question: &str) -> Result<Answer, AppError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::EmptyQuestion);
        }

        if let LookupOutcome::Resolved(result) = local_lookup(table, question) {
            return Ok(Answer::Table(result));
        }

        tracing::info!("Delegating question to query engine: {}", question);
        let response = match self.engine.query(table, question).await {
            Ok(response) => response,
            Err(e) => {
                let message = match e {
                    AppError::AiAnalysisFailed(msg) => msg,
                    other => other.to_string(),
                };
                tracing::error!("Query engine failed: {}", message);
                return Ok(Answer::Error(format!("AI analysis failed: {}", message)));
            }
        };

        Ok(normalize_response(table, response))
    }
}

/// Stage 1: answer `<column> of <value>` questions without the engine
pub fn local_lookup(table: &Table, question: &str) -> LookupOutcome {
    let captures = match SIMPLE_LOOKUP.captures(question.trim()) {
        Some(captures) => captures,
        None => return LookupOutcome::Fallthrough,
    };
    let column_phrase = captures["col"].trim();
    let value_phrase = captures["val"].trim();

    let column = match resolve_column(table, column_phrase) {
        Some(column) => column,
        None => {
            tracing::debug!("Local lookup: no column matches '{}'", column_phrase);
            return LookupOutcome::Fallthrough;
        }
    };

    let needle = value_phrase.to_lowercase();
    let text_columns: Vec<usize> = column_indices(table, |ty| ty == ColumnType::Text);
    let other_columns: Vec<usize> = column_indices(table, |ty| ty != ColumnType::Text);

    let passes: [(&str, &[usize], fn(&Value, &str) -> bool); 3] = [
        ("exact", &text_columns, exact_text_match),
        ("partial", &text_columns, partial_text_match),
        ("exact rendered", &other_columns, exact_rendered_match),
    ];

    for (label, columns, matches) in passes {
        for &idx in columns {
            let hits: Vec<usize> = table
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| matches(&row[idx], &needle))
                .map(|(i, _)| i)
                .collect();
            if !hits.is_empty() {
                tracing::debug!(
                    "Local lookup {} match in column={} ({} rows)",
                    label,
                    table.columns[idx].name,
                    hits.len()
                );
                return LookupOutcome::Resolved(table.select_rows(&hits));
            }
        }
    }

    tracing::debug!("Local lookup: no match found for {}", value_phrase);
    LookupOutcome::Resolved(Table::message(format!(
        "No match found for '{}' in column '{}'",
        value_phrase, column
    )))
}

/// Exact (case-insensitive) column name, else the first name containing the phrase
fn resolve_column<'a>(table: &'a Table, phrase: &str) -> Option<&'a str> {
    let phrase = phrase.to_lowercase();
    table
        .columns
        .iter()
        .find(|c| c.name.to_lowercase() == phrase)
        .or_else(|| table.columns.iter().find(|c| c.name.to_lowercase().contains(&phrase)))
        .map(|c| c.name.as_str())
}

fn column_indices(table: &Table, keep: impl Fn(ColumnType) -> bool) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| keep(c.column_type))
        .map(|(i, _)| i)
        .collect()
}

fn exact_text_match(cell: &Value, needle: &str) -> bool {
    cell.as_text()
        .map(|s| s.trim().to_lowercase() == needle)
        .unwrap_or(false)
}

fn exact_rendered_match(cell: &Value, needle: &str) -> bool {
    if cell.is_null() {
        return false;
    }
    if let (Some(v), Ok(n)) = (cell.as_f64(), needle.parse::<f64>()) {
        return v == n;
    }
    cell.to_string().trim().to_lowercase() == needle
}

fn partial_text_match(cell: &Value, needle: &str) -> bool {
    cell.as_text()
        .map(|s| s.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Stage 2: turn whatever the engine returned into an Answer
pub fn normalize_response(original: &Table, response: EngineResponse) -> Answer {
    match response {
        EngineResponse::Empty => {
            tracing::debug!("Query engine returned an empty result");
            Answer::Error(NO_VALID_RESPONSE.to_string())
        }
        EngineResponse::Table(result) => {
            if result.same_content(original) {
                tracing::debug!("Query engine echoed the full input table");
                return Answer::Table(Table::message(UNRECOGNIZED_QUERY));
            }
            if result.is_empty() {
                return Answer::Table(result);
            }
            Answer::Table(repair_columns(original, result))
        }
        EngineResponse::List(items) => {
            let raw = JsonValue::Array(items);
            Answer::Table(json_to_table(&raw).unwrap_or_else(|e| {
                tracing::debug!("List conversion failed: {}", e);
                Table::message(raw.to_string())
            }))
        }
        EngineResponse::Mapping(map) => {
            let raw = JsonValue::Object(map);
            Answer::Table(json_to_table(&raw).unwrap_or_else(|e| {
                tracing::debug!("Mapping conversion failed: {}", e);
                Table::message(raw.to_string())
            }))
        }
        EngineResponse::Text(text) => Answer::Scalar(text),
        EngineResponse::Number(n) => Answer::Scalar(format_number(n)),
        EngineResponse::Other(value) => {
            tracing::debug!("Query engine returned an unhandled shape; stringifying");
            Answer::Scalar(value.to_string())
        }
    }
}

/// Re-attach original columns the engine dropped, joining on a shared key.
///
/// Rows keep the response's order. A key with no counterpart in the original
/// yields a row holding only the key. When nothing joins, the response is
/// returned unchanged.
pub fn repair_columns(original: &Table, response: Table) -> Table {
    let missing: Vec<&str> = original
        .column_names()
        .into_iter()
        .filter(|c| !response.has_column(c))
        .collect();
    if missing.is_empty() {
        return response;
    }
    tracing::debug!("Missing cols from result: {:?}", missing);

    let common: Vec<&str> = response
        .column_names()
        .into_iter()
        .filter(|c| original.has_column(c))
        .collect();

    let join_col = JOIN_KEY_PREFERENCE
        .iter()
        .copied()
        .find(|pref| common.contains(pref))
        .or_else(|| common.first().copied());

    let join_col = match join_col {
        Some(col) => col,
        None => {
            tracing::debug!("No suitable join column to restore missing columns");
            return response;
        }
    };

    let (resp_idx, orig_idx) = match (response.column_index(join_col), original.column_index(join_col)) {
        (Some(r), Some(o)) => (r, o),
        _ => return response,
    };

    let keys: HashSet<String> = response
        .rows
        .iter()
        .filter_map(|row| row[resp_idx].join_key())
        .collect();

    let mut first_row_by_key: HashMap<String, usize> = HashMap::new();
    for (i, row) in original.rows.iter().enumerate() {
        if let Some(key) = row[orig_idx].join_key() {
            if keys.contains(&key) {
                first_row_by_key.entry(key).or_insert(i);
            }
        }
    }

    if first_row_by_key.is_empty() {
        tracing::debug!("No matching rows in original table for join column {}", join_col);
        return response;
    }

    let width = original.column_count();
    let rows: Vec<Vec<Value>> = response
        .rows
        .iter()
        .map(|row| {
            let key_cell = &row[resp_idx];
            match key_cell.join_key().and_then(|k| first_row_by_key.get(&k)) {
                Some(&i) => original.rows[i].clone(),
                None => {
                    let mut restored = vec![Value::Null; width];
                    restored[orig_idx] = key_cell.clone();
                    restored
                }
            }
        })
        .collect();

    tracing::debug!("Restored missing columns using join column {}", join_col);
    let headers = original.column_names().into_iter().map(String::from).collect();
    Table::from_rows(response.name, headers, rows)
}

/// Dataframe-style conversion of a JSON list or mapping
fn json_to_table(raw: &JsonValue) -> Result<Table, String> {
    match raw {
        JsonValue::Array(items) => list_to_table(items),
        JsonValue::Object(map) => mapping_to_table(map),
        other => Err(format!("cannot build a table from {}", other)),
    }
}

fn list_to_table(items: &[JsonValue]) -> Result<Table, String> {
    if items.iter().all(|v| v.is_object()) {
        let mut headers: Vec<String> = Vec::new();
        for item in items {
            if let JsonValue::Object(map) = item {
                for key in map.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
        }
        let rows = items
            .iter()
            .map(|item| {
                headers
                    .iter()
                    .map(|h| item.get(h).cloned().map(Value::from).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        return Ok(Table::from_rows("result", headers, rows));
    }

    if items.iter().all(|v| v.is_array()) {
        let width = items.iter().filter_map(|v| v.as_array()).map(|a| a.len()).max().unwrap_or(0);
        let headers = (0..width).map(|i| i.to_string()).collect();
        let rows = items
            .iter()
            .filter_map(|v| v.as_array())
            .map(|a| a.iter().cloned().map(Value::from).collect())
            .collect();
        return Ok(Table::from_rows("result", headers, rows));
    }

    if items.iter().all(|v| !v.is_object() && !v.is_array()) {
        let rows = items.iter().cloned().map(|v| vec![Value::from(v)]).collect();
        return Ok(Table::from_rows("result", vec!["value".to_string()], rows));
    }

    Err("list mixes records with scalar values".to_string())
}

fn mapping_to_table(map: &serde_json::Map<String, JsonValue>) -> Result<Table, String> {
    let headers: Vec<String> = map.keys().cloned().collect();
    let lengths: HashSet<usize> = map.values().filter_map(|v| v.as_array()).map(|a| a.len()).collect();

    if map.values().any(|v| v.is_object()) {
        return Err("nested mappings are not tabular".to_string());
    }
    if lengths.len() > 1 {
        return Err("arrays must all be of the same length".to_string());
    }

    // Scalars broadcast across the array length; all-scalar mappings become one row
    let height = lengths.into_iter().next().unwrap_or(1);
    let rows = (0..height)
        .map(|i| {
            map.values()
                .map(|v| match v {
                    JsonValue::Array(a) => a.get(i).cloned().map(Value::from).unwrap_or(Value::Null),
                    scalar => Value::from(scalar.clone()),
                })
                .collect()
        })
        .collect();
    Ok(Table::from_rows("result", headers, rows))
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Scripted {
        Respond(EngineResponse),
        Fail(String),
    }

    struct MockEngine {
        script: Scripted,
        calls: AtomicUsize,
    }

    impl MockEngine {
        fn responding(response: EngineResponse) -> Arc<Self> {
            Arc::new(Self {
                script: Scripted::Respond(response),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                script: Scripted::Fail(message.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryEngine for MockEngine {
        async fn query(&self, _table: &Table, _question: &str) -> Result<EngineResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Scripted::Respond(response) => Ok(response.clone()),
                Scripted::Fail(message) => Err(AppError::AiAnalysisFailed(message.clone())),
            }
        }
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn users() -> Table {
        Table::from_rows(
            "users",
            vec!["id".to_string(), "name".to_string(), "Email".to_string(), "age".to_string()],
            vec![
                vec![Value::Int(1), text("Alice"), text("alice@example.com"), Value::Int(30)],
                vec![Value::Int(2), text("Bob"), text("bob@example.com"), Value::Int(41)],
                vec![Value::Int(3), text("alice"), text("  ALICE@other.org "), Value::Int(25)],
                vec![Value::Int(4), text("Alicia"), text("alicia@example.com"), Value::Int(35)],
            ],
        )
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let engine = MockEngine::responding(EngineResponse::Empty);
        let resolver = QueryResolver::new(engine.clone());
        let result = resolver.resolve(&users(), "   ").await;
        assert!(matches!(result, Err(AppError::EmptyQuestion)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_local_lookup_bypasses_engine() {
        let engine = MockEngine::responding(EngineResponse::Empty);
        let resolver = QueryResolver::new(engine.clone());
        let answer = resolver.resolve(&users(), "email of Alice").await.unwrap();
        let table = answer.as_table().unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["id", "name", "Email", "age"]);
        assert_eq!(table.rows[0][0], Value::Int(1));
        assert_eq!(table.rows[1][0], Value::Int(3));
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn test_local_lookup_is_case_insensitive_with_trailing_period() {
        match local_lookup(&users(), "EMAIL OF alice@example.com.") {
            LookupOutcome::Resolved(table) => {
                assert_eq!(table.row_count(), 1);
                assert_eq!(table.rows[0][1], text("Alice"));
            }
            LookupOutcome::Fallthrough => panic!("expected a local answer"),
        }
    }

    #[test]
    fn test_local_lookup_trims_cells_for_exact_match() {
        match local_lookup(&users(), "name of alice@other.org") {
            LookupOutcome::Resolved(table) => {
                assert_eq!(table.row_count(), 1);
                assert_eq!(table.rows[0][0], Value::Int(3));
            }
            LookupOutcome::Fallthrough => panic!("expected a local answer"),
        }
    }

    #[test]
    fn test_local_lookup_falls_back_to_substring() {
        match local_lookup(&users(), "age of alic") {
            LookupOutcome::Resolved(table) => {
                // "alic" is a prefix of Alice, alice and Alicia in the name column
                assert_eq!(table.row_count(), 3);
                assert_eq!(table.rows[2][1], text("Alicia"));
            }
            LookupOutcome::Fallthrough => panic!("expected a local answer"),
        }
    }

    #[test]
    fn test_local_lookup_matches_numeric_key() {
        match local_lookup(&users(), "name of 2") {
            LookupOutcome::Resolved(table) => {
                assert_eq!(table.row_count(), 1);
                assert_eq!(table.rows[0], users().rows[1]);
            }
            LookupOutcome::Fallthrough => panic!("expected a local answer"),
        }
    }

    #[test]
    fn test_local_lookup_prefers_text_substring_over_numeric_key() {
        let products = Table::from_rows(
            "products",
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int(5), text("Widget 1")],
                vec![Value::Int(1), text("Gadget")],
            ],
        );
        match local_lookup(&products, "name of 1") {
            LookupOutcome::Resolved(table) => {
                assert_eq!(table.row_count(), 1);
                assert_eq!(table.rows[0][1], text("Widget 1"));
            }
            LookupOutcome::Fallthrough => panic!("expected a local answer"),
        }
    }

    #[test]
    fn test_local_lookup_no_match_message() {
        match local_lookup(&users(), "mail of zed") {
            LookupOutcome::Resolved(table) => {
                assert_eq!(table.row_count(), 1);
                assert_eq!(table.column_names(), vec!["Result"]);
                assert_eq!(table.rows[0][0], text("No match found for 'zed' in column 'Email'"));
            }
            LookupOutcome::Fallthrough => panic!("expected a local answer"),
        }
    }

    #[test]
    fn test_local_lookup_falls_through() {
        assert_eq!(local_lookup(&users(), "how many users are there?"), LookupOutcome::Fallthrough);
        assert_eq!(local_lookup(&users(), "salary of Bob"), LookupOutcome::Fallthrough);
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_error_answer() {
        let resolver = QueryResolver::new(MockEngine::failing("rate limited"));
        let answer = resolver.resolve(&users(), "average age").await.unwrap();
        assert_eq!(answer, Answer::Error("AI analysis failed: rate limited".to_string()));
    }

    #[tokio::test]
    async fn test_empty_engine_response() {
        let resolver = QueryResolver::new(MockEngine::responding(EngineResponse::Empty));
        let answer = resolver.resolve(&users(), "average age").await.unwrap();
        assert_eq!(answer, Answer::Error(NO_VALID_RESPONSE.to_string()));
    }

    #[tokio::test]
    async fn test_engine_echo_is_rejected() {
        let resolver = QueryResolver::new(MockEngine::responding(EngineResponse::Table(users())));
        let answer = resolver.resolve(&users(), "show me something").await.unwrap();
        assert_eq!(answer, Answer::Table(Table::message(UNRECOGNIZED_QUERY)));
    }

    #[test]
    fn test_column_repair_restores_dropped_columns_in_response_order() {
        let response = Table::from_rows(
            "result",
            vec!["id".to_string(), "age".to_string()],
            vec![vec![Value::Int(4), Value::Int(35)], vec![Value::Int(2), Value::Int(41)]],
        );
        let answer = normalize_response(&users(), EngineResponse::Table(response));
        let table = answer.as_table().unwrap();
        assert_eq!(table.column_names(), vec!["id", "name", "Email", "age"]);
        assert_eq!(table.rows[0], users().rows[3]);
        assert_eq!(table.rows[1], users().rows[1]);
    }

    #[test]
    fn test_column_repair_prefers_id_over_first_shared_column() {
        let response = Table::from_rows(
            "result",
            vec!["age".to_string(), "id".to_string()],
            vec![vec![Value::Int(999), Value::Int(1)]],
        );
        let repaired = repair_columns(&users(), response);
        assert_eq!(repaired.rows[0], users().rows[0]);
    }

    #[test]
    fn test_column_repair_keeps_unknown_keys() {
        let response = Table::from_rows(
            "result",
            vec!["id".to_string()],
            vec![vec![Value::Int(1)], vec![Value::Int(99)]],
        );
        let repaired = repair_columns(&users(), response);
        assert_eq!(repaired.row_count(), 2);
        assert_eq!(repaired.rows[1], vec![Value::Int(99), Value::Null, Value::Null, Value::Null]);
    }

    #[test]
    fn test_column_repair_without_matches_returns_response() {
        let response = Table::from_rows("result", vec!["id".to_string()], vec![vec![Value::Int(42)]]);
        let repaired = repair_columns(&users(), response.clone());
        assert_eq!(repaired, response);

        let unrelated = Table::from_rows("result", vec!["total".to_string()], vec![vec![Value::Int(7)]]);
        assert_eq!(repair_columns(&users(), unrelated.clone()), unrelated);
    }

    #[test]
    fn test_list_and_mapping_responses() {
        let records = normalize_response(&users(), EngineResponse::List(vec![json!({"city": "Oslo", "n": 2})]));
        let table = records.as_table().unwrap();
        assert_eq!(table.column_names(), vec!["city", "n"]);

        let scalars = normalize_response(&users(), EngineResponse::List(vec![json!(1), json!(2)]));
        assert_eq!(scalars.as_table().unwrap().column_names(), vec!["value"]);

        let mut columns = serde_json::Map::new();
        columns.insert("city".to_string(), json!(["Oslo", "Bergen"]));
        columns.insert("n".to_string(), json!([2, 3]));
        let mapping = normalize_response(&users(), EngineResponse::Mapping(columns));
        assert_eq!(mapping.as_table().unwrap().row_count(), 2);

        let mixed = normalize_response(&users(), EngineResponse::List(vec![json!({"a": 1}), json!(2)]));
        let table = mixed.as_table().unwrap();
        assert_eq!(table.column_names(), vec!["Result"]);
        assert_eq!(table.rows[0][0], text(r#"[{"a":1},2]"#));
    }

    #[test]
    fn test_scalar_responses() {
        assert_eq!(
            normalize_response(&users(), EngineResponse::Text("32.75".to_string())),
            Answer::Scalar("32.75".to_string())
        );
        assert_eq!(normalize_response(&users(), EngineResponse::Number(4.0)), Answer::Scalar("4".to_string()));
        assert_eq!(
            normalize_response(&users(), EngineResponse::Other(json!(true))),
            Answer::Scalar("true".to_string())
        );
    }
}
