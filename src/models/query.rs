use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::table::Table;

/// Outcome of resolving a question against a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Answer {
    Table(Table),
    Scalar(String),
    Error(String),
}

impl Answer {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Answer::Table(table) => Some(table),
            _ => None,
        }
    }
}

// ============================================================================
// Chat History Models (Session-Scoped)
// ============================================================================

/// ChatEntry - one question and its rendered answer, never mutated once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: String,
    #[serde(rename = "q")]
    pub question: String,
    #[serde(rename = "a")]
    pub answer_text: String,
    #[serde(rename = "a_html")]
    pub answer_html: String,
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(question: String, answer_text: String, answer_html: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question,
            answer_text,
            answer_html,
            created_at: Utc::now(),
        }
    }

    /// Text handed to the report exporter for this entry
    pub fn transcript(&self) -> String {
        format!("Query: {}\n\n Output:\n  {}", self.question, self.answer_text)
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SetDatasetRequest {
    pub dataset: Option<String>,
}
