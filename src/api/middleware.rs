use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Query prompt is empty")]
    EmptyQuestion,

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("No tables found in SQL file")]
    NoTablesFound,

    #[error("AI analysis failed: {0}")]
    AiAnalysisFailed(String),

    #[error("Failed to load dataset: {0}")]
    Load(String),

    #[error("PDF export failed: {0}")]
    Export(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match self {
            AppError::EmptyQuestion => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("EMPTY_QUESTION", "Question cannot be empty"),
            ),
            AppError::UnsupportedFileType(name) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("UNSUPPORTED_FILE_TYPE", "Unsupported file type")
                    .with_details(format!("{} (supported: .csv, .xlsx, .xls, .txt, .sql)", name)),
            ),
            AppError::NoTablesFound => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("NO_TABLES_FOUND", "No tables found in SQL"),
            ),
            AppError::AiAnalysisFailed(msg) => {
                let enhanced_msg = if msg.contains("not configured") {
                    format!("{} Please configure LLM_GATEWAY_URL to enable AI analysis.", msg)
                } else {
                    msg
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetail::new("AI_ANALYSIS_FAILED", enhanced_msg),
                )
            }
            AppError::Load(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("LOAD_FAILED", "Failed to load dataset").with_details(msg),
            ),
            AppError::Export(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("EXPORT_FAILED", msg),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg),
            ),
        };

        let body = Json(ErrorResponse {
            ok: false,
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Load(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Load(err.to_string())
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        AppError::Load(err.to_string())
    }
}
