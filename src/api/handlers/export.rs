use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::api::handlers::{session_for, AppState};
use crate::api::middleware::AppError;
use crate::services::pdf_export::{export_report, REPORT_FILE_NAME};

/// Render the latest chat entry as a downloadable PDF report
pub async fn export_pdf(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let (jar, sid) = session_for(&state, jar);

    let transcript = state
        .sessions
        .with_session(&sid, |session| session.last_entry().map(|entry| entry.transcript()))?
        .ok_or_else(|| AppError::Validation("No chat history to export".to_string()))?;

    let bytes = tokio::task::spawn_blocking(move || export_report(&transcript))
        .await
        .map_err(|e| AppError::Internal(format!("Export task failed: {}", e)))?
        .map_err(|e| AppError::Export(e.to_string()))?;

    Ok((
        jar,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILE_NAME),
            ),
        ],
        bytes,
    )
        .into_response())
}
