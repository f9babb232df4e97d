use axum::{
    extract::{Multipart, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::api::handlers::{session_for, AppState};
use crate::api::middleware::AppError;
use crate::models::SetDatasetRequest;
use crate::validation::InputValidator;

const UPLOAD_PREVIEW_ROWS: usize = 20;
const PREVIEW_ROWS: usize = 100;

/// List registered datasets, the active one and the chat history
pub async fn list_datasets(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (jar, sid) = session_for(&state, jar);
    let body = state.sessions.with_session(&sid, |session| {
        json!({
            "ok": true,
            "datasets": session.dataset_names(),
            "active": session.active,
            "history": session.history,
        })
    })?;
    Ok((jar, Json(body)))
}

/// Upload a dataset file (multipart field `file`) and make it active
pub async fn upload_dataset(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (jar, sid) = session_for(&state, jar);

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (raw_name, bytes) = upload.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    let file_name = InputValidator::validate_file_name(&raw_name)?;
    tracing::info!("Upload received: {} ({} bytes)", file_name, bytes.len());

    // Parsing is CPU bound and SQL ingestion runs an embedded engine
    let loader = state.loader.clone();
    let name = file_name.clone();
    let tables = tokio::task::spawn_blocking(move || loader.load(&name, &bytes))
        .await
        .map_err(|e| AppError::Internal(format!("Loader task failed: {}", e)))??
        .into_tables();

    let added = state.sessions.add_datasets(&sid, tables)?;
    tracing::info!("Registered {} dataset(s) from {}: {:?}", added.len(), file_name, added);

    let body = state.sessions.with_session(&sid, |session| {
        let active = session.active_table();
        json!({
            "ok": true,
            "dataset": session.active,
            "columns": active.map(|t| t.column_names()).unwrap_or_default(),
            "preview": active.map(|t| t.head(UPLOAD_PREVIEW_ROWS).to_records()).unwrap_or_default(),
            "datasets": session.dataset_names(),
        })
    })?;
    Ok((jar, Json(body)))
}

/// Switch the active dataset
pub async fn set_active_dataset(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SetDatasetRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (jar, sid) = session_for(&state, jar);

    let name = payload
        .dataset
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Validation("Dataset name cannot be empty".to_string()))?;

    state.sessions.set_active(&sid, &name)?;
    tracing::info!("Active dataset set to {}", name);

    Ok((jar, Json(json!({ "ok": true, "active": name }))))
}

/// First rows of the active dataset
pub async fn preview_dataset(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (jar, sid) = session_for(&state, jar);

    let table = state
        .sessions
        .active_table(&sid)?
        .ok_or_else(|| AppError::NotFound("No active dataset".to_string()))?;

    Ok((
        jar,
        Json(json!({
            "ok": true,
            "dataset": table.name,
            "columns": table.column_names(),
            "preview": table.head(PREVIEW_ROWS).to_records(),
            "total_rows": table.row_count(),
        })),
    ))
}
