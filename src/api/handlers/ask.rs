use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::api::handlers::{session_for, AppState};
use crate::api::middleware::AppError;
use crate::models::{AskRequest, ChatEntry};
use crate::services::presenter::present;
use crate::validation::InputValidator;

/// Answer a question about the active dataset and record it in the history
pub async fn ask_question(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<AskRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (jar, sid) = session_for(&state, jar);
    let question = InputValidator::validate_question(&payload.question)?;

    let table = state
        .sessions
        .active_table(&sid)?
        .ok_or_else(|| AppError::Validation("No active dataset. Upload a file first.".to_string()))?;

    tracing::info!("Question on {}: {}", table.name, question);
    let answer = state.resolver.resolve(&table, &question).await?;
    let presentation = present(&answer);

    state.sessions.append_history(
        &sid,
        ChatEntry::new(question, presentation.plain_text, presentation.html.clone()),
    )?;
    let history = state.sessions.history(&sid)?;

    Ok((
        jar,
        Json(json!({
            "ok": true,
            "answer": presentation.html,
            "chart": presentation.chart.map(|c| c.to_plotly_json()),
            "history": history,
        })),
    ))
}

/// Chat history of the current session
pub async fn get_history(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let (jar, sid) = session_for(&state, jar);
    let history = state.sessions.history(&sid)?;
    Ok((jar, Json(json!({ "ok": true, "history": history }))))
}
