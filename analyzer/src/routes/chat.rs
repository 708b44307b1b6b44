use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::AppState;

use super::types::{ChatRequest, ChatResponse, ErrorBody};

pub fn chat_routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(err) => {
            warn!(error = %err, "chat body could not be decoded");
            ChatRequest::default()
        }
    };

    let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(document_text), Some(question)) =
        (present(request.document_text), present(request.question))
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new(
                "Both document_text and question are required",
                "missing_fields",
            )),
        ));
    };

    info!(
        document_chars = document_text.chars().count(),
        question_chars = question.chars().count(),
        "chat question received"
    );
    let answer = state.pipeline.chat(&document_text, &question).await;

    Ok(Json(ChatResponse {
        question,
        answer,
        timestamp: Utc::now(),
    }))
}
