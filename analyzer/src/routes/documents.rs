use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
};
use chrono::Utc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    AppState,
    ai::analysis::{AnalysisProfile, truncate_chars},
    pipeline::{
        extractor::{DocumentFormat, SUPPORTED_EXTENSIONS},
        pipeline::{AnalysisMode, PipelineOutcome},
    },
};

use super::types::{ErrorBody, UploadResponse};

const ENHANCED_ECHO_CHARS: usize = 500;

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn document_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/uploads", post(upload))
        .route("/enhanced_analysis", post(enhanced_analysis))
}

struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    user_role: Option<String>,
    language: Option<String>,
}

fn bad_request(error: impl Into<String>, reason: &'static str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(error, reason)))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let span = info_span!("upload", request_id = %Uuid::new_v4(), route = "/uploads");
    async move {
        let form = read_upload(multipart).await?;
        process_upload(&state, form, AnalysisMode::Basic, None).await
    }
    .instrument(span)
    .await
}

async fn enhanced_analysis(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let span = info_span!(
        "upload",
        request_id = %Uuid::new_v4(),
        route = "/enhanced_analysis"
    );
    async move {
        let form = read_upload(multipart).await?;
        let defaults = AnalysisProfile::default();
        let profile = AnalysisProfile {
            user_role: non_blank(form.user_role.clone()).unwrap_or(defaults.user_role),
            language: non_blank(form.language.clone()).unwrap_or(defaults.language),
        };
        process_upload(
            &state,
            form,
            AnalysisMode::Enhanced(profile),
            Some(ENHANCED_ECHO_CHARS),
        )
        .await
    }
    .instrument(span)
    .await
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut user_role = None;
    let mut language = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        bad_request(
            format!("invalid multipart payload: {err}"),
            "invalid_multipart",
        )
    })? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().map(|name| name.to_string());
                let data = field.bytes().await.map_err(|err| {
                    bad_request(
                        format!("failed to read upload field: {err}"),
                        "invalid_multipart",
                    )
                })?;
                file = Some((filename, data.to_vec()));
            }
            Some("user_role") => user_role = field.text().await.ok(),
            Some("language") => language = field.text().await.ok(),
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| bad_request("No file uploaded", "missing_file"))?;
    let filename = filename
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| bad_request("Empty filename", "empty_filename"))?;

    Ok(UploadForm {
        filename,
        bytes,
        user_role,
        language,
    })
}

async fn process_upload(
    state: &AppState,
    form: UploadForm,
    mode: AnalysisMode,
    echo_limit: Option<usize>,
) -> Result<Json<UploadResponse>, ApiError> {
    let format = DocumentFormat::from_filename(&form.filename).ok_or_else(|| {
        warn!(filename = %form.filename, "unsupported file type");
        bad_request(
            format!(
                "Unsupported file type. Supported types: {}",
                SUPPORTED_EXTENSIONS.join(", ")
            ),
            "unsupported_file_type",
        )
    })?;
    info!(filename = %form.filename, ?format, bytes = form.bytes.len(), "upload received");

    let outcome = state
        .pipeline
        .process(Arc::from(form.bytes), format, &mode)
        .await;

    let document = match outcome {
        PipelineOutcome::Accepted(document) => *document,
        PipelineOutcome::Rejected(rejected) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::rejected(rejected.classification)),
            ));
        }
    };

    let extracted_text = match echo_limit {
        Some(limit) => truncate_chars(&document.extraction.text, limit),
        None => document.extraction.text,
    };

    Ok(Json(UploadResponse {
        filename: form.filename,
        document_type: document.document_type,
        extracted_text,
        analysis: document.analysis,
        classification: document.classification,
        timestamp: Utc::now(),
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
