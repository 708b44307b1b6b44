use std::sync::Arc;

use anyhow::Result;
use axum::{
    Form, Json, Router,
    body::Body,
    extract::{FromRequest, Multipart, Request},
    http::{
        Response, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    routing::post,
};
use tracing::{error, info};

use crate::{
    AppState,
    export::{render_docx, render_pdf},
};

use super::types::{ErrorBody, ExportForm};

type ApiError = (StatusCode, Json<ErrorBody>);

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub fn export_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/export/pdf", post(export_pdf))
        .route("/export/docx", post(export_docx))
}

async fn export_pdf(request: Request) -> Result<Response<Body>, ApiError> {
    let text = read_text_field(request).await?;
    attachment(render_pdf(&text), "application/pdf", "output.pdf")
}

async fn export_docx(request: Request) -> Result<Response<Body>, ApiError> {
    let text = read_text_field(request).await?;
    attachment(render_docx(&text), DOCX_MIME, "output.docx")
}

/// The `text` field from either a multipart or a url-encoded form; absent means empty.
async fn read_text_field(request: Request) -> Result<String, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|err| bad_form(err.to_string()))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| bad_form(err.to_string()))?
        {
            if field.name() == Some("text") {
                return field.text().await.map_err(|err| bad_form(err.to_string()));
            }
        }
        return Ok(String::new());
    }

    if content_type.is_empty() {
        return Ok(String::new());
    }

    let Form(form) = Form::<ExportForm>::from_request(request, &())
        .await
        .map_err(|err| bad_form(err.to_string()))?;
    Ok(form.text)
}

fn bad_form(detail: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new(
            format!("invalid form payload: {detail}"),
            "invalid_form",
        )),
    )
}

fn attachment(
    rendered: Result<Vec<u8>>,
    mime: &'static str,
    filename: &'static str,
) -> Result<Response<Body>, ApiError> {
    let internal = |message: String| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(message, "export_failed")),
        )
    };

    let bytes = rendered.map_err(|err| {
        error!(error = %err, filename, "export rendering failed");
        internal(format!("Failed to generate {filename}: {err}"))
    })?;
    info!(filename, bytes = bytes.len(), "export generated");

    Response::builder()
        .header(CONTENT_TYPE, mime)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .map_err(|err| internal(format!("Error in sending response {err}")))
}
