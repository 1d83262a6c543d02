//! HTTP request handlers for API endpoints

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::{info, warn};

use crate::pipeline::TypesetRequest;
use crate::server::types::{
    ApiError, ConvertRequest, ConvertResponse, HealthResponse, Stage, TypesetResponse, UploadResponse,
};
use crate::server::AppState;

pub const UPLOAD_FIELD: &str = "textFile";
pub const INTENT_FIELD: &str = "intent";
const MISSING_UPLOAD: &str = "请上传文本文件";
const MALFORMED_BODY: &str = "请求体格式错误";
const UPLOAD_TOO_LARGE: &str = "文件大小超出限制";

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "快速排版服务运行正常".to_string(),
    })
}

/// Accept a multipart upload (`textFile` plus optional `intent`) and return
/// its extracted text.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Rejected upload request: {}", e);
        ApiError::bad_request(MISSING_UPLOAD)
    })?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut intent: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e)),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(UPLOAD_FIELD) => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((original_name, bytes.to_vec()));
            }
            Some(INTENT_FIELD) => {
                intent = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let (original_name, bytes) = file.ok_or_else(|| ApiError::bad_request(MISSING_UPLOAD))?;
    info!("Upload received: {} ({} bytes)", original_name, bytes.len());

    let record = state
        .pipeline
        .upload(&original_name, &bytes, intent.as_deref())
        .await
        .map_err(|e| ApiError::from_stage(Stage::Upload, e))?;

    Ok(Json(record.into()))
}

/// Typeset text with the completion endpoint and return the generated HTML.
pub async fn typeset(
    State(state): State<AppState>,
    request: Result<Json<TypesetRequest>, JsonRejection>,
) -> Result<Json<TypesetResponse>, ApiError> {
    let Json(request) = request.map_err(|e| malformed(e.body_text()))?;

    let result = state
        .pipeline
        .typeset(&request)
        .await
        .map_err(|e| ApiError::from_stage(Stage::Typeset, e))?;

    Ok(Json(result.into()))
}

/// Convert HTML into a downloadable Word document.
pub async fn convert_to_word(
    State(state): State<AppState>,
    request: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(request) = request.map_err(|e| malformed(e.body_text()))?;

    let result = state
        .pipeline
        .convert_to_word(request.html.as_deref(), request.filename.as_deref())
        .await
        .map_err(|e| ApiError::from_stage(Stage::Convert, e))?;

    Ok(Json(result.into()))
}

/// Any `/api/*` path without a route.
pub async fn api_not_found() -> ApiError {
    ApiError::not_found("API端点不存在")
}

/// Body-limit hits become 413, anything else the client sent wrong is a 400.
fn multipart_error(e: MultipartError) -> ApiError {
    warn!("Malformed multipart body: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let mut err = ApiError::payload_too_large(UPLOAD_TOO_LARGE);
        err.body.details = Some(e.body_text());
        err
    } else {
        malformed(e.body_text())
    }
}

fn malformed(details: String) -> ApiError {
    let mut err = ApiError::bad_request(MALFORMED_BODY);
    err.body.details = Some(details);
    err
}
