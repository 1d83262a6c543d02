//! Request/response payloads and error mapping for the HTTP API

use crate::error::TypesetError;
use crate::pipeline::{TypesetResult, UploadRecord, WordResult};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::{Deserialize, Serialize};

pub const COMPLETION_SUGGESTION: &str = "请检查API密钥是否正确，或稍后重试。";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub text_preview: String,
    pub extracted_text: String,
    pub intent: String,
}

impl From<UploadRecord> for UploadResponse {
    fn from(record: UploadRecord) -> Self {
        Self {
            success: true,
            message: "文件上传成功".to_string(),
            filename: record.filename,
            text_preview: record.text_preview,
            extracted_text: record.extracted_text,
            intent: record.intent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypesetResponse {
    pub success: bool,
    pub message: String,
    pub html: String,
    pub html_url: String,
    pub filename: String,
}

impl From<TypesetResult> for TypesetResponse {
    fn from(result: TypesetResult) -> Self {
        Self {
            success: true,
            message: "排版完成".to_string(),
            html: result.html,
            html_url: result.html_url,
            filename: result.filename,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    pub download_url: String,
    pub filename: String,
}

impl From<WordResult> for ConvertResponse {
    fn from(result: WordResult) -> Self {
        Self {
            success: true,
            message: "Word文档生成成功".to_string(),
            download_url: result.download_url,
            filename: result.filename,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Which request the error came from; decides the generic failure label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Typeset,
    Convert,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: error.into(),
                ..ErrorBody::default()
            },
        }
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: error.into(),
                ..ErrorBody::default()
            },
        }
    }

    pub fn payload_too_large(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            body: ErrorBody {
                error: error.into(),
                ..ErrorBody::default()
            },
        }
    }

    pub fn from_stage(stage: Stage, err: TypesetError) -> Self {
        let err = match err {
            TypesetError::InvalidInput(msg) => return Self::bad_request(msg),
            other => other,
        };

        error!("{:?} request failed: {}", stage, err);

        let body = match (stage, err) {
            (_, TypesetError::MissingCredential(var)) => ErrorBody {
                error: "服务器配置错误".to_string(),
                message: Some(format!("未配置DeepSeek API密钥。请在.env文件中设置{}。", var)),
                ..ErrorBody::default()
            },
            (Stage::Upload, err) => ErrorBody {
                error: "文件上传失败".to_string(),
                details: Some(details(err)),
                ..ErrorBody::default()
            },
            (Stage::Typeset, err) => ErrorBody {
                error: "排版失败".to_string(),
                details: Some(details(err)),
                suggestion: Some(COMPLETION_SUGGESTION.to_string()),
                ..ErrorBody::default()
            },
            (Stage::Convert, err) => ErrorBody {
                error: "Word文档生成失败".to_string(),
                details: Some(details(err)),
                ..ErrorBody::default()
            },
        };

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body,
        }
    }
}

/// The underlying message without our own variant prefix.
fn details(err: TypesetError) -> String {
    match err {
        TypesetError::Completion { message, .. } => message,
        TypesetError::Conversion(message)
        | TypesetError::Storage(message)
        | TypesetError::Extraction(message) => message,
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_maps_to_400_with_bare_error() {
        let err = ApiError::from_stage(Stage::Typeset, TypesetError::InvalidInput("缺少HTML内容".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let json = serde_json::to_value(&err.body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "缺少HTML内容"}));
    }

    #[test]
    fn test_missing_credential_is_configuration_response() {
        let err = ApiError::from_stage(
            Stage::Typeset,
            TypesetError::MissingCredential("DEEPSEEK_API_KEY".to_string()),
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.error, "服务器配置错误");
        let message = err.body.message.as_deref().unwrap();
        assert!(message.contains("DEEPSEEK_API_KEY"));
        assert!(message.contains(".env"));
        assert!(err.body.suggestion.is_none());
    }

    #[test]
    fn test_completion_failure_echoes_upstream_message() {
        let err = ApiError::from_stage(
            Stage::Typeset,
            TypesetError::completion(Some(401), "Authentication Fails"),
        );
        assert_eq!(err.body.error, "排版失败");
        assert_eq!(err.body.details.as_deref(), Some("Authentication Fails"));
        assert_eq!(err.body.suggestion.as_deref(), Some(COMPLETION_SUGGESTION));
    }

    #[test]
    fn test_response_field_names_are_camel_case() {
        let response = ConvertResponse::from(WordResult {
            download_url: "/uploads/document-1.docx".to_string(),
            filename: "document-1.docx".to_string(),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["downloadUrl"], "/uploads/document-1.docx");
        assert_eq!(json["success"], true);
    }
}
