//! Integration tests for the typesetting HTTP service

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use quick_typeset::input::text_extractor::extract_docx_text;
use quick_typeset::output::docx::DocxConverter;
use quick_typeset::server::{self, AppState};
use quick_typeset::{Config, TypesetPipeline};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

const GOOD_KEY: &str = "sk-test";
const REJECTED_KEY: &str = "sk-rejected";

struct TestApp {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>, intent: Option<&str>) -> reqwest::Response {
        let mut form = Form::new().part("textFile", Part::bytes(bytes).file_name(name.to_string()));
        if let Some(intent) = intent {
            form = form.text("intent", intent.to_string());
        }
        self.client.post(self.url("/api/upload")).multipart(form).send().await.unwrap()
    }

    async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }
}

/// Chat-completion stand-in: rejects `REJECTED_KEY` like the real provider
/// and otherwise answers with a fenced HTML fragment echoing the intent.
async fn mock_completion(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth == format!("Bearer {}", REJECTED_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Authentication Fails (no such user)", "type": "authentication_error"}})),
        );
    }

    let user = body["messages"][1]["content"].as_str().unwrap_or_default();
    if body["model"] != "deepseek-chat" || body["messages"][0]["role"] != "system" || !user.contains("公文格式") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "unexpected request"}})));
    }

    let content = "```html\n<h1>会议通知</h1>\n<p>请各部门准时参加。</p>\n<script>alert(1)</script>\n```";
    (
        StatusCode::OK,
        Json(json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})),
    )
}

async fn spawn_mock_completion() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/v1/chat/completions", post(mock_completion));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

async fn spawn_app(api_key: Option<&str>) -> TestApp {
    spawn_app_with(api_key, |_| {}).await
}

async fn spawn_app_with(api_key: Option<&str>, customize: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let static_dir = dir.path().join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<html><body>front-end</body></html>").unwrap();

    let mut config = Config::default().with_api_key(api_key.map(str::to_string));
    config.storage.uploads_dir = dir.path().join("uploads");
    config.server.static_dir = static_dir;
    config.llm.api_base = spawn_mock_completion().await;
    customize(&mut config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(TypesetPipeline::new(config).unwrap());
    tokio::spawn(async move {
        server::serve(listener, state).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(None).await;
    let response = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok", "message": "快速排版服务运行正常"}));
}

#[tokio::test]
async fn test_upload_plain_text() {
    let app = spawn_app(None).await;
    let response = app
        .upload("notes.txt", "第一行\n第二行".as_bytes().to_vec(), Some("公文格式"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "文件上传成功");
    assert_eq!(body["extractedText"], "第一行\n第二行");
    assert_eq!(body["textPreview"], "第一行\n第二行");
    assert_eq!(body["intent"], "公文格式");

    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("textFile-"));
    assert!(filename.ends_with(".txt"));
}

#[tokio::test]
async fn test_upload_long_text_truncates_preview_only() {
    let app = spawn_app(None).await;
    let text = "字".repeat(600);
    let response = app.upload("long.txt", text.clone().into_bytes(), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    let preview = body["textPreview"].as_str().unwrap();
    assert_eq!(preview, format!("{}...", "字".repeat(500)));
    assert_eq!(body["extractedText"].as_str().unwrap(), text);
    assert!(!body["intent"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_word_document() {
    let app = spawn_app(None).await;
    let docx = DocxConverter::default()
        .convert("<h1>季度报告</h1><p>收入增长。</p>", Some("季度报告"))
        .unwrap();
    let response = app.upload("report.docx", docx, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["extractedText"], "季度报告\n\n收入增长。");
}

#[tokio::test]
async fn test_upload_unreadable_document_degrades() {
    let app = spawn_app(None).await;
    let response = app.upload("broken.docx", b"not a zip".to_vec(), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["extractedText"], "");
    assert_eq!(body["textPreview"], "[broken.docx - 文档解析失败，请确保文件格式正确]");
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let app = spawn_app(None).await;
    let form = Form::new().text("intent", "公文格式");
    let response = app.client.post(app.url("/api/upload")).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "请上传文本文件"}));
}

#[tokio::test]
async fn test_oversized_upload_is_client_error() {
    let app = spawn_app_with(None, |config| config.server.max_upload_bytes = 1024).await;
    let response = app.upload("big.txt", vec![b'a'; 4096], None).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "文件大小超出限制");
}

#[tokio::test]
async fn test_typeset_requires_text_and_intent() {
    let app = spawn_app(Some(GOOD_KEY)).await;
    let response = app.post_json("/api/typeset", json!({"text": "hello", "intent": ""})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "缺少文本内容或排版意图"}));
}

#[tokio::test]
async fn test_typeset_without_credential_is_configuration_error() {
    let app = spawn_app(None).await;
    let response = app.post_json("/api/typeset", json!({"text": "hello", "intent": "公文格式"})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "服务器配置错误");
    assert!(body["message"].as_str().unwrap().contains("DEEPSEEK_API_KEY"));
}

#[tokio::test]
async fn test_typeset_wraps_fragment_and_stores_html() {
    let app = spawn_app(Some(GOOD_KEY)).await;
    let response = app
        .post_json(
            "/api/typeset",
            json!({"extractedText": "会议通知 请各部门准时参加", "intent": "公文格式", "filename": "notice.txt"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "排版完成");
    let html = body["html"].as_str().unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<h1>会议通知</h1>"));
    assert!(html.contains("notice.txt"));
    assert!(!html.contains("```"));
    assert!(!html.contains("<script>alert(1)</script>"));

    let html_url = body["htmlUrl"].as_str().unwrap();
    assert_eq!(html_url, format!("/uploads/{}", body["filename"].as_str().unwrap()));
    let stored = app.client.get(app.url(html_url)).send().await.unwrap();
    assert_eq!(stored.status(), StatusCode::OK);
    assert_eq!(stored.text().await.unwrap(), html);
}

#[tokio::test]
async fn test_typeset_echoes_upstream_error() {
    let app = spawn_app(Some(REJECTED_KEY)).await;
    let response = app.post_json("/api/typeset", json!({"text": "hello", "intent": "公文格式"})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "排版失败");
    assert_eq!(body["details"], "Authentication Fails (no such user)");
    assert!(body["suggestion"].is_string());
}

#[tokio::test]
async fn test_convert_requires_html() {
    let app = spawn_app(None).await;
    let response = app.post_json("/api/convert-to-word", json!({"html": ""})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "缺少HTML内容"}));
}

#[tokio::test]
async fn test_convert_to_word_and_download() {
    let app = spawn_app(None).await;
    let response = app
        .post_json(
            "/api/convert-to-word",
            json!({"html": "<html><body><h1>标题</h1><p>正文内容</p></body></html>", "filename": "标题"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Word文档生成成功");
    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("document-"));
    assert!(filename.ends_with(".docx"));

    let download = app
        .client
        .get(app.url(body["downloadUrl"].as_str().unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    let bytes = download.bytes().await.unwrap();
    assert_eq!(extract_docx_text(&bytes).unwrap(), "标题\n\n正文内容");
}

#[tokio::test]
async fn test_unknown_api_path_is_json_404() {
    let app = spawn_app(None).await;
    let response = app.client.get(app.url("/api/does-not-exist")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "API端点不存在"}));
}

#[tokio::test]
async fn test_other_paths_fall_back_to_front_end() {
    let app = spawn_app(None).await;
    let response = app.client.get(app.url("/some/client/route")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("front-end"));
}
