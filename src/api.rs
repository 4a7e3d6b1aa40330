//! HTTP surface for docdigest.
//!
//! - `GET /` – Liveness check.
//! - `POST /documents/upload/` – Multipart upload (`file`, optional `length` and `retries`).
//!   Responds `201` with `{id, filename, summary, message?}`; the summary is `null` when every
//!   summarization attempt failed.
//! - `GET /documents/` – Recent documents without their content, newest first.
//! - `GET /documents/:id` – One document including its extracted text.
//! - `GET /metrics` – Upload counters.
//!
//! Every error body is `{"detail": "..."}`.

use crate::extraction::ExtractionError;
use crate::metrics::MetricsSnapshot;
use crate::processing::{DEFAULT_RETRIES, UploadApi, UploadError, UploadRequest};
use crate::repository::Document;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{any::Any, sync::Arc};
use time::OffsetDateTime;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

/// Build the HTTP router; request bodies above `max_upload_bytes` are rejected with `413`.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: UploadApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/documents/upload/", post(upload_document::<S>))
        .route("/documents/", get(list_documents::<S>))
        .route("/documents/:id", get(get_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Success response for `POST /documents/upload/`.
#[derive(Serialize)]
struct UploadResponse {
    id: i64,
    filename: String,
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Accept a multipart upload and run it through the pipeline.
///
/// A missing `length` falls back to `medium` and a missing `retries` to one extra attempt.
/// Unknown form fields are ignored.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError>
where
    S: UploadApi,
{
    let mut multipart = multipart.map_err(|rejection| {
        AppError::new(rejection.status(), rejection.body_text())
    })?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut length = String::new();
    let mut retries: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(AppError::multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(AppError::multipart)?;
                file = Some((filename, data.to_vec()));
            }
            "length" => length = field.text().await.map_err(AppError::multipart)?,
            "retries" => retries = Some(field.text().await.map_err(AppError::multipart)?),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "No file uploaded"))?;
    let retries = parse_retries(retries.as_deref())?;

    let outcome = service
        .upload(UploadRequest {
            filename,
            data,
            length,
            retries,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: outcome.document.id,
            filename: outcome.document.filename,
            summary: outcome.document.summary,
            message: outcome.message,
        }),
    ))
}

fn parse_retries(raw: Option<&str>) -> Result<i64, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_RETRIES),
        Some(value) => value.parse().map_err(|_| {
            AppError::new(
                StatusCode::BAD_REQUEST,
                format!("Invalid retries value '{value}'; expected an integer"),
            )
        }),
    }
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<u32>,
}

/// Listing entry; the extracted content is only served by `GET /documents/:id`.
#[derive(Serialize)]
struct DocumentListItem {
    id: i64,
    filename: String,
    summary: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    uploaded_at: OffsetDateTime,
}

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentListItem>,
}

async fn list_documents<S>(
    State(service): State<Arc<S>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<DocumentsResponse>, AppError>
where
    S: UploadApi,
{
    let Query(params) =
        params.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let documents = service
        .documents(limit)
        .await?
        .into_iter()
        .map(|document| DocumentListItem {
            id: document.id,
            filename: document.filename,
            summary: document.summary,
            uploaded_at: document.uploaded_at,
        })
        .collect();
    Ok(Json(DocumentsResponse { documents }))
}

async fn get_document<S>(
    State(service): State<Arc<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Document>, AppError>
where
    S: UploadApi,
{
    let Path(id) = id.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;
    service
        .document(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "Document not found"))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = message, "Request handler panicked");
    AppError::internal().into_response()
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: UploadApi,
{
    Json(service.metrics_snapshot())
}

/// Error response rendered as `{"detail": ...}` with the mapped status code.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn multipart(error: MultipartError) -> Self {
        tracing::debug!(%error, "Rejected multipart body");
        Self::new(error.status(), error.body_text())
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            UploadError::Extraction(error @ ExtractionError::UnsupportedType { .. }) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, error.to_string())
            }
            UploadError::Extraction(error) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
            }
            error @ UploadError::StorageWrite(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
            error @ (UploadError::Repository(_) | UploadError::Internal(_)) => {
                tracing::error!(error = %error, "Unexpected failure while handling request");
                Self::internal()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::extraction::ExtractionError;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{UploadApi, UploadError, UploadOutcome, UploadRequest};
    use crate::repository::{Document, RepositoryError};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use std::sync::{Arc, Mutex};
    use time::OffsetDateTime;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docdigest-boundary";

    #[derive(Default)]
    struct StubUploadService {
        requests: Mutex<Vec<UploadRequest>>,
        limits: Mutex<Vec<u32>>,
        failure: Mutex<Option<UploadError>>,
        summary: Option<String>,
        panics: bool,
    }

    impl StubUploadService {
        fn failing(error: UploadError) -> Self {
            Self {
                failure: Mutex::new(Some(error)),
                ..Self::default()
            }
        }

        fn summarizing(summary: &str) -> Self {
            Self {
                summary: Some(summary.to_string()),
                ..Self::default()
            }
        }
    }

    fn document(id: i64, filename: &str, summary: Option<String>) -> Document {
        Document {
            id,
            filename: filename.into(),
            content: "full text".into(),
            summary,
            uploaded_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[async_trait]
    impl UploadApi for StubUploadService {
        async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError> {
            if self.panics {
                panic!("extractor blew up");
            }
            if let Some(error) = self.failure.lock().unwrap().take() {
                return Err(error);
            }
            let filename = request.filename.clone();
            self.requests.lock().unwrap().push(request);
            let message = self
                .summary
                .is_none()
                .then(|| "Summarization failed after 2 attempts: boom".to_string());
            Ok(UploadOutcome {
                document: document(7, &filename, self.summary.clone()),
                message,
                attempts: 1,
            })
        }

        async fn document(&self, id: i64) -> Result<Option<Document>, UploadError> {
            Ok((id == 7).then(|| document(7, "notes.txt", Some("s".into()))))
        }

        async fn documents(&self, limit: u32) -> Result<Vec<Document>, UploadError> {
            self.limits.lock().unwrap().push(limit);
            Ok(vec![document(2, "b.txt", None), document(1, "a.txt", Some("s".into()))])
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_persisted: 3,
                summaries_generated: 2,
                summaries_missing: 1,
                summary_attempts: 5,
            }
        }
    }

    enum Part<'a> {
        File(&'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart(parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(filename, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/documents/upload/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn router(service: Arc<StubUploadService>) -> Router {
        create_router(service, 1024 * 1024)
    }

    #[tokio::test]
    async fn root_reports_ok() {
        let (status, body) = send(router(Arc::default()), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn upload_forwards_form_fields() {
        let service = Arc::new(StubUploadService::summarizing("short summary"));
        let request = multipart(&[
            Part::File("notes.txt", b"Hello from txt file"),
            Part::Text("length", "short"),
            Part::Text("retries", "3"),
        ]);
        let (status, body) = send(router(service.clone()), request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 7);
        assert_eq!(body["filename"], "notes.txt");
        assert_eq!(body["summary"], "short summary");
        assert!(body.get("message").is_none());

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].data, b"Hello from txt file");
        assert_eq!(requests[0].length, "short");
        assert_eq!(requests[0].retries, 3);
    }

    #[tokio::test]
    async fn upload_applies_defaults() {
        let service = Arc::new(StubUploadService::default());
        let (status, body) = send(
            router(service.clone()),
            multipart(&[Part::File("notes.txt", b"text")]),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["summary"].is_null());
        assert_eq!(body["message"], "Summarization failed after 2 attempts: boom");
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests[0].length, "");
        assert_eq!(requests[0].retries, 1);
    }

    #[tokio::test]
    async fn upload_without_file_is_bad_request() {
        let service = Arc::new(StubUploadService::default());
        let (status, body) = send(
            router(service.clone()),
            multipart(&[Part::Text("length", "short")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No file uploaded");
        assert!(service.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_integer_retries_is_bad_request() {
        let (status, body) = send(
            router(Arc::default()),
            multipart(&[Part::File("notes.txt", b"text"), Part::Text("retries", "many")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap_or_default().contains("many"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = create_router(Arc::new(StubUploadService::default()), 64);
        let (status, _) = send(app, multipart(&[Part::File("big.txt", &[b'a'; 4096])])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upload_errors_map_to_statuses() {
        let cases = [
            (
                UploadError::Validation("Uploaded file is empty".into()),
                StatusCode::BAD_REQUEST,
                "Uploaded file is empty",
            ),
            (
                UploadError::Extraction(ExtractionError::UnsupportedType {
                    filename: "image.jpg".into(),
                }),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Unsupported file type 'image.jpg'; supported: .pdf, .docx, .txt",
            ),
            (
                UploadError::Extraction(ExtractionError::EmptyContent),
                StatusCode::UNPROCESSABLE_ENTITY,
                "No extractable text found in the uploaded file",
            ),
            (
                UploadError::Repository(RepositoryError::MissingAfterInsert(1)),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ),
        ];

        for (error, expected_status, expected_detail) in cases {
            let service = Arc::new(StubUploadService::failing(error));
            let (status, body) =
                send(router(service), multipart(&[Part::File("x.txt", b"x")])).await;
            assert_eq!(status, expected_status);
            assert_eq!(body["detail"], expected_detail);
        }
    }

    #[tokio::test]
    async fn panicking_handler_becomes_internal_error() {
        let service = Arc::new(StubUploadService {
            panics: true,
            ..StubUploadService::default()
        });
        let (status, body) =
            send(router(service), multipart(&[Part::File("x.pdf", b"%PDF")])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal Server Error");

        let (status, _) = send(router(Arc::default()), get("/")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn document_lookup_returns_content_or_404() {
        let (status, body) = send(router(Arc::default()), get("/documents/7")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "full text");
        assert_eq!(body["uploaded_at"], "1970-01-01T00:00:00Z");

        let (status, body) = send(router(Arc::default()), get("/documents/8")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Document not found");

        let (status, _) = send(router(Arc::default()), get("/documents/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_clamps_limit_and_omits_content() {
        let service = Arc::new(StubUploadService::default());
        let (status, body) = send(router(service.clone()), get("/documents/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"][0]["id"], 2);
        assert!(body["documents"][0].get("content").is_none());

        send(router(service.clone()), get("/documents/?limit=1000")).await;
        send(router(service.clone()), get("/documents/?limit=0")).await;
        assert_eq!(*service.limits.lock().unwrap(), vec![50, 200, 1]);
    }

    #[tokio::test]
    async fn metrics_expose_counters() {
        let (status, body) = send(router(Arc::default()), get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents_persisted"], 3);
        assert_eq!(body["summaries_missing"], 1);
        assert_eq!(body["summary_attempts"], 5);
    }
}
