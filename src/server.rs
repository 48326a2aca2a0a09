use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::notify::{user_fine_message, ALARM_MESSAGE, FALSE_ALARM_MESSAGE};
use crate::service::FallDetectionService;
use crate::store::ResultStore;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

type AppState = Arc<FallDetectionService>;
type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveDataBody {
    csv_data: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    file_path: Option<String>,
}

#[derive(Deserialize)]
struct MessageBody {
    message: Option<String>,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/fall-detection/receive-data", post(receive_data_handler))
        .route("/fall-detection/analyze", post(analyze_handler))
        .route("/fall-detection/files", get(files_handler))
        .route("/fall-detection/cleanup", post(cleanup_handler))
        .route("/user-fine", post(user_fine_handler))
        .route("/discord/alarm", post(alarm_handler))
        .route("/discord/false-alarm", post(false_alarm_handler))
        .route("/discord/send-message", post(send_message_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Build the service from `config`, prune old uploads and serve until shutdown.
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let service = Arc::new(config.build_service()?);

    if let Some(store) = service.store() {
        log::info!("Results directory: {}", store.dir().display());
        match store.cleanup() {
            Ok(report) => log::info!("Initial cleanup: {} file(s) kept", report.remaining),
            Err(e) => log::warn!("Initial cleanup failed: {:#}", e),
        }
    } else {
        log::info!("Result storage disabled");
    }

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Fall detection server listening on http://{}", addr);

    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    log::info!(
        "{} {} - {} - {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "Fall Detection Server",
        "timestamp": timestamp(),
    }))
}

fn is_csv(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/csv"))
        .unwrap_or(false)
}

async fn receive_data_handler(State(service): State<AppState>, headers: HeaderMap, body: String) -> ApiResult {
    let csv = if is_csv(&headers) {
        body
    } else {
        serde_json::from_str::<ReceiveDataBody>(&body)
            .ok()
            .and_then(|b| b.csv_data)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No CSV data provided in JSON format"))?
    };

    let filename = service.store().and_then(|store| match store.save_upload(&csv) {
        Ok(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        Err(e) => {
            log::error!("Failed to save upload: {:#}", e);
            None
        }
    });

    let result = service.analyze_text(&csv).await;

    Ok(Json(json!({
        "message": "Data received and analyzed",
        "filename": filename,
        "timestamp": timestamp(),
        "dataLength": csv.len(),
        "fallDetected": result.fall_detected,
        "result": result,
    })))
}

async fn analyze_handler(State(service): State<AppState>, Json(body): Json<AnalyzeBody>) -> ApiResult {
    let file_path = body
        .file_path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "filePath is required"))?;

    let result = service
        .analyze_file(std::path::Path::new(&file_path))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to analyze file: {:#}", e)))?;

    Ok(Json(json!({
        "message": "File analyzed",
        "filePath": file_path,
        "fallDetected": result.fall_detected,
        "result": result,
        "timestamp": timestamp(),
    })))
}

fn require_store(service: &FallDetectionService) -> Result<&ResultStore, (StatusCode, Json<Value>)> {
    service
        .store()
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Result storage is disabled"))
}

async fn files_handler(State(service): State<AppState>) -> ApiResult {
    let listing = require_store(&service)?
        .list_files()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to list files: {:#}", e)))?;
    serde_json::to_value(listing)
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn cleanup_handler(State(service): State<AppState>) -> ApiResult {
    let store = require_store(&service)?;
    let report = store
        .cleanup()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Cleanup failed: {:#}", e)))?;

    Ok(Json(json!({
        "message": "Cleanup completed",
        "remainingFiles": report.remaining,
        "deleted": report.deleted,
        "config": {
            "maxFiles": store.policy().max_files,
            "maxSizeMB": store.policy().max_size_mb(),
        },
    })))
}

async fn relay(service: &FallDetectionService, message: &str, confirmation: &str) -> ApiResult {
    service
        .notifier()
        .send(message)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to send message: {:#}", e)))?;
    Ok(Json(json!({ "message": confirmation })))
}

async fn user_fine_handler(State(service): State<AppState>) -> ApiResult {
    relay(&service, &user_fine_message(Local::now()), "User status notification sent").await
}

async fn alarm_handler(State(service): State<AppState>) -> ApiResult {
    relay(&service, ALARM_MESSAGE, "Alarm sent").await
}

async fn false_alarm_handler(State(service): State<AppState>) -> ApiResult {
    relay(&service, FALSE_ALARM_MESSAGE, "False alarm sent").await
}

async fn send_message_handler(State(service): State<AppState>, Json(body): Json<MessageBody>) -> ApiResult {
    let message = body
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Message is required"))?;
    relay(&service, &message, "Message sent").await
}
