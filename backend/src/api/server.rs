//! HTTP server.
//!
//! # API Endpoints
//!
//! | Method | Path           | Description                               |
//! |--------|----------------|-------------------------------------------|
//! | GET    | `/health`      | Health check                              |
//! | POST   | `/api/convert` | Convert an uploaded spreadsheet to XML    |
//! | GET    | `/api/logs`    | SSE stream of conversion logs             |
//!
//! `/api/convert` takes a multipart body with a `file` part, an optional
//! `mapping` part (mapping CSV, else `MAPPING_FILE` is used) and an optional
//! `filename` text part overriding the uploaded file name.

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, ConvertResponse};
use crate::config::Settings;
use crate::error::{ConvertError, ServerError, ServerResult};
use crate::mapping::MappingTable;
use crate::sheet::SheetFormat;
use crate::transform::pipeline::{convert_bytes, ConvertOptions};

type Rejection = (StatusCode, Json<Value>);

/// Shared, read-only server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
}

pub fn router(settings: Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(Arc::new(AppState { settings }))
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let port = settings.server_port;
    let app = router(settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_info(format!("Shipload server listening on http://localhost:{}", port));
    log_info("POST /api/convert, GET /api/logs, GET /health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shipload",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers skip the missed entries
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Parts of a convert request.
#[derive(Debug, Default)]
struct Upload {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    mapping: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if upload.file_name.is_none() {
                    upload.file_name = field.file_name().map(str::to_string);
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                upload.file = Some(bytes.to_vec());
            }
            "mapping" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                upload.mapping = Some(bytes.to_vec());
            }
            "filename" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                if !text.trim().is_empty() {
                    upload.file_name = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }
    Ok(upload)
}

async fn convert_upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>, Rejection> {
    run_conversion(&state, multipart).await.map(Json).map_err(|err| {
        log_error(err.to_string());
        (status_for(&err), Json(error_response(&err.to_string())))
    })
}

async fn run_conversion(state: &AppState, multipart: Multipart) -> ServerResult<ConvertResponse> {
    let upload = read_upload(multipart).await?;
    let bytes = upload
        .file
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    let file_name = upload.file_name.unwrap_or_else(|| "upload.xlsx".to_string());
    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("xlsx")
        .to_string();

    log_info(format!("Upload: {} ({} bytes)", file_name, bytes.len()));

    let mapping_bytes = upload.mapping;
    let settings = state.settings.clone();
    let options = ConvertOptions::from(&settings);

    let (conversion, xml) = tokio::task::spawn_blocking(move || -> Result<_, ConvertError> {
        let format = SheetFormat::from_extension(&extension)?;
        let mapping = match mapping_bytes {
            Some(bytes) => MappingTable::from_bytes(&bytes)?,
            None => MappingTable::load(&settings.require_mapping()?)?,
        };
        let conversion = convert_bytes(bytes, format, &mapping, &options)?;
        let xml = conversion.to_xml()?;
        Ok((conversion, xml))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Conversion task failed: {}", e)))??;

    Ok(ConvertResponse::new(file_name, conversion, xml))
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Convert(ConvertError::Config(_))
        | ServerError::Convert(ConvertError::Sheet(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Convert(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, SettingsError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ServerError::BadRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ServerError::Convert(ConfigError::Empty.into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ServerError::Convert(
                SettingsError::Missing("MAPPING_FILE".into()).into()
            )),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_router_builds() {
        let _ = router(Settings::default());
    }
}
