//! HTTP exposition of the cached status and the optional server log

use crate::status::StatusStore;
use crate::wait_for_shutdown;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: StatusStore,
    pub log_path: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(store: StatusStore, log_path: Option<PathBuf>) -> Self {
        Self {
            store,
            log_path: log_path.map(Arc::new),
        }
    }
}

/// Builds the router serving `/` and `/log`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/log", get(log_file))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

/// `GET /`: reports the cached status, never touches the game server
async fn status(State(state): State<AppState>) -> Response {
    let current = state.store.read().await;
    json_response(&current.report())
}

/// `GET /log`: streams the configured log file with range/conditional support
async fn log_file(State(state): State<AppState>, request: Request) -> Response {
    let Some(path) = state.log_path.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let Err(e) = check_readable(path).await {
        warn!("Cannot serve log file {}: {}", path.display(), e);
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("ERROR: {}", e)).into_response();
    }

    let served = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    finish_log_response(path, served.map(Body::new))
}

/// Turns `ServeFile` failures into the same 500 the pre-check produces.
///
/// The file can vanish or lose its permissions between the check and the
/// second open, in which case `ServeFile` answers 404 on its own.
fn finish_log_response(path: &std::path::Path, mut response: Response) -> Response {
    let status = response.status();
    let answered = !(status.is_client_error() || status.is_server_error())
        || status == StatusCode::RANGE_NOT_SATISFIABLE
        || status == StatusCode::PRECONDITION_FAILED;
    if !answered {
        warn!("Serving log file {} failed with {}", path.display(), status);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ERROR: cannot serve {}: {}", path.display(), status),
        )
            .into_response();
    }

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Opens and stats the file up front so failures become a 500 with the
/// I/O error text rather than a generic 404.
async fn check_readable(path: &std::path::Path) -> io::Result<()> {
    let file = tokio::fs::File::open(path).await?;
    let metadata = file.metadata().await?;
    if metadata.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} is a directory", path.display()),
        ));
    }
    Ok(())
}

fn json_response<T: Serialize>(body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            [
                (CONTENT_TYPE, "application/json"),
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode status response: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Accepts connections until `shutdown` fires.
///
/// Connections are driven by hyper directly so that slow clients are cut off
/// after `header_read_timeout` without a complete request head.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    header_read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!("HTTP status server listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(e) => {
                    warn!("Failed to accept HTTP connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
            _ = wait_for_shutdown(&mut shutdown) => break,
        };

        let app = app.clone();
        tokio::spawn(async move {
            let service =
                service_fn(move |request: hyper::Request<Incoming>| app.clone().oneshot(request));

            let mut builder = http1::Builder::new();
            builder
                .timer(TokioTimer::new())
                .header_read_timeout(header_read_timeout);

            if let Err(e) = builder
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("HTTP connection from {} closed with error: {}", peer, e);
            }
        });
    }

    info!("HTTP status server stopped");
    Ok(())
}
