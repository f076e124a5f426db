//! HTTP routes of the resource gateway.
//!
//! `GET`, `HEAD` and `PUT` on `/<resource path>` dispatch on the trailing
//! `/`: directory paths list, stat or create directories; other paths
//! read, stat or write contents.

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::gateway::store::{ResourceStore, StoreError, StoreResult};
use crate::sync::ResourcePath;
use crate::timefmt::{format_http_date, parse_http_date};

/// Header carrying the content checksum on `HEAD`
pub const CHECKSUM_HEADER: &str = "checksum";

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
}

// ─── Route builder ───────────────────────────────────────────────

pub fn build_router(store: Arc<dyn ResourceStore>) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/ping", get(ping))
        .route("/", any(root))
        .route("/*rsc_path", any(resource))
        .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────

async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "pong" }))
}

async fn root(
    State(state): State<Arc<AppState>>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, StoreError> {
    dispatch(&state, ResourcePath::root(), method, query, headers, body).await
}

async fn resource(
    State(state): State<Arc<AppState>>,
    Path(rsc_path): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, StoreError> {
    let path = ResourcePath::parse(&format!("/{}", rsc_path))
        .map_err(|e| StoreError::BadRequest(e.to_string()))?;
    dispatch(&state, path, method, query, headers, body).await
}

async fn dispatch(
    state: &AppState,
    path: ResourcePath,
    method: Method,
    query: Option<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, StoreError> {
    debug!("{} {}", method, path);
    let store = state.store.as_ref();

    let is_dir = path.is_dir();
    if method == Method::GET {
        if is_dir {
            list(store, &path).await
        } else {
            get_content(store, &path).await
        }
    } else if method == Method::HEAD {
        if is_dir {
            stat_dir(store, &path).await
        } else {
            stat_content(store, &path).await
        }
    } else if method == Method::PUT {
        if is_dir {
            make_dir(store, &path, has_flag(query.as_deref(), "recursive")).await
        } else {
            put_content(store, &path, &headers, body).await
        }
    } else {
        Ok(StatusCode::METHOD_NOT_ALLOWED.into_response())
    }
}

async fn list(store: &dyn ResourceStore, dir: &ResourcePath) -> StoreResult<Response> {
    let entries = store.list(dir).await?;
    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_listing(&entries),
    )
        .into_response())
}

async fn get_content(store: &dyn ResourceStore, path: &ResourcePath) -> StoreResult<Response> {
    let content = store.read_content(path).await?;
    let mut response = Body::from_stream(content.body).into_response();
    set_last_modified(response.headers_mut(), content.last_modified);
    Ok(response)
}

async fn stat_dir(store: &dyn ResourceStore, dir: &ResourcePath) -> StoreResult<Response> {
    let Some(meta) = store.stat_dir(dir).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let mut response = StatusCode::OK.into_response();
    set_last_modified(response.headers_mut(), meta.last_modified);
    Ok(response)
}

async fn stat_content(store: &dyn ResourceStore, path: &ResourcePath) -> StoreResult<Response> {
    let Some(meta) = store.stat_content(path).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    set_last_modified(headers, meta.last_modified);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.size));
    if let Ok(value) = HeaderValue::from_str(&meta.checksum) {
        headers.insert(CHECKSUM_HEADER, value);
    }
    Ok(response)
}

async fn make_dir(
    store: &dyn ResourceStore,
    dir: &ResourcePath,
    recursive: bool,
) -> StoreResult<Response> {
    store.make_dir(dir, recursive).await?;
    Ok(StatusCode::OK.into_response())
}

async fn put_content(
    store: &dyn ResourceStore,
    path: &ResourcePath,
    headers: &HeaderMap,
    body: Body,
) -> StoreResult<Response> {
    let modified = match headers.get(LAST_MODIFIED) {
        None => None,
        Some(value) => {
            let parsed = value.to_str().ok().and_then(parse_http_date);
            if parsed.is_none() {
                return Err(StoreError::BadRequest(format!(
                    "{}: unparsable Last-Modified {:?}",
                    path, value
                )));
            }
            parsed
        }
    };
    let body = body
        .into_data_stream()
        .map_err(std::io::Error::other)
        .boxed();
    let written = store.write_content(path, body, modified).await?;
    info!("put content {} ({} bytes)", path, written);
    Ok(StatusCode::OK.into_response())
}

// ─── Helpers ─────────────────────────────────────────────────────

/// Listing body: one full path per line, terminated by an empty line.
pub fn render_listing(entries: &[ResourcePath]) -> String {
    let mut body = String::new();
    for entry in entries {
        body.push_str(entry.as_str());
        body.push('\n');
    }
    body.push('\n');
    body
}

fn set_last_modified(headers: &mut HeaderMap, time: Option<DateTime<Utc>>) {
    if let Some(value) = time
        .and_then(format_http_date)
        .and_then(|s| HeaderValue::from_str(&s).ok())
    {
        headers.insert(LAST_MODIFIED, value);
    }
}

/// True when the query string carries `name`, with or without a value.
fn has_flag(query: Option<&str>, name: &str) -> bool {
    query
        .unwrap_or("")
        .split('&')
        .any(|pair| pair.split('=').next() == Some(name))
}

// ─── Server startup ──────────────────────────────────────────────

/// Serve `store` on `addr` until the process is stopped
pub async fn serve(addr: &str, store: Arc<dyn ResourceStore>) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", addr, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("gateway for {} listening on http://{}", store.describe(), addr);

    axum::serve(listener, build_router(store)).await?;
    Ok(())
}
