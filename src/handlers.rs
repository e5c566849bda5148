use crate::{
    AppState,
    models::{ErrorResponse, ProxyQuery},
    upstream::{UpstreamRequest, UpstreamResponse},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

// --- Header Policy ---

const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Request headers that describe the client connection rather than the request itself.
const SKIPPED_REQUEST_HEADERS: [HeaderName; 3] =
    [header::HOST, header::CONNECTION, header::CONTENT_LENGTH];

/// Response headers recomputed by the gateway's own HTTP stack.
const SKIPPED_RESPONSE_HEADERS: [HeaderName; 3] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

fn copy_headers(source: &HeaderMap, skipped: &[HeaderName]) -> HeaderMap {
    let mut copied = HeaderMap::new();
    for (name, value) in source {
        if !skipped.contains(name) {
            copied.append(name.clone(), value.clone());
        }
    }
    copied
}

/// Sets the permissive CORS headers every backend proxy response carries.
fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
}

fn proxy_failure(reason: String) -> Response {
    tracing::error!(error = %reason, "Proxy error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Proxy request failed")),
    )
        .into_response()
}

fn path_and_query(path: &str, query: Option<&str>) -> String {
    let mut target = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    target
}

// --- Handlers ---

/// health
///
/// Liveness probe for load balancers. Returns "ok" without touching any upstream.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Gateway is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// proxy_query_form
///
/// Forwards to the backend path named by the `path` query parameter.
///
/// Only `Content-Type: application/json` and the caller's `Authorization` header travel
/// upstream; the body is forwarded for POST, PUT and PATCH. The upstream status and
/// `Content-Type` come back unchanged, wrapped in the proxy CORS headers.
#[utoipa::path(
    method(get, post, put, delete, patch),
    path = "/api/proxy",
    params(ProxyQuery),
    request_body(content = String, content_type = "application/json", description = "Forwarded for POST, PUT and PATCH"),
    responses(
        (status = 200, description = "Upstream response, status passed through"),
        (status = 500, description = "Backend unreachable", body = ErrorResponse)
    )
)]
pub async fn proxy_query_form(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut forwarded = HeaderMap::new();
    forwarded.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(authorization) = headers.get(header::AUTHORIZATION) {
        forwarded.insert(header::AUTHORIZATION, authorization.clone());
    }

    let body = if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        body
    } else {
        Bytes::new()
    };

    let target = path_and_query(query.path.as_deref().unwrap_or("/"), None);
    tracing::debug!(%method, target = %target, "Proxying to backend (query form)");

    let upstream = match state
        .backend
        .forward(UpstreamRequest {
            method,
            path_and_query: target,
            headers: forwarded,
            body,
        })
        .await
    {
        Ok(response) => response,
        Err(reason) => return proxy_failure(reason),
    };

    let mut response_headers = HeaderMap::new();
    let content_type = upstream
        .headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    response_headers.insert(header::CONTENT_TYPE, content_type);
    apply_cors(&mut response_headers);

    (upstream.status, response_headers, upstream.body).into_response()
}

/// proxy_path_form
///
/// Forwards `/api/proxy/<path>` to `<backend>/<path>`, keeping the query string.
///
/// All request headers travel upstream except `host`, `connection` and `content-length`.
/// GET and DELETE are sent without a body. Every upstream response header is copied back,
/// then the proxy CORS headers are set on top.
#[utoipa::path(
    method(get, post, put, delete, patch),
    path = "/api/proxy/{path}",
    params(("path" = String, Path, description = "Backend path, may span several segments")),
    request_body(content = String, content_type = "application/json", description = "Forwarded except for GET and DELETE"),
    responses(
        (status = 200, description = "Upstream response, status and headers passed through"),
        (status = 500, description = "Backend unreachable", body = ErrorResponse)
    )
)]
pub async fn proxy_path_form(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if matches!(method, Method::GET | Method::DELETE) {
        Bytes::new()
    } else {
        body
    };

    let target = path_and_query(&path, uri.query());
    tracing::debug!(%method, target = %target, "Proxying to backend (path form)");

    let upstream = match state
        .backend
        .forward(UpstreamRequest {
            method,
            path_and_query: target,
            headers: copy_headers(&headers, &SKIPPED_REQUEST_HEADERS),
            body,
        })
        .await
    {
        Ok(response) => response,
        Err(reason) => return proxy_failure(reason),
    };

    let mut response_headers = copy_headers(&upstream.headers, &SKIPPED_RESPONSE_HEADERS);
    apply_cors(&mut response_headers);

    (upstream.status, response_headers, upstream.body).into_response()
}

/// forward_page
///
/// Fallback for every path the gateway does not own. By the time a request lands here the
/// access middleware has already let it through, so it goes to the page server as-is.
pub async fn forward_page(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let result = state
        .frontend
        .forward(UpstreamRequest {
            method,
            path_and_query: target,
            headers: copy_headers(&headers, &SKIPPED_REQUEST_HEADERS),
            body,
        })
        .await;

    match result {
        Ok(UpstreamResponse {
            status,
            headers,
            body,
        }) => (
            status,
            copy_headers(&headers, &SKIPPED_RESPONSE_HEADERS),
            body,
        )
            .into_response(),
        Err(reason) => {
            tracing::error!(error = %reason, "Page server unreachable");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Page server unavailable")),
            )
                .into_response()
        }
    }
}
