use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access decision core: unverified token decoding and the routing rules built on it.
pub mod access;
pub mod auth;

// HTTP surface and the services behind it.
pub mod config;
pub mod handlers;
pub mod models;
pub mod upstream;

pub mod routes;
use routes::{proxy, public};

// --- Public Re-exports ---

pub use access::{Decision, decide};
pub use auth::{Claims, decode_claims};
pub use config::AppConfig;
pub use upstream::{HttpUpstream, MockUpstream, UpstreamState};

/// ApiDoc
///
/// OpenAPI document for the endpoints the gateway answers itself, served at
/// `/api-docs/openapi.json`. Page routes belong to the frontend and are not listed.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::proxy_query_form, handlers::proxy_path_form
    ),
    components(schemas(models::ErrorResponse)),
    tags(
        (name = "harvest-ledger-gateway", description = "HarvestLedger edge gateway")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: both upstreams and the
/// loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Page server receiving every request the access router lets through.
    pub frontend: UpstreamState,
    /// GraphQL/REST backend behind `/api/proxy`.
    pub backend: UpstreamState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// access_middleware
///
/// Runs the access decision for every request the matcher covers. A `Continue` outcome hands
/// the request to the inner service untouched; any other outcome short-circuits with a
/// `307 Temporary Redirect`.
///
/// The token is read from the configured auth cookie and never verified here; see
/// `auth::decode_claims`.
async fn access_middleware(
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !access::matcher_applies(&path) {
        return next.run(request).await;
    }

    let token = auth::cookie_value(request.headers(), &config.auth_cookie_name);
    match access::decide(&path, token.as_deref()).location() {
        None => next.run(request).await,
        Some(location) => {
            tracing::debug!(path = %path, location = %location, "Access redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}

/// create_router
///
/// Assembles the gateway's routing structure, applies the access middleware and the
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(proxy::proxy_routes())
        // Everything else is a page: forwarded to the frontend once access allows it.
        // The fallback must be registered before `layer` for the middleware to cover it.
        .fallback(handlers::forward_page)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access_middleware,
        ))
        .with_state(state);

    // 2. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
}

/// trace_span_logger
///
/// Builds the per-request span so every log line for one request carries the same
/// `x-request-id`. The URI is logged without the cookie header, so tokens stay out of logs.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
