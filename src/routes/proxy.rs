use crate::{AppState, handlers};
use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};

/// Proxy Router Module
///
/// Relays browser calls to the backend so the frontend never needs the backend origin or
/// a cross-origin request. OPTIONS never reaches these handlers: the CORS layer below
/// answers preflights for both forms. Page routes carry no CORS headers.
pub fn proxy_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // ANY /api/proxy?path=/graphql
        // Query form: forwards only JSON content type and Authorization.
        .route(
            "/api/proxy",
            get(handlers::proxy_query_form)
                .post(handlers::proxy_query_form)
                .put(handlers::proxy_query_form)
                .delete(handlers::proxy_query_form)
                .patch(handlers::proxy_query_form),
        )
        // ANY /api/proxy/{*path}
        // Path form: forwards headers and the query string through to <backend>/<path>.
        .route(
            "/api/proxy/{*path}",
            get(handlers::proxy_path_form)
                .post(handlers::proxy_path_form)
                .put(handlers::proxy_path_form)
                .delete(handlers::proxy_path_form)
                .patch(handlers::proxy_path_form),
        )
        .layer(cors)
}
