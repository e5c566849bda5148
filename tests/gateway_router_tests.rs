use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use harvest_ledger_gateway::{
    AppConfig, AppState, MockUpstream, UpstreamState, create_router, models::ErrorResponse,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

// --- Helper Functions ---

struct TestGateway {
    router: Router,
    frontend: Arc<MockUpstream>,
    backend: Arc<MockUpstream>,
}

fn gateway_with(config: AppConfig, frontend: MockUpstream, backend: MockUpstream) -> TestGateway {
    let frontend = Arc::new(frontend);
    let backend = Arc::new(backend);
    let state = AppState {
        frontend: frontend.clone() as UpstreamState,
        backend: backend.clone() as UpstreamState,
        config,
    };

    TestGateway {
        router: create_router(state),
        frontend,
        backend,
    }
}

fn gateway() -> TestGateway {
    gateway_with(
        AppConfig::default(),
        MockUpstream::new(StatusCode::OK, "<html>page</html>"),
        MockUpstream::new(StatusCode::CREATED, r#"{"data":{"ok":true}}"#),
    )
}

fn session(registration_complete: bool, role: &str) -> String {
    let payload = json!({
        "sub": "user-7",
        "role": role,
        "registration_complete": registration_complete,
        "email_verified": true
    });
    format!(
        "eyJhbGciOiJIUzI1NiJ9.{}.c2ln",
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect carries a Location")
        .to_str()
        .unwrap()
}

/// Comma-separated header values, upper-cased and sorted for order-free comparison.
fn listed(response: &Response, name: header::HeaderName) -> Vec<String> {
    let mut values: Vec<String> = response
        .headers()
        .get_all(name)
        .iter()
        .flat_map(|value| value.to_str().unwrap().split(','))
        .map(|item| item.trim().to_ascii_uppercase())
        .filter(|item| !item.is_empty())
        .collect();
    values.sort();
    values
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// --- Access Middleware ---

#[tokio::test]
async fn test_signed_out_request_is_redirected_to_sign_in() {
    let app = gateway();

    let response = app
        .router
        .oneshot(get("/dashboard/settings", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/auth/signin?redirect=%2Fdashboard%2Fsettings"
    );
    assert!(app.frontend.recorded().is_empty());
}

#[tokio::test]
async fn test_allowed_page_is_forwarded_to_frontend() {
    let app = gateway();
    let cookie = format!("theme=dark; auth-token={}", session(true, "farmer"));

    let response = app
        .router
        .oneshot(get("/harvest?season=2025", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<html>page</html>");

    let recorded = app.frontend.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, Method::GET);
    assert_eq!(recorded[0].path_and_query, "/harvest?season=2025");
    assert!(recorded[0].headers.get(header::COOKIE).is_some());
    assert!(app.backend.recorded().is_empty());
}

#[tokio::test]
async fn test_registered_user_is_bounced_off_sign_in() {
    let app = gateway();
    let cookie = format!("auth-token={}", session(true, "buyer"));

    let response = app
        .router
        .oneshot(get("/auth/signin", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_role_restriction_redirects_to_dashboard() {
    let app = gateway();
    let cookie = format!("auth-token={}", session(true, "buyer"));

    let response = app
        .router
        .oneshot(get("/harvest", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_incomplete_registration_is_sent_to_next_step() {
    let app = gateway();
    let cookie = format!("auth-token={}", session(false, "farmer"));

    let response = app
        .router
        .oneshot(get("/profile", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/auth/complete-registration");
}

#[tokio::test]
async fn test_cookie_name_comes_from_config() {
    let config = AppConfig {
        auth_cookie_name: "hl_session".to_string(),
        ..AppConfig::default()
    };
    let app = gateway_with(
        config,
        MockUpstream::new(StatusCode::OK, "page"),
        MockUpstream::new(StatusCode::OK, "{}"),
    );

    // A token under the default name is ignored once the name is reconfigured.
    let cookie = format!("auth-token={}", session(true, "farmer"));
    let response = app
        .router
        .clone()
        .oneshot(get("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let cookie = format!("hl_session={}", session(true, "farmer"));
    let response = app
        .router
        .oneshot(get("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_static_files_skip_access_checks() {
    let app = gateway();

    let response = app
        .router
        .oneshot(get("/dashboard/logo.svg", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.frontend.recorded()[0].path_and_query, "/dashboard/logo.svg");
}

#[tokio::test]
async fn test_unreachable_frontend_yields_bad_gateway() {
    let app = gateway_with(
        AppConfig::default(),
        MockUpstream::failing(),
        MockUpstream::new(StatusCode::OK, "{}"),
    );

    let response = app.router.oneshot(get("/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body, ErrorResponse::new("Page server unavailable"));
}

// --- Gateway Endpoints ---

#[tokio::test]
async fn test_health_check() {
    let app = gateway();

    let response = app.router.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
    assert!(app.frontend.recorded().is_empty());
}

#[tokio::test]
async fn test_openapi_documents_proxy_request_bodies() {
    let app = gateway();

    let response = app
        .router
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    for path in ["/api/proxy", "/api/proxy/{path}"] {
        let body = &doc["paths"][path]["post"]["requestBody"]["content"]["application/json"];
        assert!(body.is_object(), "{} documents its JSON body", path);
    }
    assert!(doc["paths"]["/health"]["get"].is_object());
    assert!(app.frontend.recorded().is_empty());
}

#[tokio::test]
async fn test_query_form_proxy_forwards_json_and_authorization_only() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/proxy?path=/graphql")
        .header(header::AUTHORIZATION, "Bearer abc")
        .header(header::COOKIE, "auth-token=x.y.z")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"query":"{ harvests { id } }"}"#))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, PATCH, OPTIONS"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(body_text(response).await, r#"{"data":{"ok":true}}"#);

    let recorded = app.backend.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].path_and_query, "/graphql");
    assert_eq!(recorded[0].headers.len(), 2);
    assert_eq!(recorded[0].headers[header::AUTHORIZATION], "Bearer abc");
    assert_eq!(recorded[0].headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(
        &recorded[0].body[..],
        br#"{"query":"{ harvests { id } }"}"#
    );
}

#[tokio::test]
async fn test_query_form_proxy_drops_body_on_get() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/proxy?path=health")
        .body(Body::from("ignored"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let recorded = app.backend.recorded();
    assert_eq!(recorded[0].path_and_query, "/health");
    assert!(recorded[0].body.is_empty());
}

#[tokio::test]
async fn test_path_form_proxy_forwards_headers_query_and_body() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/proxy/api/harvests/42?notify=true")
        .header(header::HOST, "gateway.local")
        .header(header::AUTHORIZATION, "Bearer abc")
        .header("x-wallet-address", "0.0.1234")
        .body(Body::from(r#"{"quantity":12}"#))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, PATCH, OPTIONS"
    );

    let recorded = app.backend.recorded();
    assert_eq!(recorded[0].method, Method::PUT);
    assert_eq!(recorded[0].path_and_query, "/api/harvests/42?notify=true");
    assert!(recorded[0].headers.get(header::HOST).is_none());
    assert_eq!(recorded[0].headers["x-wallet-address"], "0.0.1234");
    assert_eq!(recorded[0].headers[header::AUTHORIZATION], "Bearer abc");
    assert_eq!(&recorded[0].body[..], br#"{"quantity":12}"#);
}

#[tokio::test]
async fn test_path_form_proxy_drops_body_on_delete() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/proxy/api/harvests/42")
        .body(Body::from("ignored"))
        .unwrap();

    app.router.oneshot(request).await.unwrap();

    assert!(app.backend.recorded()[0].body.is_empty());
}

#[tokio::test]
async fn test_proxy_failure_returns_error_body() {
    let app = gateway_with(
        AppConfig::default(),
        MockUpstream::new(StatusCode::OK, "page"),
        MockUpstream::failing(),
    );

    let response = app
        .router
        .oneshot(get("/api/proxy/graphql", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body, ErrorResponse::new("Proxy request failed"));
}

#[tokio::test]
async fn test_proxy_is_never_redirected() {
    let app = gateway();

    // Signed out, yet the proxy answers: /api is outside the access matcher.
    let response = app
        .router
        .oneshot(get("/api/proxy/dashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.backend.recorded()[0].path_and_query, "/dashboard");
}

#[tokio::test]
async fn test_options_is_answered_without_reaching_backend() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/proxy/graphql")
        .header(header::ORIGIN, "http://localhost:3001")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type, authorization")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert_eq!(
        listed(&response, header::ACCESS_CONTROL_ALLOW_METHODS),
        ["DELETE", "GET", "OPTIONS", "PATCH", "POST", "PUT"]
    );
    assert_eq!(
        listed(&response, header::ACCESS_CONTROL_ALLOW_HEADERS),
        ["AUTHORIZATION", "CONTENT-TYPE"]
    );
    assert!(body_text(response).await.is_empty());
    assert!(app.backend.recorded().is_empty());
}

#[tokio::test]
async fn test_query_form_preflight_lists_only_proxy_methods() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/proxy?path=/graphql")
        .header(header::ORIGIN, "https://app.harvestledger.io")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let methods = listed(&response, header::ACCESS_CONTROL_ALLOW_METHODS);
    assert!(!methods.iter().any(|method| method == "TRACE" || method == "*"));
    assert!(!listed(&response, header::ACCESS_CONTROL_ALLOW_HEADERS).contains(&"*".to_string()));
    assert!(app.backend.recorded().is_empty());
}

#[tokio::test]
async fn test_page_responses_carry_no_cors_headers() {
    let app = gateway();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .header(header::ORIGIN, "https://elsewhere.example")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(app.frontend.recorded().len(), 1);
}
