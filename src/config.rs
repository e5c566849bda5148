use std::{env, time::Duration};

/// AppConfig
///
/// Holds the gateway's entire configuration state. This struct is immutable once loaded
/// and is pulled into handlers and middleware via FromRef, the same way the upstream
/// clients are.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which variables are mandatory.
    pub env: Env,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
    // Origin of the page server that receives every request the access router lets through.
    pub frontend_url: String,
    // Origin of the GraphQL/REST backend reached through the /api/proxy routes.
    pub backend_url: String,
    // Name of the cookie carrying the session token.
    pub auth_cookie_name: String,
    // Upper bound on a single upstream round trip.
    pub upstream_timeout: Duration,
}

/// Env
///
/// Defines the runtime context: human-readable logs and forgiving defaults locally,
/// JSON logs and mandatory upstream origins in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_AUTH_COOKIE: &str = "auth-token";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3001";
const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            auth_cookie_name: DEFAULT_AUTH_COOKIE.to_string(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables at startup and fails fast.
    ///
    /// # Panics
    /// Panics in `Env::Production` when `FRONTEND_URL` or the backend origin is missing,
    /// and in any environment when `UPSTREAM_TIMEOUT_SECS` is not a whole number.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        // The backend origin has several historical names; the first one set wins.
        let backend_url = env::var("BACKEND_URL")
            .or_else(|_| env::var("NEXT_PUBLIC_BACKEND_URL"))
            .or_else(|_| env::var("NEXT_PUBLIC_API_URL"));

        let (frontend_url, backend_url) = match env {
            Env::Production => (
                env::var("FRONTEND_URL").expect("FATAL: FRONTEND_URL required in prod"),
                backend_url.expect("FATAL: BACKEND_URL required in prod"),
            ),
            Env::Local => (
                env::var("FRONTEND_URL").unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
                backend_url.unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            ),
        };

        let upstream_timeout = match env::var("UPSTREAM_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .expect("FATAL: UPSTREAM_TIMEOUT_SECS must be a whole number of seconds"),
            ),
            Err(_) => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            frontend_url: trim_origin(frontend_url),
            backend_url: trim_origin(backend_url),
            auth_cookie_name: env::var("AUTH_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_AUTH_COOKIE.to_string()),
            upstream_timeout,
        }
    }
}

// Origins are joined with paths that already start with '/'.
fn trim_origin(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
