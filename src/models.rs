use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// ErrorResponse
///
/// The JSON body the gateway itself returns when it cannot produce an upstream response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// ProxyQuery
///
/// Query parameters of the query-form backend proxy (`/api/proxy?path=/graphql`).
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ProxyQuery {
    /// Backend path to call. A missing leading '/' is added; absent means the backend root.
    pub path: Option<String>,
}
