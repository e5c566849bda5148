use axum::http::{HeaderMap, header};
use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Claims
///
/// The advisory payload carried inside the session token issued by the backend auth service.
///
/// **These claims are NOT verified.** The gateway reads them without any signature check and
/// uses them for routing decisions only. Never treat a `Claims` value as proof of identity;
/// the backend re-validates the token on every privileged operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Claims {
    /// Subject (sub): the backend's user identifier.
    pub sub: Option<String>,
    /// Free-text role as issued: "farmer", "buyer", "admin", or absent before registration.
    pub role: Option<String>,
    /// True once the user finished the onboarding profile.
    pub registration_complete: bool,
    /// True once the OTP email verification step succeeded.
    pub email_verified: bool,
}

impl Claims {
    /// The role, lower-cased for comparison. `None` when the claim is absent.
    pub fn normalized_role(&self) -> Option<String> {
        self.role.as_ref().map(|role| role.to_lowercase())
    }
}

// Token segments are base64url; issuers differ on whether they keep the '=' padding.
const TOKEN_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// decode_claims
///
/// Extracts the claims from a three-segment `header.payload.signature` token.
///
/// Performs **no cryptographic verification**: the signature segment is ignored entirely.
/// Any structural problem (wrong segment count, bad base64, a payload that is not a JSON
/// object) yields `None`, which callers treat exactly like a missing token. Recognized
/// fields holding a value of the wrong JSON type are read as absent.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let bytes = TOKEN_SEGMENT.decode(segments[1]).ok()?;
    let payload: Value = serde_json::from_slice(&bytes).ok()?;
    let fields = payload.as_object()?;

    let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_owned);
    let flag = |name: &str| fields.get(name).and_then(Value::as_bool).unwrap_or(false);

    Some(Claims {
        sub: text("sub"),
        role: text("role"),
        registration_complete: flag("registration_complete"),
        email_verified: flag("email_verified"),
    })
}

/// cookie_value
///
/// Returns the value of the named cookie from the request's `Cookie` headers.
/// Empty values count as absent.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
