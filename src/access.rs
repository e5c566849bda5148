//! Route access control.
//!
//! A pure decision over (request path, optional session token) that walks users through the
//! onboarding flow (email verification, then profile completion, then the dashboard) and keeps
//! role-restricted areas out of reach. Nothing here performs I/O or holds mutable state, so
//! `decide` is safe to call from any number of concurrent requests.

use crate::auth::{self, Claims};

/// Prefixes requiring a session with a completed registration.
pub const PROTECTED_ROUTES: &[&str] = &[
    "/dashboard",
    "/harvest",
    "/finance",
    "/profile",
    "/onboarding",
];

/// Sign-in and sign-up entry points.
pub const AUTH_ROUTES: &[&str] = &["/auth/signin", "/auth/signup", "/auth/trial"];

/// Steps of an in-progress registration.
pub const REGISTRATION_ROUTES: &[&str] = &["/auth/verify-email", "/auth/complete-registration"];

/// Reserved for users whose role is "farmer".
pub const FARMER_ROUTES: &[&str] = &["/harvest"];

/// Reserved for users whose role is "buyer" or "admin".
pub const BUYER_ROUTES: &[&str] = &["/finance"];

/// Framework assets, API routes and static files never reach the decision rules.
const BYPASS_PREFIXES: &[&str] = &["/_next", "/api", "/static"];

/// Paths the middleware is not mounted on at all, relative to the leading '/'.
const MATCHER_EXCLUSIONS: &[&str] = &["api", "_next/static", "_next/image", "favicon.ico"];

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const VERIFY_EMAIL_PATH: &str = "/auth/verify-email";
pub const COMPLETE_REGISTRATION_PATH: &str = "/auth/complete-registration";

/// Decision
///
/// Outcome of the access check for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through untouched.
    Continue,
    /// Send the user to the dashboard.
    Dashboard,
    /// Send the user to sign in, remembering where they were going.
    SignIn { redirect: String },
    /// Registration started but the email is not verified yet.
    VerifyEmail,
    /// Email verified but the profile is not complete yet.
    CompleteRegistration,
}

impl Decision {
    /// The `Location` for a redirect outcome, `None` for `Continue`.
    pub fn location(&self) -> Option<String> {
        match self {
            Decision::Continue => None,
            Decision::Dashboard => Some(DASHBOARD_PATH.to_string()),
            Decision::SignIn { redirect } => Some(format!(
                "{}?redirect={}",
                SIGN_IN_PATH,
                urlencoding::encode(redirect)
            )),
            Decision::VerifyEmail => Some(VERIFY_EMAIL_PATH.to_string()),
            Decision::CompleteRegistration => Some(COMPLETE_REGISTRATION_PATH.to_string()),
        }
    }
}

/// A path matches a table when it starts with any of its prefixes.
pub fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

/// matcher_applies
///
/// Whether the access middleware runs for this path at all. Everything is covered except
/// API routes, the framework's static and image asset prefixes, and the favicon.
pub fn matcher_applies(path: &str) -> bool {
    let relative = path.strip_prefix('/').unwrap_or(path);
    !matches_any(relative, MATCHER_EXCLUSIONS)
}

fn is_bypassed(path: &str) -> bool {
    matches_any(path, BYPASS_PREFIXES) || path.contains('.')
}

/// decide
///
/// Computes the access outcome for `path` given the raw token from the auth cookie.
///
/// The guards below are evaluated strictly top to bottom and their precedence is part of the
/// contract: paths can sit in several tables at once, and merging branches changes which
/// redirect wins on those paths.
pub fn decide(path: &str, token: Option<&str>) -> Decision {
    if is_bypassed(path) {
        return Decision::Continue;
    }

    // A token that fails to decode counts as no token at all.
    let claims: Option<Claims> = token.and_then(auth::decode_claims);

    let is_auth_route = matches_any(path, AUTH_ROUTES);
    let is_registration_route = matches_any(path, REGISTRATION_ROUTES);
    let is_protected_route = matches_any(path, PROTECTED_ROUTES);

    if let Some(claims) = &claims {
        if claims.registration_complete && (is_auth_route || is_registration_route) {
            return Decision::Dashboard;
        }

        if !claims.registration_complete {
            if is_registration_route {
                return Decision::Continue;
            }
            if is_protected_route {
                return if claims.email_verified {
                    Decision::CompleteRegistration
                } else {
                    Decision::VerifyEmail
                };
            }
            return Decision::Continue;
        }
    }

    if claims.is_none() && (is_protected_route || is_registration_route) {
        return Decision::SignIn {
            redirect: path.to_string(),
        };
    }

    // Only a completed registration reaches this point with claims.
    if let Some(role) = claims.as_ref().and_then(Claims::normalized_role) {
        if matches_any(path, FARMER_ROUTES) && role != "farmer" {
            return Decision::Dashboard;
        }
        if matches_any(path, BUYER_ROUTES) && role != "buyer" && role != "admin" {
            return Decision::Dashboard;
        }
    }

    Decision::Continue
}
