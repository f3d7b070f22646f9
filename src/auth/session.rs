//! Session token transport: reading the principal off a request and building
//! the `Set-Cookie` values that carry it.

use axum::http::{header, HeaderMap};
use cookie::{time::Duration, Cookie, SameSite};
use tracing::debug;

use crate::auth::{dto::Principal, jwt::JwtKeys};
use crate::config::SessionConfig;

/// Resolve the request's principal. Absent, malformed, expired or foreign
/// tokens all resolve to `None`.
pub fn resolve(headers: &HeaderMap, keys: &JwtKeys, cookie_name: &str) -> Option<Principal> {
    let token = cookie_value(headers, cookie_name)
        .or_else(|| bearer_token(headers).map(str::to_string))?;
    match keys.verify(&token) {
        Ok(claims) => Some(claims.into()),
        Err(e) => {
            debug!(error = %e, "session token rejected");
            None
        }
    }
}

/// First non-empty value of cookie `name`, with surrounding quotes removed.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| Cookie::split_parse(v))
        .filter_map(Result::ok)
        .filter(|c| c.name() == name)
        .map(|c| c.value_trimmed().to_string())
        .find(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn set_cookie(cfg: &SessionConfig, token: &str, max_age_secs: u64) -> String {
    Cookie::build((cfg.cookie_name.as_str(), token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cfg.cookie_secure)
        .path("/")
        .max_age(Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)))
        .build()
        .to_string()
}

pub fn clear_cookie(cfg: &SessionConfig) -> String {
    let mut cookie = Cookie::build((cfg.cookie_name.as_str(), ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cfg.cookie_secure)
        .path("/")
        .build();
    cookie.make_removal();
    cookie.to_string()
}
