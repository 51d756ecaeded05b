//! The `queueToken` cookie.
//!
//! Not HttpOnly: the waiting page mirrors the token from script.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite as CookieSameSite};

use peakguard_core::config::{CookieConfig, SameSite};

pub const QUEUE_TOKEN_COOKIE: &str = "queueToken";

pub fn token_cookie(config: &CookieConfig, token: String) -> Cookie<'static> {
    let mut builder = Cookie::build((QUEUE_TOKEN_COOKIE, token))
        .path(config.path.clone())
        .http_only(false)
        .secure(config.secure)
        .same_site(same_site(config.same_site))
        .max_age(time::Duration::seconds(config.max_age_secs));
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

/// Expired `queueToken` cookie. Added to the jar rather than removed from it,
/// so the browser is told to drop the cookie even when the request carried
/// none. Path and domain must match the ones it was set with.
pub fn cleared_cookie(config: &CookieConfig) -> Cookie<'static> {
    let mut builder = Cookie::build((QUEUE_TOKEN_COOKIE, "")).path(config.path.clone());
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }
    let mut cookie = builder.build();
    cookie.make_removal();
    cookie
}

/// Non-blank token from the jar.
pub fn token_from_jar(jar: &CookieJar) -> Option<String> {
    jar.get(QUEUE_TOKEN_COOKIE)
        .map(|c| c.value().trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn same_site(value: SameSite) -> CookieSameSite {
    match value {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    }
}
