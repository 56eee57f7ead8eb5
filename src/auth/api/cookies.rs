//! Session cookies
//!
//! Both tokens travel as `HttpOnly` cookies with `SameSite=Lax` on path `/`.
//! `Secure` is configurable so the service can run over plain HTTP locally.

use axum::http::{
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderName,
};
use axum::response::AppendHeaders;
use cookie::{time::Duration, Cookie, SameSite};

use crate::auth::types::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Two `Set-Cookie` headers, one per token
pub type SessionCookies = AppendHeaders<[(HeaderName, String); 2]>;

/// Attributes shared by the session cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Send `Secure` (HTTPS only)
    pub secure: bool,
    /// Access cookie lifetime in seconds
    pub access_max_age: i64,
    /// Refresh cookie lifetime in seconds
    pub refresh_max_age: i64,
}

impl CookiePolicy {
    pub fn new(secure: bool, access_max_age: u64, refresh_max_age: u64) -> Self {
        Self {
            secure,
            access_max_age: i64::try_from(access_max_age).unwrap_or(i64::MAX),
            refresh_max_age: i64::try_from(refresh_max_age).unwrap_or(i64::MAX),
        }
    }

    pub fn build(&self, name: &str, value: &str, max_age: i64) -> Cookie<'static> {
        Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(max_age))
            .build()
    }

    /// Expired cookie that makes the browser drop `name`
    pub fn removal(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.build(name, "", 0);
        cookie.make_removal();
        cookie
    }

    pub fn set_session(&self, tokens: &TokenPair) -> SessionCookies {
        AppendHeaders([
            (
                SET_COOKIE,
                self.build(ACCESS_TOKEN_COOKIE, &tokens.access_token, self.access_max_age)
                    .to_string(),
            ),
            (
                SET_COOKIE,
                self.build(REFRESH_TOKEN_COOKIE, &tokens.refresh_token, self.refresh_max_age)
                    .to_string(),
            ),
        ])
    }

    pub fn clear_session(&self) -> SessionCookies {
        AppendHeaders([
            (SET_COOKIE, self.removal(ACCESS_TOKEN_COOKIE).to_string()),
            (SET_COOKIE, self.removal(REFRESH_TOKEN_COOKIE).to_string()),
        ])
    }
}

/// Value of the named request cookie, if present and non-empty
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Access token from the cookie, falling back to `Authorization: Bearer`
pub fn access_token_from_headers(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_TOKEN_COOKIE).or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}
