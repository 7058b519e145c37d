//! Sticky cookie wire format.
//!
//! `_backend=<base64(nonce ‖ ciphertext)>; Path=/`, standard alphabet with
//! padding. Absent, unparsable or unauthenticated cookies all read as "no
//! preference".

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::affinity::StickyCodec;

/// Name of the sticky session cookie.
pub const STICKY_COOKIE: &str = "_backend";

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Backend address carried by the request's sticky cookie, if it is valid.
pub fn sticky_backend(headers: &HeaderMap, codec: &StickyCodec) -> Option<String> {
    let value = cookie_value(headers, STICKY_COOKIE)?;
    let data = STANDARD.decode(value).ok()?;
    codec.open_backend(&data)
}

/// Append a `Set-Cookie` pinning the client to `backend`.
///
/// Cookies the backend set itself are left alone. Returns whether a cookie
/// was added.
pub fn set_sticky_backend(headers: &mut HeaderMap, backend: &str, codec: &StickyCodec) -> bool {
    let sealed = match codec.seal_backend(backend) {
        Ok(sealed) => sealed,
        Err(e) => {
            tracing::warn!(backend = %backend, error = %e, "Failed to seal sticky cookie");
            return false;
        }
    };

    let cookie = format!("{}={}; Path=/", STICKY_COOKIE, STANDARD.encode(sealed));
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
            true
        }
        Err(e) => {
            tracing::warn!(backend = %backend, error = %e, "Sticky cookie is not a valid header value");
            false
        }
    }
}
