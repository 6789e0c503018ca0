//! Session cookie handling for the seen-file tracker.

use crate::services::seen::SessionId;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const SESSION_COOKIE: &str = "session";

/// Resolve the caller's session from the cookie jar, issuing a fresh id when
/// the cookie is missing or malformed. The returned jar must be part of the
/// response so a new cookie reaches the browser.
pub fn session_from(jar: CookieJar) -> (CookieJar, SessionId) {
    if let Some(session) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| SessionId::parse(cookie.value()))
    {
        return (jar, session);
    }

    let session = SessionId::generate();
    let cookie = Cookie::build((SESSION_COOKIE, session.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), session)
}
