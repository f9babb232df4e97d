pub mod ask;
pub mod dataset;
pub mod export;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::config::Config;
use crate::services::{DatasetLoader, QueryResolver};
use crate::storage::SessionStore;

pub const SESSION_COOKIE: &str = "sid";

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    pub loader: Arc<DatasetLoader>,
    pub resolver: Arc<QueryResolver>,
}

/// Resolve the caller's session from the `sid` cookie, issuing a new cookie
/// when the session had to be created.
pub fn session_for(state: &AppState, jar: CookieJar) -> (CookieJar, String) {
    let presented = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let sid = state.sessions.get_or_create(presented.as_deref());

    if presented.as_deref() == Some(sid.as_str()) {
        return (jar, sid);
    }

    let cookie = Cookie::build((SESSION_COOKIE, sid.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), sid)
}
