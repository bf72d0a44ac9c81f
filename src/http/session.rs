//! Voter token cookie. The token itself is opaque to the engine; this only
//! moves it in and out of HTTP headers.

use axum::http::{HeaderMap, HeaderValue, header::COOKIE};

use crate::models::VoterId;

pub const SESSION_COOKIE: &str = "sessionId";
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30; // 30 days

pub fn voter_from_headers(headers: &HeaderMap) -> Option<VoterId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| VoterId::from(value.to_string()))
}

pub fn session_cookie(voter_id: &VoterId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, voter_id, SESSION_MAX_AGE_SECS
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("a=1; sessionId=abc-123; b=2"));

        let voter = voter_from_headers(&headers).unwrap();
        assert_eq!(voter.as_str(), "abc-123");
    }

    #[test]
    fn empty_session_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionId="));

        assert!(voter_from_headers(&headers).is_none());
        assert!(voter_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn cookie_lasts_thirty_days() {
        let value = session_cookie(&VoterId::from("tok".to_string())).unwrap();
        let value = value.to_str().unwrap();

        assert!(value.starts_with("sessionId=tok;"));
        assert!(value.contains("Max-Age=2592000"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Path=/"));
    }
}
