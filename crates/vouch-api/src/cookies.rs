use axum::{Json, extract::Query, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde_json::Value;
use tracing::{debug, warn};

use vouch_types::api::{CookieQuery, CookieValueResponse, SetCookieRequest, SuccessResponse};

/// Browsers cap a cookie at roughly 4 KB including its name and attributes.
pub const MAX_COOKIE_VALUE_LEN: usize = 4000;

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

pub fn encode_value(value: &Value) -> Result<String, serde_json::Error> {
    Ok(B64.encode(serde_json::to_vec(value)?))
}

pub fn decode_value(raw: &str) -> Option<Value> {
    let bytes = B64.decode(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn required_name(query: CookieQuery) -> Result<String, StatusCode> {
    query
        .name
        .filter(|n| is_valid_name(n))
        .ok_or(StatusCode::BAD_REQUEST)
}

/// GET /api/cookies?name=: `{ value }`, null when absent or unreadable.
pub async fn get_cookie(
    jar: CookieJar,
    Query(query): Query<CookieQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = required_name(query)?;

    let value = jar.get(&name).and_then(|c| {
        let decoded = decode_value(c.value());
        if decoded.is_none() {
            warn!("Cookie {} holds an undecodable value", name);
        }
        decoded
    });

    Ok(Json(CookieValueResponse { value }))
}

/// POST /api/cookies: `{ name, value, expiresDays }`.
pub async fn set_cookie(
    jar: CookieJar,
    Json(req): Json<SetCookieRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if !is_valid_name(&req.name) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let encoded = encode_value(&req.value).map_err(|_| StatusCode::BAD_REQUEST)?;
    if encoded.len() > MAX_COOKIE_VALUE_LEN {
        debug!("Cookie {} refused, {} bytes encoded", req.name, encoded.len());
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let cookie = Cookie::build((req.name, encoded))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(time::Duration::days(i64::from(req.expires_days)));

    Ok((jar.add(cookie), Json(SuccessResponse { success: true })))
}

/// DELETE /api/cookies?name=: idempotent.
pub async fn delete_cookie(
    jar: CookieJar,
    Query(query): Query<CookieQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = required_name(query)?;
    let jar = jar.remove(Cookie::build((name, "")).path("/"));
    Ok((jar, Json(SuccessResponse { success: true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_survive_encoding() {
        let value = json!({"listing_id": "L1", "body_text": "a; b, \"c\""});
        let encoded = encode_value(&value).unwrap();
        assert!(!encoded.contains(';'));
        assert_eq!(decode_value(&encoded), Some(value));
        assert_eq!(decode_value("%%%"), None);
    }

    #[test]
    fn names_are_restricted() {
        assert!(is_valid_name("draft_review_L1"));
        assert!(is_valid_name("draft_review_ids"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a=b"));
        assert!(!is_valid_name("a b"));
    }
}
