//! Staff identification for incoming requests.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::state::AppState;

pub const STAFF_NAME_HEADER: &str = "x-staff-name";
pub const STAFF_ROLE_HEADER: &str = "x-staff-role";

/// Who is calling, as far as the request says.
///
/// When the server has an API key configured the request must carry it as
/// `Authorization: Bearer <key>`; otherwise every request is let through.
/// Name and role come from optional headers and are only used for the
/// record (e.g. who attended a session).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffContext {
    pub name: Option<String>,
    pub role: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for StaffContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(expected) = state.api_key() {
            match bearer_token(&parts.headers) {
                Some(provided) if provided == expected => {}
                _ => return Err(ApiError::Unauthorized),
            }
        }

        Ok(StaffContext {
            name: header_value(&parts.headers, STAFF_NAME_HEADER),
            role: header_value(&parts.headers, STAFF_ROLE_HEADER),
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
