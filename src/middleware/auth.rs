use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{verify_token, Identity};
use crate::error::ApiError;
use crate::state::AppState;

pub const TOKEN_REQUIRED: &str = "Authentication token required";
pub const TOKEN_INVALID: &str = "Invalid or expired authentication token.";

/// JWT authentication middleware that validates tokens and injects the caller's [`Identity`]
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| ApiError::unauthorized(TOKEN_REQUIRED))?;

    let claims = verify_token(&state.config.security, &token)
        .map_err(|_| ApiError::unauthorized(TOKEN_INVALID))?;

    let identity = Identity::from(claims);
    tracing::debug!("Authenticated user {} as {}", identity.user_id, identity.role);

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Extract the bearer token; a missing header and a malformed one are the same failure.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;

    let token = auth_str.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")), Some("abc.def".to_string()));
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(extract_bearer(&headers("Bearer   ")), None);
    }
}
