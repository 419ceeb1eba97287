//! Bearer-token guard for the admin API.
//!
//! The storefront backend client and staff tools present
//! `Authorization: Bearer <ADMIN_API_TOKEN>` on every `/api` call.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::ledger::InventoryLedger;
use crate::state::AppState;

/// Reject requests that do not carry the configured API token.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if the header is missing or wrong.
pub async fn require_api_token<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    if !constant_time_compare(presented.trim(), state.config().api_token.expose_secret()) {
        tracing::warn!(path = %request.uri().path(), "Rejected API call with invalid token");
        return Err(AppError::Unauthorized("invalid token".to_string()));
    }

    Ok(next.run(request).await)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("token", "token"));
        assert!(!constant_time_compare("token", "tokem"));
        assert!(!constant_time_compare("token", "tokens"));
    }
}
