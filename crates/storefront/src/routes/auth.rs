//! Session identity handlers.
//!
//! Sign-in happens at the identity provider, which writes the customer into
//! the session. The storefront only offers sign-out.

use axum::http::StatusCode;
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user};
use crate::middleware::clear_current_customer;

/// `POST /auth/logout` - forget the customer; the cart stays with the session.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_customer(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
