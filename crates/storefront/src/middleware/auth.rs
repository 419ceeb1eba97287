//! Customer identity extractors.
//!
//! The identity provider writes a [`CurrentCustomer`] into the session when a
//! customer signs in; these extractors read it back for route handlers.
//! A request without a session layer, or with an unreadable session, counts
//! as anonymous.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// The signed-in customer; anonymous requests are rejected with 401.
///
/// ```rust,ignore
/// async fn orders(RequireAuth(customer): RequireAuth) -> String {
///     format!("orders for {}", customer.id)
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// The signed-in customer, if any.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, "Please sign in to continue").into_response()
    }
}

async fn customer_in(parts: &Parts) -> Option<CurrentCustomer> {
    let session = parts.extensions.get::<Session>()?;
    match session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
    {
        Ok(customer) => customer,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable customer in session");
            None
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(customer_in(parts).await))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        customer_in(parts).await.map(Self).ok_or(AuthRejection)
    }
}

/// Record `customer` as signed in for this session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Forget the signed-in customer. The cart stays in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
        .map(drop)
}
