//! HTTP client for the back office API.
//!
//! The back office owns the inventory ledger and orders. The storefront talks
//! to it for three things: the availability oracle, cart additions, and order
//! placement. Every call carries the bearer token and is bounded by the
//! configured timeout.

use std::future::Future;

use mercato_core::{
    AddToCartRequest, AvailabilityResult, CartLine, Order, PlaceOrderRequest, ProductId,
};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::BackendConfig;
use crate::middleware::{REQUEST_ID_HEADER, current_request_id};

/// Errors that can occur when calling the back office.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure: connect, timeout, or a broken body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The back office answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or build a request.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The back office could not be reached for another reason.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// HTTP status of an API error, if the back office answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Answers "can this product be bought in this quantity right now?".
pub trait AvailabilityOracle: Send + Sync + 'static {
    fn check(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<AvailabilityResult, BackendError>> + Send;
}

/// Write side of the back office used by the cart.
pub trait CartBackend: Send + Sync + 'static {
    /// Validate an addition and return the canonical line.
    fn add_line(
        &self,
        request: &AddToCartRequest,
    ) -> impl Future<Output = Result<CartLine, BackendError>> + Send;

    /// Create a `Pending` order.
    fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> impl Future<Output = Result<Order, BackendError>> + Send;
}

/// Back office API client.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a new back office client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_token.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| BackendError::Parse(format!("Invalid API token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert("Authorization", auth_value);

        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Parse(format!("Invalid endpoint {path}: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match current_request_id() {
            Some(id) => builder.header(REQUEST_ID_HEADER, id),
            None => builder,
        }
    }

    /// Query the availability oracle.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn availability(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<AvailabilityResult, BackendError> {
        let mut url = self.endpoint("api/inventory/availability")?;
        url.query_pairs_mut()
            .append_pair("product_id", &product_id.to_string())
            .append_pair("quantity", &quantity.to_string());

        let response = self.request(reqwest::Method::GET, url).send().await?;
        read_json(response).await
    }

    /// Ask the back office to validate a cart addition.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` with the back office's message when the
    /// addition is refused.
    #[instrument(skip(self), fields(product_id = %request.product_id))]
    pub async fn add_to_cart(&self, request: &AddToCartRequest) -> Result<CartLine, BackendError> {
        let url = self.endpoint("api/cart/add")?;
        let response = self.request(reqwest::Method::POST, url).json(request).send().await?;
        read_json(response).await
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` when the order is refused.
    #[instrument(skip(self), fields(customer_id = %request.customer_id, lines = request.lines.len()))]
    pub async fn create_order(&self, request: &PlaceOrderRequest) -> Result<Order, BackendError> {
        let url = self.endpoint("api/orders")?;
        let response = self.request(reqwest::Method::POST, url).json(request).send().await?;
        let order: Order = read_json(response).await?;

        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    /// Check that the back office is ready.
    ///
    /// # Errors
    ///
    /// Returns error if the back office is unreachable or not ready.
    pub async fn ping(&self) -> Result<(), BackendError> {
        let url = self.endpoint("health/ready")?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!("readiness returned {status}")))
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(BackendError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| BackendError::Parse(e.to_string()))
}

impl AvailabilityOracle for BackendClient {
    async fn check(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<AvailabilityResult, BackendError> {
        self.availability(product_id, quantity).await
    }
}

impl CartBackend for BackendClient {
    async fn add_line(&self, request: &AddToCartRequest) -> Result<CartLine, BackendError> {
        self.add_to_cart(request).await
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Order, BackendError> {
        self.create_order(request).await
    }
}
