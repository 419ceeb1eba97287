//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (pings the ledger)
//!
//! # Inventory (bearer token)
//! GET  /api/inventory/availability      - Availability oracle
//! GET  /api/inventory/check             - Multi-line stock check
//! GET  /api/inventory/low-stock         - Low-stock report
//! PUT  /api/inventory/stock             - Manual stock adjustment
//!
//! # Cart (bearer token)
//! POST /api/cart/add                    - Validate an addition, return canonical line
//!
//! # Orders (bearer token)
//! POST /api/orders                      - Place an order at Pending
//! GET  /api/orders/{id}                 - Order with lines
//! GET  /api/orders/{id}/actions         - Legal next statuses
//! PUT  /api/orders/{id}/status          - Status transition
//! ```

pub mod api;

use axum::{Router, extract::State, http::StatusCode, middleware, routing::get};

use crate::ledger::InventoryLedger;
use crate::middleware::require_api_token;
use crate::state::AppState;

/// Build the full router: health checks plus the token-guarded API.
pub fn router<L: InventoryLedger>(state: AppState<L>) -> Router {
    let api = api::router::<L>().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_api_token::<L>,
    ));

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<L>))
        .merge(api)
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the ledger is not reachable.
async fn readiness<L: InventoryLedger>(State(state): State<AppState<L>>) -> StatusCode {
    match state.ledger().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, header};
    use chrono::Utc;
    use mercato_core::{CustomerId, Order, OrderId, OrderLine, OrderStatus, Price, ProductId};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AdminConfig;
    use crate::ledger::MemoryLedger;
    use crate::services::{PromotionCatalog, TransitionResponse};

    const TOKEN: &str = "k3Yq9vXr2LmT8wPz5NcB7hJd4FsG6aQe";

    fn config() -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/mercato_test"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3001,
            api_token: SecretString::from(TOKEN),
            ledger_timeout: Duration::from_millis(500),
            low_stock_threshold: 10,
            shipping_fee: Price::ZERO,
            free_shipping_threshold: None,
            promotions: PromotionCatalog::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    fn app(ledger: &MemoryLedger) -> Router {
        router(AppState::new(config(), ledger.clone()))
    }

    fn request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn seed_order(ledger: &MemoryLedger, product: ProductId, quantity: u32) {
        ledger
            .put_order(Order {
                id: OrderId::new(42),
                customer_id: CustomerId::new(1),
                created_at: Utc::now(),
                status: OrderStatus::Pending,
                promotion_code: None,
                shipping_fee: Price::ZERO,
                total: Price::from_units(10).times(quantity),
                lines: vec![OrderLine {
                    product_id: product,
                    quantity,
                    unit_price: Price::from_units(10),
                    discount: Price::ZERO,
                }],
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let ledger = MemoryLedger::new();
        let response = app(&ledger)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        ledger.set_unavailable(true);
        let response = app(&ledger)
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let ledger = MemoryLedger::new();
        let response = app(&ledger)
            .oneshot(
                Request::get("/api/inventory/low-stock")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_availability_endpoint() {
        let ledger = MemoryLedger::new();
        let mug = ledger.add_product("Mug", Price::from_units(100), 3).unwrap();

        let uri = format!("/api/inventory/availability?product_id={mug}&quantity=5");
        let response = app(&ledger)
            .oneshot(request(Method::GET, &uri, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["available"], false);
        assert_eq!(body["currentStock"], 3);
        assert_eq!(body["reason"], "Only 3 left in stock");
    }

    #[tokio::test]
    async fn test_cart_add_rejects_short_stock_with_message() {
        let ledger = MemoryLedger::new();
        let mug = ledger.add_product("Mug", Price::from_units(100), 1).unwrap();

        let response = app(&ledger)
            .oneshot(request(
                Method::POST,
                "/api/cart/add",
                Some(serde_json::json!({"customerId": 1, "productId": mug.get(), "quantity": 2})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Only 1 left in stock");
    }

    #[tokio::test]
    async fn test_transition_endpoint_reports_shortage() {
        let ledger = MemoryLedger::new();
        let mug = ledger.add_product("Mug", Price::from_units(10), 3).unwrap();
        seed_order(&ledger, mug, 5);

        let response = app(&ledger)
            .oneshot(request(
                Method::PUT,
                "/api/orders/42/status",
                Some(serde_json::json!({"orderId": 42, "requestedStatus": "Confirmed"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body: TransitionResponse = json_body(response).await;
        assert!(!body.success);
        assert!(body.message.starts_with("Insufficient stock"));
        assert!(body.message.contains("short by 2"));
        assert!(!body.inventory_adjusted);
        assert_eq!(ledger.stock_of(mug), Some(3));
    }

    #[tokio::test]
    async fn test_transition_endpoint_confirms() {
        let ledger = MemoryLedger::new();
        let mug = ledger.add_product("Mug", Price::from_units(10), 8).unwrap();
        seed_order(&ledger, mug, 5);

        let response = app(&ledger)
            .oneshot(request(
                Method::PUT,
                "/api/orders/42/status",
                Some(serde_json::json!({"requestedStatus": "Confirmed"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: TransitionResponse = json_body(response).await;
        assert!(body.success);
        assert_eq!(body.old_status, Some(OrderStatus::Pending));
        assert_eq!(body.new_status, Some(OrderStatus::Confirmed));
        assert!(body.inventory_adjusted);
        assert_eq!(ledger.stock_of(mug), Some(3));
    }

    #[tokio::test]
    async fn test_actions_endpoint() {
        let ledger = MemoryLedger::new();
        let mug = ledger.add_product("Mug", Price::from_units(10), 8).unwrap();
        seed_order(&ledger, mug, 1);

        let response = app(&ledger)
            .oneshot(request(Method::GET, "/api/orders/42/actions", None))
            .await
            .unwrap();
        let body: serde_json::Value = json_body(response).await;
        assert_eq!(body["status"], "Pending");
        assert_eq!(body["actions"][0]["label"], "Confirm");
        assert_eq!(body["actions"][0]["adjustsInventory"], true);
        assert_eq!(body["actions"][1]["label"], "Cancel");
    }

    #[tokio::test]
    async fn test_place_order_endpoint() {
        let ledger = MemoryLedger::new();
        let mug = ledger.add_product("Mug", Price::from_units(10), 8).unwrap();

        let response = app(&ledger)
            .oneshot(request(
                Method::POST,
                "/api/orders",
                Some(serde_json::json!({
                    "customerId": 5,
                    "lines": [{"productId": mug.get(), "quantity": 2}]
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let order: Order = json_body(response).await;
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Price::from_units(20));
    }
}
