//! Integration tests for Mercato.
//!
//! Every scenario runs against the in-memory ledger; no database is needed.
//! Helpers here build the admin services directly, or serve the admin and
//! storefront routers on ephemeral ports so the storefront talks to a real
//! back office over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mercato-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::{Router, http::StatusCode, routing::post};
use chrono::Utc;
use mercato_admin::config::AdminConfig;
use mercato_admin::ledger::MemoryLedger;
use mercato_admin::services::{
    CheckoutService, OrderStatusService, PromotionCatalog, ShippingPolicy,
};
use mercato_core::{CustomerId, Order, OrderId, OrderLine, OrderStatus, Price, ProductId};
use mercato_storefront::config::{BackendConfig, StorefrontConfig};
use mercato_storefront::middleware::{session_layer, set_current_customer};
use mercato_storefront::models::CurrentCustomer;
use mercato_storefront::state::{AppState as StorefrontState, StoreCartEngine};
use mercato_storefront::{backend::BackendClient, cart::CartEngine};
use secrecy::SecretString;
use tower_sessions::{MemoryStore, Session};
use url::Url;

/// API token shared by the test back office and its clients.
pub const TOKEN: &str = "k3Yq9vXr2LmT8wPz5NcB7hJd4FsG6aQe";

/// Ledger deadline used by test services.
pub const LEDGER_TIMEOUT: Duration = Duration::from_millis(300);

/// Customer every test signs in as.
pub const CUSTOMER: CustomerId = CustomerId::new(5);

/// Vouchers known to the test back office.
pub const PROMOTIONS: &str = r#"[
    {"code": "SPRING", "type": "fixed", "amount": 0},
    {"code": "WINTER", "type": "free_shipping"},
    {"code": "TENOFF", "type": "percentage", "percent": 10, "maxDiscount": 15, "minOrderAmount": 50}
]"#;

#[must_use]
pub fn promotions() -> PromotionCatalog {
    PromotionCatalog::from_json(PROMOTIONS).unwrap()
}

#[must_use]
pub fn admin_config() -> AdminConfig {
    AdminConfig {
        database_url: SecretString::from("postgres://localhost/mercato_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        api_token: SecretString::from(TOKEN),
        ledger_timeout: LEDGER_TIMEOUT,
        low_stock_threshold: 10,
        shipping_fee: Price::ZERO,
        free_shipping_threshold: None,
        promotions: promotions(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

#[must_use]
pub fn order_service(ledger: &MemoryLedger) -> OrderStatusService<MemoryLedger> {
    OrderStatusService::new(ledger.clone(), LEDGER_TIMEOUT)
}

#[must_use]
pub fn checkout_service(ledger: &MemoryLedger) -> CheckoutService<MemoryLedger> {
    CheckoutService::new(
        ledger.clone(),
        LEDGER_TIMEOUT,
        ShippingPolicy::flat(Price::ZERO),
        promotions(),
    )
}

/// Put a `status` order for `lines` of `(product, quantity)` at 10 per unit.
pub fn seed_order(
    ledger: &MemoryLedger,
    id: i64,
    status: OrderStatus,
    lines: &[(ProductId, u32)],
) -> OrderId {
    let unit_price = Price::from_units(10);
    let lines: Vec<OrderLine> = lines
        .iter()
        .map(|&(product_id, quantity)| OrderLine {
            product_id,
            quantity,
            unit_price,
            discount: Price::ZERO,
        })
        .collect();
    let order = Order {
        id: OrderId::new(id),
        customer_id: CUSTOMER,
        created_at: Utc::now(),
        status,
        promotion_code: None,
        shipping_fee: Price::ZERO,
        total: mercato_core::order_total(&lines, Price::ZERO),
        lines,
    };
    ledger.put_order(order).unwrap();
    OrderId::new(id)
}

/// Serve a router on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Serve the back office API over `ledger`.
pub async fn spawn_admin(ledger: &MemoryLedger) -> SocketAddr {
    let state = mercato_admin::state::AppState::new(admin_config(), ledger.clone());
    serve(mercato_admin::routes::router(state)).await
}

#[must_use]
pub fn backend_config(admin: SocketAddr) -> BackendConfig {
    BackendConfig {
        base_url: Url::parse(&format!("http://{admin}/")).unwrap(),
        api_token: SecretString::from(TOKEN),
        timeout: Duration::from_secs(2),
    }
}

/// Cart engine wired to a running back office.
#[must_use]
pub fn cart_engine(admin: SocketAddr) -> StoreCartEngine {
    let client = BackendClient::new(&backend_config(admin)).unwrap();
    CartEngine::new(client.clone(), client)
}

#[must_use]
pub fn storefront_config(admin: SocketAddr) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/mercato_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost".to_string(),
        session_secret: SecretString::from(TOKEN),
        backend: backend_config(admin),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

async fn sign_in(session: Session) -> StatusCode {
    let customer = CurrentCustomer {
        id: CUSTOMER,
        display_name: None,
    };
    match set_current_customer(&session, &customer).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve the storefront against a running back office.
///
/// `POST /test/sign-in` stands in for the identity provider.
pub async fn spawn_storefront(admin: SocketAddr) -> SocketAddr {
    let state = StorefrontState::new(storefront_config(admin)).unwrap();
    let router = Router::new()
        .route("/test/sign-in", post(sign_in))
        .merge(mercato_storefront::routes::routes())
        .layer(session_layer(MemoryStore::default(), false))
        .with_state(state);
    serve(router).await
}

/// HTTP client that keeps the session cookie.
#[must_use]
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}
