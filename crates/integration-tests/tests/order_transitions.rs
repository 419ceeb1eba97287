//! Order status transitions and their stock effects, driven through the
//! status service against the in-memory ledger.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mercato_admin::ledger::MemoryLedger;
use mercato_admin::services::{TransitionError, TransitionResponse};
use mercato_core::{IllegalTransition, OrderId, OrderStatus, Price};
use mercato_integration_tests::{order_service, seed_order};

const ORDER: i64 = 42;

#[tokio::test]
async fn test_short_confirm_changes_nothing() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 3)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 5)]);
    let service = order_service(&ledger);

    let err = service
        .transition(order, OrderStatus::Confirmed)
        .await
        .unwrap_err();

    let TransitionError::InsufficientStock(shortage) = &err else {
        panic!("expected insufficient stock, got {err:?}");
    };
    assert_eq!(shortage.product_id, product);
    assert_eq!(shortage.shortage(), 2);
    assert!(err.to_string().starts_with("Insufficient stock for Stoneware mug"));

    assert_eq!(service.order(order).await.unwrap().status, OrderStatus::Pending);
    assert_eq!(ledger.stock_of(product), Some(3));
}

#[tokio::test]
async fn test_cancel_after_confirm_releases_stock() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 12)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 5)]);
    let service = order_service(&ledger);

    let confirmed = service.transition(order, OrderStatus::Confirmed).await.unwrap();
    assert!(confirmed.inventory_adjusted);
    assert_eq!(ledger.stock_of(product), Some(7));

    let cancelled = service.transition(order, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.old_status, OrderStatus::Confirmed);
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert!(cancelled.inventory_adjusted);
    assert_eq!(ledger.stock_of(product), Some(12));

    let err = service
        .transition(order, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::IllegalTransition(IllegalTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Processing,
        })
    );
    assert_eq!(ledger.stock_of(product), Some(12));
}

#[tokio::test]
async fn test_skipping_ahead_is_illegal() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 10)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 1)]);
    let service = order_service(&ledger);

    let err = service
        .transition(order, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::IllegalTransition(_)));
    assert_eq!(err.current_status(), Some(OrderStatus::Pending));
    assert_eq!(service.order(order).await.unwrap().status, OrderStatus::Pending);
    assert_eq!(ledger.stock_of(product), Some(10));
}

#[tokio::test]
async fn test_every_status_only_reaches_its_table() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 1000)
        .unwrap();
    let service = order_service(&ledger);
    let mut next_id = 100;

    for from in OrderStatus::ALL {
        for to in OrderStatus::ALL {
            next_id += 1;
            let order = seed_order(&ledger, next_id, from, &[(product, 1)]);
            let result = service.transition(order, to).await;

            assert_eq!(
                result.is_ok(),
                from.can_transition_to(to),
                "{from} -> {to}"
            );
            let expected = if result.is_ok() { to } else { from };
            assert_eq!(service.order(order).await.unwrap().status, expected);
        }
    }
}

#[tokio::test]
async fn test_full_lifecycle_commits_once() {
    let ledger = MemoryLedger::new();
    let mug = ledger
        .add_product("Stoneware mug", Price::from_units(18), 10)
        .unwrap();
    let towel = ledger
        .add_product("Linen towel", Price::from_units(24), 4)
        .unwrap();
    let order = seed_order(
        &ledger,
        ORDER,
        OrderStatus::Pending,
        &[(mug, 2), (towel, 1), (mug, 1)],
    );
    let service = order_service(&ledger);

    for (status, adjusts) in [
        (OrderStatus::Confirmed, true),
        (OrderStatus::Processing, false),
        (OrderStatus::Shipped, false),
        (OrderStatus::Delivered, false),
    ] {
        let outcome = service.transition(order, status).await.unwrap();
        assert_eq!(outcome.new_status, status);
        assert_eq!(outcome.inventory_adjusted, adjusts, "{status}");
    }

    assert_eq!(ledger.stock_of(mug), Some(7));
    assert_eq!(ledger.stock_of(towel), Some(3));
    assert!(service.available_actions(order).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_after_shipping_restocks() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 6)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 4)]);
    let service = order_service(&ledger);

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        service.transition(order, status).await.unwrap();
    }
    assert_eq!(ledger.stock_of(product), Some(2));

    let returned = service.transition(order, OrderStatus::Returned).await.unwrap();
    assert!(returned.inventory_adjusted);
    assert_eq!(ledger.stock_of(product), Some(6));
}

#[tokio::test]
async fn test_cancelling_pending_order_leaves_stock() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 6)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 4)]);
    let service = order_service(&ledger);

    let outcome = service.transition(order, OrderStatus::Cancelled).await.unwrap();
    assert!(!outcome.inventory_adjusted);
    assert_eq!(ledger.stock_of(product), Some(6));
}

#[tokio::test]
async fn test_unknown_order() {
    let service = order_service(&MemoryLedger::new());
    let err = service
        .transition(OrderId::new(404), OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert_eq!(err, TransitionError::OrderNotFound(OrderId::new(404)));
}

#[tokio::test]
async fn test_slow_ledger_is_a_failure() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 10)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 5)]);
    let service = order_service(&ledger);

    ledger.set_latency(Duration::from_secs(2));
    let err = service
        .transition(order, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Infrastructure(_)));

    let response = TransitionResponse::from_result(order, &Err(err));
    assert!(!response.success);
    assert!(!response.inventory_adjusted);
    assert!(response.message.ends_with("order status unchanged"));

    // The sleeping call never reached the ledger state.
    ledger.set_latency(Duration::ZERO);
    assert_eq!(service.order(order).await.unwrap().status, OrderStatus::Pending);
    assert_eq!(ledger.stock_of(product), Some(10));
}

#[tokio::test]
async fn test_transient_failure_then_retry() {
    let ledger = MemoryLedger::new();
    let product = ledger
        .add_product("Stoneware mug", Price::from_units(18), 10)
        .unwrap();
    let order = seed_order(&ledger, ORDER, OrderStatus::Pending, &[(product, 5)]);
    let service = order_service(&ledger);

    ledger.fail_next(1);
    let err = service
        .transition(order, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Infrastructure(_)));
    assert_eq!(ledger.stock_of(product), Some(10));

    let outcome = service.transition(order, OrderStatus::Confirmed).await.unwrap();
    assert_eq!(outcome.new_status, OrderStatus::Confirmed);
    assert_eq!(ledger.stock_of(product), Some(5));
}
