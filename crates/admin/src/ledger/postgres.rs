//! `PostgreSQL` inventory ledger.
//!
//! Each mutating call runs in one transaction. Status transitions lock the
//! order row (`SELECT ... FOR UPDATE`), so two transitions on the same order
//! are serialized, and adjust stock with conditional single-statement updates
//! in product ID order so concurrent commits never deadlock or go below zero.
//! A dropped transaction rolls back, so a cancelled call leaves no trace.

use mercato_core::{
    InventoryEffect, Order, OrderId, OrderLine, OrderStatus, ProductId, ProductStock,
    StockShortage, merged_quantities,
};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use super::{InventoryLedger, LedgerError, NewOrder, StockOperation};
use crate::db::rows::{LineRow, OrderRow, ProductRow, db_quantity};

/// Inventory ledger backed by the admin `PostgreSQL` database.
#[derive(Debug, Clone)]
pub struct PgInventoryLedger {
    pool: PgPool,
}

impl PgInventoryLedger {
    /// Create a ledger over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl InventoryLedger for PgInventoryLedger {
    async fn product(&self, product_id: ProductId) -> Result<Option<ProductStock>, LedgerError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, image, stock
            FROM admin.products
            WHERE id = $1 AND NOT is_deleted
            ",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProductStock::try_from).transpose()
    }

    async fn products(&self, product_ids: &[ProductId]) -> Result<Vec<ProductStock>, LedgerError> {
        let ids: Vec<i64> = product_ids.iter().map(|id| id.get()).collect();

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, image, stock
            FROM admin.products
            WHERE id = ANY($1) AND NOT is_deleted
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProductStock::try_from).collect()
    }

    async fn low_stock(&self, threshold: u32) -> Result<Vec<ProductStock>, LedgerError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, image, stock
            FROM admin.products
            WHERE NOT is_deleted AND stock <= $1
            ORDER BY stock, id
            ",
        )
        .bind(i64::from(threshold))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProductStock::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn adjust_stock(
        &self,
        product_id: ProductId,
        change: u32,
        operation: StockOperation,
    ) -> Result<ProductStock, LedgerError> {
        let delta = db_quantity(change)?;

        let row = match operation {
            StockOperation::Add => {
                sqlx::query_as::<_, ProductRow>(
                    r"
                    UPDATE admin.products
                    SET stock = stock + $2, updated_at = NOW()
                    WHERE id = $1 AND NOT is_deleted
                    RETURNING id, name, price, image, stock
                    ",
                )
                .bind(product_id)
                .bind(delta)
                .fetch_optional(&self.pool)
                .await?
            }
            StockOperation::Subtract => {
                sqlx::query_as::<_, ProductRow>(
                    r"
                    UPDATE admin.products
                    SET stock = stock - $2, updated_at = NOW()
                    WHERE id = $1 AND NOT is_deleted AND stock >= $2
                    RETURNING id, name, price, image, stock
                    ",
                )
                .bind(product_id)
                .bind(delta)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match row {
            Some(row) => {
                let product = ProductStock::try_from(row)?;
                tracing::info!(
                    product_id = %product_id,
                    ?operation,
                    change,
                    stock = product.stock,
                    "Stock adjusted"
                );
                Ok(product)
            }
            None if operation == StockOperation::Add => {
                Err(LedgerError::ProductNotFound(product_id))
            }
            None => {
                // Either the product is gone or the subtraction would go negative.
                let current = self
                    .product(product_id)
                    .await?
                    .ok_or(LedgerError::ProductNotFound(product_id))?;
                Err(LedgerError::InsufficientStock(StockShortage {
                    product_id,
                    name: current.name,
                    available: current.stock,
                    required: change,
                }))
            }
        }
    }

    #[instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let total = order.total();
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO admin.orders (customer_id, status, promotion_code, shipping_fee, total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, customer_id, created_at, status, promotion_code, shipping_fee, total
            ",
        )
        .bind(order.customer_id)
        .bind(OrderStatus::Pending)
        .bind(order.promotion_code.as_deref())
        .bind(order.shipping_fee)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r"
                INSERT INTO admin.order_lines (order_id, product_id, quantity, unit_price, discount)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(header.id)
            .bind(line.product_id)
            .bind(db_quantity(line.quantity)?)
            .bind(line.unit_price)
            .bind(line.discount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(order_id = %header.id, total = %total, "Order created");
        Ok(header.into_order(order.lines))
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;

        let header = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, customer_id, created_at, status, promotion_code, shipping_fee, total
            FROM admin.orders
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

        match header {
            Some(header) => {
                let lines = fetch_lines(&mut conn, order_id).await?;
                Ok(Some(header.into_order(lines)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn apply_transition(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        effect: InventoryEffect,
    ) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, customer_id, created_at, status, promotion_code, shipping_fee, total
            FROM admin.orders
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::OrderNotFound(order_id))?;

        if header.status != expected {
            return Err(LedgerError::StatusChanged {
                order_id,
                expected,
                current: header.status,
            });
        }

        let lines = fetch_lines(&mut tx, order_id).await?;
        let quantities = merged_quantities(lines.iter().map(|l| (l.product_id, l.quantity)));

        match effect {
            InventoryEffect::Commit => {
                for (product_id, quantity) in &quantities {
                    commit_line(&mut tx, *product_id, *quantity).await?;
                }
            }
            InventoryEffect::Release => {
                for (product_id, quantity) in &quantities {
                    release_line(&mut tx, *product_id, *quantity).await?;
                }
            }
            InventoryEffect::None => {}
        }

        sqlx::query(
            r"
            UPDATE admin.orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            ",
        )
        .bind(order_id)
        .bind(next)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut order = header.into_order(lines);
        order.status = next;
        Ok(order)
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Fetch an order's lines on an existing connection.
async fn fetch_lines(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderLine>, LedgerError> {
    let rows = sqlx::query_as::<_, LineRow>(
        r"
        SELECT product_id, quantity, unit_price, discount
        FROM admin.order_lines
        WHERE order_id = $1
        ORDER BY product_id
        ",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(OrderLine::try_from).collect()
}

/// Decrement one product's stock if it can cover `quantity`.
async fn commit_line(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), LedgerError> {
    let delta = db_quantity(quantity)?;

    let remaining: Option<(i32,)> = sqlx::query_as(
        r"
        UPDATE admin.products
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        RETURNING stock
        ",
    )
    .bind(product_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((stock,)) = remaining {
        tracing::info!(product_id = %product_id, delta = -i64::from(delta), stock, "Stock committed");
        return Ok(());
    }

    let current: Option<(String, i32)> =
        sqlx::query_as("SELECT name, stock FROM admin.products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    let (name, stock) = current.ok_or(LedgerError::ProductNotFound(product_id))?;
    Err(LedgerError::InsufficientStock(StockShortage {
        product_id,
        name,
        available: u32::try_from(stock).unwrap_or(0),
        required: quantity,
    }))
}

/// Return `quantity` units of one product to stock.
async fn release_line(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), LedgerError> {
    let delta = db_quantity(quantity)?;

    let (stock,): (i32,) = sqlx::query_as(
        r"
        UPDATE admin.products
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1
        RETURNING stock
        ",
    )
    .bind(product_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::ProductNotFound(product_id))?;

    tracing::info!(product_id = %product_id, delta, stock, "Stock released");
    Ok(())
}
