//! Database access for order-service.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use service_core::error::AppError;

use crate::models::{Order, OrderLine, OrderStatus};
use crate::services::ValidatedOrder;

/// Page size for every order listing.
pub const PAGE_SIZE: i64 = 20;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url))]
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Persist a validated order and its lines in a single local
    /// transaction; either everything lands or nothing does.
    #[instrument(skip(self, validated, owner_cipher, owner_digest))]
    pub async fn create_order(
        &self,
        validated: &ValidatedOrder,
        owner_cipher: &[u8],
        owner_digest: &[u8],
    ) -> Result<(Order, Vec<OrderLine>), AppError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (owner_cipher, owner_digest, total_amount, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(owner_cipher)
        .bind(owner_digest)
        .bind(validated.total_amount)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(validated.lines.len());
        for line in &validated.lines {
            let stored = sqlx::query_as::<_, OrderLine>(
                r#"
                INSERT INTO order_lines (order_id, product_id, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.price_at_purchase)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(stored);
        }

        tx.commit().await?;

        info!(order_id = order.id, total = %order.total_amount, "Order persisted");
        Ok((order, lines))
    }

    pub async fn find_order(&self, id: i64) -> Result<Option<(Order, Vec<OrderLine>)>, AppError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match order {
            Some(order) => {
                let lines = self.lines_for(order.id).await?;
                Ok(Some((order, lines)))
            }
            None => Ok(None),
        }
    }

    async fn lines_for(&self, order_id: i64) -> Result<Vec<OrderLine>, AppError> {
        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Orders whose owner digest matches, newest first.
    #[instrument(skip(self, owner_digest))]
    pub async fn list_orders_by_owner(
        &self,
        owner_digest: &[u8],
        page: i64,
    ) -> Result<(Vec<(Order, Vec<OrderLine>)>, i64), AppError> {
        let page = page.max(1);

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE owner_digest = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_digest)
        .bind(PAGE_SIZE)
        .bind((page - 1) * PAGE_SIZE)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE owner_digest = $1")
            .bind(owner_digest)
            .fetch_one(&self.pool)
            .await?;

        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let lines = self.lines_for(order.id).await?;
            result.push((order, lines));
        }

        Ok((result, total))
    }

    /// All orders, newest first. Admin surface.
    #[instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        page: i64,
    ) -> Result<(Vec<(Order, Vec<OrderLine>)>, i64), AppError> {
        let page = page.max(1);

        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(PAGE_SIZE)
        .bind((page - 1) * PAGE_SIZE)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let lines = self.lines_for(order.id).await?;
            result.push((order, lines));
        }

        Ok((result, total))
    }

    /// Apply a status transition after checking the state machine under
    /// a row lock, so concurrent transitions serialize.
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: i64,
        next: OrderStatus,
    ) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;

        let current = current
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("order {} not found", order_id)))?;

        let current = OrderStatus::parse(&current).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("order {} has corrupt status", order_id))
        })?;

        if !current.can_transition_to(next) {
            return Err(AppError::ConflictState(anyhow::anyhow!(
                "cannot transition order {} from {} to {}",
                order_id,
                current.as_str(),
                next.as_str()
            )));
        }

        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(order_id, status = next.as_str(), "Order status updated");
        Ok(order)
    }
}
