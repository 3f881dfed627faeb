//! Database access for catalog-service.

use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use service_core::error::AppError;

use crate::models::Product;

/// Page size for every product listing.
pub const PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub inventory_count: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub inventory_count: Option<i32>,
    pub is_active: Option<bool>,
}

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

    /// Paginated listing with optional case-insensitive search over name
    /// and description. Returns the page plus the total match count.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: i64,
        search: Option<&str>,
    ) -> Result<(Vec<Product>, i64), AppError> {
        let page = page.max(1);
        let pattern = search.map(|s| format!("%{}%", s));

        let (products, total) = match &pattern {
            Some(pattern) => {
                let products = sqlx::query_as::<_, Product>(
                    r#"
                    SELECT * FROM products
                    WHERE name ILIKE $1 OR description ILIKE $1
                    ORDER BY id
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(pattern)
                .bind(PAGE_SIZE)
                .bind((page - 1) * PAGE_SIZE)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM products WHERE name ILIKE $1 OR description ILIKE $1",
                )
                .bind(pattern)
                .fetch_one(&self.pool)
                .await?;

                (products, total)
            }
            None => {
                let products = sqlx::query_as::<_, Product>(
                    "SELECT * FROM products ORDER BY id LIMIT $1 OFFSET $2",
                )
                .bind(PAGE_SIZE)
                .bind((page - 1) * PAGE_SIZE)
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
                    .fetch_one(&self.pool)
                    .await?;

                (products, total)
            }
        };

        Ok((products, total))
    }

    pub async fn find_product(&self, id: i64) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &NewProduct) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price, inventory_count, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.inventory_count)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await?;

        info!(product_id = product.id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: i64,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                inventory_count = COALESCE($5, inventory_count),
                is_active = COALESCE($6, is_active),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price)
        .bind(update.inventory_count)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
