use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use validator::Validate;

use service_core::auth::AdminCaller;
use service_core::error::AppError;

use crate::db::{NewProduct, ProductUpdate, PAGE_SIZE};
use crate::dtos::{CreateProductRequest, ListQuery, ProductPage, UpdateProductRequest};
use crate::models::Product;
use crate::AppState;

/// GET /products?page=&search=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProductPage>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let (items, total) = state.db.list_products(page, query.search.as_deref()).await?;

    Ok(Json(ProductPage {
        items,
        page,
        page_size: PAGE_SIZE,
        total,
    }))
}

/// GET /products/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("product {} not found", id)))?;
    Ok(Json(product))
}

/// POST /products (admin)
pub async fn create(
    State(state): State<AppState>,
    AdminCaller(_caller): AdminCaller,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    req.validate()?;
    require_non_negative_price(&req.price)?;

    let product = state
        .db
        .create_product(&NewProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            inventory_count: req.inventory_count,
            is_active: req.is_active,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/{id} (admin)
pub async fn update(
    State(state): State<AppState>,
    AdminCaller(_caller): AdminCaller,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    req.validate()?;
    if let Some(price) = &req.price {
        require_non_negative_price(price)?;
    }

    let product = state
        .db
        .update_product(
            id,
            &ProductUpdate {
                name: req.name,
                description: req.description,
                price: req.price,
                inventory_count: req.inventory_count,
                is_active: req.is_active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("product {} not found", id)))?;

    Ok(Json(product))
}

/// DELETE /products/{id} (admin)
pub async fn delete(
    State(state): State<AppState>,
    AdminCaller(_caller): AdminCaller,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_product(id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "product {} not found",
            id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn require_non_negative_price(price: &Decimal) -> Result<(), AppError> {
    if price.is_sign_negative() {
        return Err(AppError::InputInvalid(anyhow::anyhow!(
            "price must not be negative"
        )));
    }
    Ok(())
}
