use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use service_core::auth::{AdminCaller, Caller};
use service_core::error::AppError;

use crate::db::PAGE_SIZE;
use crate::dtos::{CreateOrderRequest, ListQuery, OrderPage, StatusTransitionRequest};
use crate::models::{Order, OrderLine, OrderLineView, OrderStatus, OrderView};
use crate::AppState;

/// POST /orders
///
/// The full creation pipeline: validate input, validate the owner
/// against identity-service, snapshot prices and availability against
/// catalog-service, then persist atomically. The owner id is taken from
/// the verified token, encrypted at rest, and nothing is persisted on
/// any failure path.
pub async fn create(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let items: Vec<(i64, i32)> = req
        .items
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();

    let validated = state.orchestrator.validate(caller.subject, &items).await?;

    let owner_plaintext = caller.subject.to_string();
    let owner_cipher = state.cipher.encrypt(&owner_plaintext)?;
    let owner_digest = state.cipher.lookup_digest(&owner_plaintext);

    let (order, lines) = state
        .db
        .create_order(&validated, &owner_cipher, &owner_digest)
        .await?;

    let view = to_view(&state, order, lines)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders/{id}
///
/// The decrypted owner must match the caller unless the caller is an
/// admin; mismatches surface as not-found to avoid leaking order ids.
pub async fn get(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>, AppError> {
    let (order, lines) = state
        .db
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("order {} not found", id)))?;

    let owner_id = decrypt_owner(&state, &order)?;
    if owner_id != caller.subject && !caller.is_admin {
        return Err(AppError::NotFound(anyhow::anyhow!("order {} not found", id)));
    }

    let view = to_view(&state, order, lines)?;
    Ok(Json(view))
}

/// GET /orders
pub async fn list_mine(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderPage>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let digest = state.cipher.lookup_digest(&caller.subject.to_string());

    let (orders, total) = state.db.list_orders_by_owner(&digest, page).await?;
    let items = to_views_owned_by(&state, orders, Some(caller.subject))?;

    Ok(Json(OrderPage {
        items,
        page,
        page_size: PAGE_SIZE,
        total,
    }))
}

/// GET /orders/all (admin)
pub async fn list_all(
    State(state): State<AppState>,
    AdminCaller(_caller): AdminCaller,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderPage>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let (orders, total) = state.db.list_all_orders(page).await?;
    let items = to_views_owned_by(&state, orders, None)?;

    Ok(Json(OrderPage {
        items,
        page,
        page_size: PAGE_SIZE,
        total,
    }))
}

/// POST /orders/{id}/status (admin)
pub async fn transition_status(
    State(state): State<AppState>,
    AdminCaller(_caller): AdminCaller,
    Path(id): Path<i64>,
    Json(req): Json<StatusTransitionRequest>,
) -> Result<Json<OrderView>, AppError> {
    let order = state.db.transition_status(id, req.status).await?;
    let (order, lines) = state
        .db
        .find_order(order.id)
        .await?
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("order vanished mid-update")))?;

    let view = to_view(&state, order, lines)?;
    Ok(Json(view))
}

fn decrypt_owner(state: &AppState, order: &Order) -> Result<i64, AppError> {
    let plaintext = state.cipher.decrypt(&order.owner_cipher)?;
    plaintext.parse().map_err(|_| {
        AppError::InternalError(anyhow::anyhow!(
            "order {} owner field decrypted to a non-id",
            order.id
        ))
    })
}

fn to_view(state: &AppState, order: Order, lines: Vec<OrderLine>) -> Result<OrderView, AppError> {
    let owner_id = decrypt_owner(state, &order)?;
    let status = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("order {} has corrupt status", order.id))
    })?;

    Ok(OrderView {
        id: order.id,
        owner_id,
        total_amount: order.total_amount,
        status,
        created_at: order.created_at,
        updated_at: order.updated_at,
        lines: lines.iter().map(OrderLineView::from_line).collect(),
    })
}

/// Convert rows to views, verifying decrypted ownership when the listing
/// is scoped to one caller (the digest index narrows, decryption
/// decides).
fn to_views_owned_by(
    state: &AppState,
    orders: Vec<(Order, Vec<OrderLine>)>,
    expected_owner: Option<i64>,
) -> Result<Vec<OrderView>, AppError> {
    let mut views = Vec::with_capacity(orders.len());
    for (order, lines) in orders {
        let view = to_view(state, order, lines)?;
        if let Some(owner) = expected_owner {
            if view.owner_id != owner {
                continue;
            }
        }
        views.push(view);
    }
    Ok(views)
}
