//! Order API handlers.
//!
//! The caller is identified from the session. Every response body is JSON;
//! failures use the shape produced by [`AppError`].

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use tower_sessions::Session;

use orderdesk_core::{Order, OrderId};

use crate::error::{AppError, Result, set_sentry_user};
use crate::services::orders::{CreateOrderRequest, Identity, OrderError};
use crate::state::AppState;

/// Resolve the session's identity through the order service.
async fn caller(state: &AppState, session: &Session) -> Result<Option<Identity>> {
    let identity = state.orders().resolve_identity(session).await?;
    if let Some(identity) = &identity {
        set_sentry_user(&identity.user_id);
    }
    Ok(identity)
}

fn order_id(path: std::result::Result<Path<OrderId>, PathRejection>) -> Result<OrderId> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

/// Create an order.
///
/// POST /api/orders
///
/// # Errors
///
/// Returns `AppError` if the caller is anonymous, the body is malformed, or
/// the order service rejects the cart.
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>)> {
    let Some(identity) = caller(&state, &session).await? else {
        return Err(OrderError::Unauthorized.into());
    };
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let order = state.orders().create(request, Some(&identity)).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List the caller's orders, newest first.
///
/// GET /api/orders
///
/// # Errors
///
/// Returns `AppError` if the caller is anonymous or the store fails.
pub async fn list(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Order>>> {
    let identity = caller(&state, &session).await?;
    let orders = state.orders().list_for_user(identity.as_ref()).await?;
    Ok(Json(orders))
}

/// Fetch one of the caller's orders.
///
/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns `AppError` if the caller is anonymous or the order is not theirs.
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    path: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Order>> {
    let identity = caller(&state, &session).await?;
    let id = order_id(path)?;
    let order = state.orders().get_by_id(id, identity.as_ref()).await?;
    Ok(Json(order))
}

/// Cancel one of the caller's orders.
///
/// POST /api/orders/{id}/cancel
///
/// # Errors
///
/// Returns `AppError` with status 409 if the order can no longer be cancelled.
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    path: std::result::Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Order>> {
    let identity = caller(&state, &session).await?;
    let id = order_id(path)?;
    let order = state.orders().cancel(id, identity.as_ref()).await?;
    Ok(Json(order))
}
