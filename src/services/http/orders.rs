use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, Caller};
use crate::{
    models::orders,
    services::{
        call,
        orders::{OrderRequest, DEFAULT_PAGE_SIZE},
        ServiceError,
    },
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    order_type: orders::OrderType,
    page: Option<i64>,
    limit: Option<i64>,
}

pub async fn place_order(
    State(state): State<AppState>,
    Caller(buyer): Caller,
    payload: Result<Json<orders::PlaceOrder>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(order) = payload?;

    let order = call(&state.channels.orders, "Orders", |response| {
        OrderRequest::PlaceOrder {
            buyer_id: buyer.id,
            order,
            response,
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order placed successfully",
            "order": order,
        })),
    ))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Caller(user): Caller,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Query(query) = query?;

    let page = call(&state.channels.orders, "Orders", |response| {
        OrderRequest::ListOrders {
            user_id: user.id,
            order_type: query.order_type,
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            response,
        }
    })
    .await?;

    Ok(Json(page))
}

/// Buyers see their own orders, admins see all of them.
pub async fn get_order(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = call(&state.channels.orders, "Orders", |response| {
        OrderRequest::GetOrder {
            id: id.clone(),
            response,
        }
    })
    .await?;

    if order.user_id != user.id && !user.role.is_admin() {
        return Err(ServiceError::NotFound(format!("Order not found: {id}")));
    }

    Ok(Json(order))
}
