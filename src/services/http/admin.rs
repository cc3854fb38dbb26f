use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{Admin, AppState};
use crate::{
    models::orders::OrderStatus,
    services::{
        call, orders::OrderRequest, settings::SettingsRequest, users::UserRequest, ServiceError,
    },
};

#[derive(Deserialize)]
pub struct StatusUpdate {
    status: OrderStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionUpdate {
    referral_commission: f64,
}

#[derive(Deserialize)]
pub struct BlockedUpdate {
    blocked: bool,
}

#[derive(Deserialize)]
pub struct VerifiedUpdate {
    verified: bool,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(update) = payload?;

    let order = call(&state.channels.orders, "Orders", |response| {
        OrderRequest::UpdateOrderStatus {
            id,
            status: update.status,
            response,
        }
    })
    .await?;
    log::info!("Admin {} changed order {}.", admin.id, order.id);

    Ok(Json(order))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Admin(_): Admin,
) -> Result<impl IntoResponse, ServiceError> {
    let rate = call(&state.channels.settings, "Settings", |response| {
        SettingsRequest::GetCommissionRate { response }
    })
    .await?;

    Ok(Json(json!({"referralCommission": rate})))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Admin(admin): Admin,
    payload: Result<Json<CommissionUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(update) = payload?;

    let rate = call(&state.channels.settings, "Settings", |response| {
        SettingsRequest::UpdateCommissionRate {
            rate: update.referral_commission,
            response,
        }
    })
    .await?;
    log::info!("Admin {} updated the referral commission.", admin.id);

    Ok(Json(json!({"referralCommission": rate})))
}

pub async fn set_blocked(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(id): Path<String>,
    payload: Result<Json<BlockedUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(update) = payload?;

    let user = call(&state.channels.users, "Users", |response| {
        UserRequest::SetBlocked {
            id,
            blocked: update.blocked,
            response,
        }
    })
    .await?;

    Ok(Json(json!({"success": true, "blocked": user.blocked})))
}

pub async fn set_verified(
    State(state): State<AppState>,
    Admin(_): Admin,
    Path(id): Path<String>,
    payload: Result<Json<VerifiedUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(update) = payload?;

    let user = call(&state.channels.users, "Users", |response| {
        UserRequest::SetVerified {
            id,
            verified: update.verified,
            response,
        }
    })
    .await?;

    Ok(Json(json!({"success": true, "verified": user.verified})))
}
