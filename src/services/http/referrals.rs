use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, Caller};
use crate::services::{call, referrals::ReferralRequest, ServiceError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralCodeQuery {
    referral_code: Option<String>,
}

impl ReferralCodeQuery {
    fn required(self) -> Result<String, ServiceError> {
        self.referral_code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ServiceError::Validation("Referral code is required".to_string()))
    }
}

pub async fn list_referred_by(
    State(state): State<AppState>,
    query: Result<Query<ReferralCodeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Query(query) = query?;
    let code = query.required()?;

    let users = call(&state.channels.referrals, "Referrals", |response| {
        ReferralRequest::ListReferredBy { code, response }
    })
    .await?;

    Ok(Json(json!({"success": true, "users": users})))
}

/// Checkout-time validation of a code typed by the buyer.
pub async fn check_code(
    State(state): State<AppState>,
    payload: Result<Json<ReferralCodeQuery>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;
    let code = body.referral_code.unwrap_or_default();

    call(&state.channels.referrals, "Referrals", |response| {
        ReferralRequest::ResolveOwner { code, response }
    })
    .await?;

    Ok(Json(json!({"success": true, "message": "Referral Code Found"})))
}

pub async fn tree_root(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let root = call(&state.channels.referrals, "Referrals", |response| {
        ReferralRequest::TreeRoot {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(root))
}

pub async fn tree_children(
    State(state): State<AppState>,
    query: Result<Query<ReferralCodeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Query(query) = query?;
    let code = query.required()?;

    let children = call(&state.channels.referrals, "Referrals", |response| {
        ReferralRequest::TreeChildren { code, response }
    })
    .await?;

    Ok(Json(json!({"success": true, "children": children})))
}
