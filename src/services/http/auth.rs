use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::AppState;
use crate::{
    models::users,
    services::{call, users::UserRequest, ServiceError},
};

pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<users::SignUp>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(request) = payload?;

    let user = call(&state.channels.users, "Users", |response| {
        UserRequest::SignUp { request, response }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "userId": user.id,
        })),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<users::SignIn>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(request) = payload?;

    let user = call(&state.channels.users, "Users", |response| {
        UserRequest::SignIn { request, response }
    })
    .await?;
    let token = state.tokens.issue(&user)?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": user,
    })))
}
