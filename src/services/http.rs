use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::{call, tokens::TokenIssuer, users::UserRequest, ServiceChannels, ServiceError};
use crate::models::users;

mod admin;
mod auth;
mod orders;
mod referrals;

const LOGIN_FIRST: &str = "User not found, Login first!";

#[derive(Clone)]
pub struct AppState {
    pub channels: ServiceChannels,
    pub tokens: Arc<TokenIssuer>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Repository(..) | ServiceError::Communication(..) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("{self}");
        }

        (
            status,
            Json(json!({"success": false, "message": self.message()})),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

/// The signed-in user, resolved from the bearer token issued at sign in.
pub struct Caller(pub users::User);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized(LOGIN_FIRST.to_string()))?;
        let id = state.tokens.verify(token)?.sub;

        let user = call(&state.channels.users, "Users", |response| {
            UserRequest::GetUser { id, response }
        })
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(LOGIN_FIRST.to_string()))?;
        if user.blocked {
            return Err(ServiceError::Forbidden(
                "Your account is blocked by admin.".to_string(),
            ));
        }

        Ok(Caller(user))
    }
}

/// A caller holding the admin or super admin role.
pub struct Admin(pub users::User);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Caller(user) = Caller::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(ServiceError::Forbidden(
                "Admin access required".to_string(),
            ));
        }

        Ok(Admin(user))
    }
}

pub fn router(channels: ServiceChannels, tokens: TokenIssuer) -> Router {
    let app_state = AppState {
        channels,
        tokens: Arc::new(tokens),
    };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        .route("/referrals", get(referrals::list_referred_by))
        .route("/referral-check", post(referrals::check_code))
        .route("/referral-tree/root", get(referrals::tree_root))
        .route("/referral-tree/children", get(referrals::tree_children))
        .route("/orders", post(orders::place_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/admin/orders/{id}/status", put(admin::update_order_status))
        .route(
            "/admin/settings",
            get(admin::get_settings).post(admin::update_settings),
        )
        .route("/admin/users/{id}/blocked", put(admin::set_blocked))
        .route("/admin/users/{id}/verified", put(admin::set_verified))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    channels: ServiceChannels,
    tokens: TokenIssuer,
    listen: &str,
) -> Result<(), anyhow::Error> {
    let app = router(channels, tokens);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
