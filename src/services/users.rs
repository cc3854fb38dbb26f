use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{auth, referrals::ReferralRegistry, RequestHandler, Service, ServiceError};
use crate::{
    models::users::{self, Role},
    repositories::{DuplicateKey, UserStore},
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const BLOCKED: &str = "Your account is blocked by admin.";

pub enum UserRequest {
    SignUp {
        request: users::SignUp,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    SignIn {
        request: users::SignIn,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    GetUser {
        id: String,
        response: oneshot::Sender<Result<Option<users::User>, ServiceError>>,
    },
    SetBlocked {
        id: String,
        blocked: bool,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    SetVerified {
        id: String,
        verified: bool,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: Arc<dyn UserStore>,
    registry: ReferralRegistry,
}

impl UserRequestHandler {
    pub fn new(repository: Arc<dyn UserStore>, registry: ReferralRegistry) -> Self {
        UserRequestHandler {
            repository,
            registry,
        }
    }

    async fn sign_up(&self, request: users::SignUp) -> Result<users::User, ServiceError> {
        let phone_number = request.phone_number.trim();
        let name = non_blank(request.name.as_deref());
        if name.is_none() || phone_number.is_empty() || request.password.is_empty() {
            return Err(ServiceError::Validation(
                "Please fill All Required Fields".to_string(),
            ));
        }

        let existing = self
            .repository
            .find_by_phone_number(phone_number)
            .await
            .map_err(|e| ServiceError::Repository("Users".to_string(), e.to_string()))?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "User with this phone already exists".to_string(),
            ));
        }

        let referred_by_code = match non_blank(request.referred_by_code.as_deref()) {
            Some(code) => Some(self.registry.resolve_owner(code).await?.referral_code),
            None => None,
        };
        let referral_code = self.registry.register(phone_number).await?;
        let password_hash = auth::hash_password_blocking(request.password).await?;

        let user = self
            .repository
            .create(users::NewUser {
                name: name.map(str::to_string),
                phone_number: phone_number.to_string(),
                password_hash,
                referral_code,
                referred_by_code,
                role: Role::User,
                verified: true,
            })
            .await
            .map_err(|e| {
                // Lost a race with a concurrent signup for the same number.
                if DuplicateKey::is(&e) {
                    ServiceError::Conflict("User with this phone already exists".to_string())
                } else {
                    ServiceError::Repository("Users".to_string(), e.to_string())
                }
            })?;

        log::info!(
            "Created user {} (referred by {:?}).",
            user.id,
            user.referred_by_code
        );
        Ok(user)
    }

    async fn sign_in(&self, request: users::SignIn) -> Result<users::User, ServiceError> {
        let phone_number = request.phone_number.trim();
        if phone_number.is_empty() || request.password.is_empty() {
            return Err(ServiceError::Validation(
                "Phone and password are required".to_string(),
            ));
        }

        let user = self
            .repository
            .find_by_phone_number(phone_number)
            .await
            .map_err(|e| ServiceError::Repository("Users".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let matches =
            auth::verify_password_blocking(user.password_hash.clone(), request.password).await?;
        if !matches {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        if !user.verified {
            return Err(ServiceError::Forbidden(
                "Please verify your account before logging in".to_string(),
            ));
        }
        if user.blocked {
            return Err(ServiceError::Forbidden(BLOCKED.to_string()));
        }

        Ok(user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<users::User>, ServiceError> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(|e| ServiceError::Repository("Users".to_string(), e.to_string()))
    }

    async fn set_blocked(&self, id: &str, blocked: bool) -> Result<users::User, ServiceError> {
        self.repository
            .set_blocked(id, blocked)
            .await
            .map_err(|e| ServiceError::Repository("Users".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {id}")))
    }

    async fn set_verified(&self, id: &str, verified: bool) -> Result<users::User, ServiceError> {
        self.repository
            .set_verified(id, verified)
            .await
            .map_err(|e| ServiceError::Repository("Users".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {id}")))
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::SignUp { request, response } => {
                let user = self.sign_up(request).await;
                let _ = response.send(user);
            }
            UserRequest::SignIn { request, response } => {
                let user = self.sign_in(request).await;
                let _ = response.send(user);
            }
            UserRequest::GetUser { id, response } => {
                let user = self.get_user(&id).await;
                let _ = response.send(user);
            }
            UserRequest::SetBlocked {
                id,
                blocked,
                response,
            } => {
                let result = self.set_blocked(&id, blocked).await;
                let _ = response.send(result);
            }
            UserRequest::SetVerified {
                id,
                verified,
                response,
            } => {
                let result = self.set_verified(&id, verified).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
