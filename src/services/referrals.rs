use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{call, referral_tree::ReferralSource, RequestHandler, Service, ServiceError};
use crate::{
    models::{referrals::ReferralNode, users::UserSummary},
    repositories::UserStore,
};

pub const REFERRAL_CODE_NOT_FOUND: &str = "Referral Code Not Found";

const MAX_CODE_LENGTH: usize = 64;

/// Canonical form of a phone number or referral code: separators stripped.
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn is_well_formed(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LENGTH
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
}

/// Maps referral codes to their owners and to the users they referred.
#[derive(Clone)]
pub struct ReferralRegistry {
    users: Arc<dyn UserStore>,
}

impl ReferralRegistry {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Assigns the code for a user signing up with `phone_number`.
    pub async fn register(&self, phone_number: &str) -> Result<String, ServiceError> {
        let code = normalize_code(phone_number);
        if !is_well_formed(&code) {
            return Err(ServiceError::Validation(format!(
                "Cannot derive a referral code from phone number {phone_number:?}"
            )));
        }

        let taken = self
            .users
            .find_by_referral_code(&code)
            .await
            .map_err(|e| ServiceError::Repository("Referrals".to_string(), e.to_string()))?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(
                "User with this phone already exists".to_string(),
            ));
        }

        Ok(code)
    }

    pub async fn resolve_owner(&self, code: &str) -> Result<UserSummary, ServiceError> {
        let code = normalize_code(code);
        if !is_well_formed(&code) {
            return Err(ServiceError::NotFound(REFERRAL_CODE_NOT_FOUND.to_string()));
        }

        self.users
            .find_by_referral_code(&code)
            .await
            .map_err(|e| ServiceError::Repository("Referrals".to_string(), e.to_string()))?
            .map(UserSummary::from)
            .ok_or_else(|| ServiceError::NotFound(REFERRAL_CODE_NOT_FOUND.to_string()))
    }

    pub async fn list_referred_by(&self, code: &str) -> Result<Vec<UserSummary>, ServiceError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(ServiceError::Validation(
                "Referral code is required".to_string(),
            ));
        }

        let referred = self
            .users
            .list_referred_by(&code)
            .await
            .map_err(|e| ServiceError::Repository("Referrals".to_string(), e.to_string()))?;

        Ok(referred.into_iter().map(UserSummary::from).collect())
    }
}

#[async_trait]
impl ReferralSource for ReferralRegistry {
    async fn referred_by(&self, code: &str) -> Result<Vec<UserSummary>, ServiceError> {
        self.list_referred_by(code).await
    }
}

pub enum ReferralRequest {
    ResolveOwner {
        code: String,
        response: oneshot::Sender<Result<UserSummary, ServiceError>>,
    },
    ListReferredBy {
        code: String,
        response: oneshot::Sender<Result<Vec<UserSummary>, ServiceError>>,
    },
    TreeRoot {
        user_id: String,
        response: oneshot::Sender<Result<ReferralNode, ServiceError>>,
    },
    TreeChildren {
        code: String,
        response: oneshot::Sender<Result<Vec<ReferralNode>, ServiceError>>,
    },
}

#[async_trait]
impl ReferralSource for mpsc::Sender<ReferralRequest> {
    async fn referred_by(&self, code: &str) -> Result<Vec<UserSummary>, ServiceError> {
        let code = code.to_string();
        call(self, "Referrals", |response| ReferralRequest::ListReferredBy {
            code,
            response,
        })
        .await
    }
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    registry: ReferralRegistry,
    users: Arc<dyn UserStore>,
}

impl ReferralRequestHandler {
    pub fn new(registry: ReferralRegistry, users: Arc<dyn UserStore>) -> Self {
        ReferralRequestHandler { registry, users }
    }

    async fn tree_root(&self, user_id: &str) -> Result<ReferralNode, ServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| ServiceError::Repository("Referrals".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {user_id}")))?;

        Ok(ReferralNode::unloaded(&UserSummary::from(user)))
    }

    async fn tree_children(&self, code: &str) -> Result<Vec<ReferralNode>, ServiceError> {
        let referred = self.registry.list_referred_by(code).await?;
        Ok(referred.iter().map(ReferralNode::unloaded).collect())
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::ResolveOwner { code, response } => {
                let owner = self.registry.resolve_owner(&code).await;
                let _ = response.send(owner);
            }
            ReferralRequest::ListReferredBy { code, response } => {
                let referred = self.registry.list_referred_by(&code).await;
                let _ = response.send(referred);
            }
            ReferralRequest::TreeRoot { user_id, response } => {
                let root = self.tree_root(&user_id).await;
                let _ = response.send(root);
            }
            ReferralRequest::TreeChildren { code, response } => {
                let children = self.tree_children(&code).await;
                let _ = response.send(children);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}
