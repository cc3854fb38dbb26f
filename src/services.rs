use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::repositories::{OrderStore, SettingsStore, UserStore};

pub mod auth;
pub mod commission;
pub mod http;
pub mod orders;
pub mod referral_tree;
pub mod referrals;
pub mod settings;
pub mod tokens;
pub mod users;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Database and channel failures; the caller may retry explicitly.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Repository(..) | ServiceError::Communication(..)
        )
    }

    /// The user-facing part of the error, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            ServiceError::Validation(m)
            | ServiceError::NotFound(m)
            | ServiceError::Conflict(m)
            | ServiceError::Unauthorized(m)
            | ServiceError::Forbidden(m) => m.clone(),
            ServiceError::Repository(..) | ServiceError::Communication(..) => {
                "Service temporarily unavailable, please retry.".to_string()
            }
            ServiceError::Internal(_) => "Something went wrong".to_string(),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Sends a request built around a fresh oneshot sender and waits for the reply.
pub async fn call<R, T, F>(
    channel: &mpsc::Sender<R>,
    service: &str,
    build: F,
) -> Result<T, ServiceError>
where
    R: Send + 'static,
    F: FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
{
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
    pub settings: Arc<dyn SettingsStore>,
}

#[derive(Clone)]
pub struct ServiceChannels {
    pub users: mpsc::Sender<users::UserRequest>,
    pub referrals: mpsc::Sender<referrals::ReferralRequest>,
    pub orders: mpsc::Sender<orders::OrderRequest>,
    pub settings: mpsc::Sender<settings::SettingsRequest>,
}

pub fn start_services(stores: Stores, default_commission_percent: f64) -> ServiceChannels {
    let (user_tx, mut user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (referral_tx, mut referral_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (order_tx, mut order_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (settings_tx, mut settings_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let registry = referrals::ReferralRegistry::new(stores.users.clone());

    log::info!("Starting user service.");
    let user_handler = users::UserRequestHandler::new(stores.users.clone(), registry.clone());
    tokio::spawn(async move {
        users::UserService::new()
            .run(user_handler, &mut user_rx)
            .await;
    });

    log::info!("Starting referral service.");
    let referral_handler = referrals::ReferralRequestHandler::new(registry, stores.users);
    tokio::spawn(async move {
        referrals::ReferralService::new()
            .run(referral_handler, &mut referral_rx)
            .await;
    });

    log::info!("Starting settings service.");
    let settings_handler =
        settings::SettingsRequestHandler::new(stores.settings, default_commission_percent);
    tokio::spawn(async move {
        settings::SettingsService::new()
            .run(settings_handler, &mut settings_rx)
            .await;
    });

    log::info!("Starting order service.");
    let order_handler = orders::OrderRequestHandler::new(
        stores.orders,
        user_tx.clone(),
        referral_tx.clone(),
        settings_tx.clone(),
    );
    tokio::spawn(async move {
        orders::OrderService::new()
            .run(order_handler, &mut order_rx)
            .await;
    });

    ServiceChannels {
        users: user_tx,
        referrals: referral_tx,
        orders: order_tx,
        settings: settings_tx,
    }
}
