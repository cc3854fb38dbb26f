use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{commission, RequestHandler, Service, ServiceError};
use crate::repositories::SettingsStore;

pub enum SettingsRequest {
    GetCommissionRate {
        response: oneshot::Sender<Result<f64, ServiceError>>,
    },
    UpdateCommissionRate {
        rate: f64,
        response: oneshot::Sender<Result<f64, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct SettingsRequestHandler {
    repository: Arc<dyn SettingsStore>,
    default_rate: f64,
}

impl SettingsRequestHandler {
    pub fn new(repository: Arc<dyn SettingsStore>, default_rate: f64) -> Self {
        SettingsRequestHandler {
            repository,
            default_rate,
        }
    }

    async fn get_commission_rate(&self) -> Result<f64, ServiceError> {
        self.repository
            .get_or_create(self.default_rate)
            .await
            .map(|setting| setting.referral_commission)
            .map_err(|e| ServiceError::Repository("Settings".to_string(), e.to_string()))
    }

    async fn update_commission_rate(&self, rate: f64) -> Result<f64, ServiceError> {
        commission::validate_rate(rate)?;
        if rate > commission::MAX_RATE_PERCENT {
            return Err(ServiceError::Validation(format!(
                "Referral commission cannot exceed {}%",
                commission::MAX_RATE_PERCENT
            )));
        }

        let setting = self
            .repository
            .set_commission_rate(rate)
            .await
            .map_err(|e| ServiceError::Repository("Settings".to_string(), e.to_string()))?;
        log::info!(
            "Referral commission set to {}%.",
            setting.referral_commission
        );

        Ok(setting.referral_commission)
    }
}

#[async_trait]
impl RequestHandler<SettingsRequest> for SettingsRequestHandler {
    async fn handle_request(&self, request: SettingsRequest) {
        match request {
            SettingsRequest::GetCommissionRate { response } => {
                let rate = self.get_commission_rate().await;
                let _ = response.send(rate);
            }
            SettingsRequest::UpdateCommissionRate { rate, response } => {
                let result = self.update_commission_rate(rate).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub fn new() -> Self {
        SettingsService {}
    }
}

#[async_trait]
impl Service<SettingsRequest, SettingsRequestHandler> for SettingsService {}
