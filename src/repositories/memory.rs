//! In-process stores with the same contracts as the Postgres repositories.
//! Used by the test suites and for running the service without a database.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DuplicateKey, OrderStore, SettingsStore, UserStore};
use crate::models::{
    orders::{NewOrder, Order, OrderFilter, OrderStatus},
    settings::AppSetting,
    users::{NewUser, User},
};

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<Vec<User>>>,
    orders: Arc<RwLock<Vec<Order>>>,
    settings: Arc<RwLock<Option<AppSetting>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    async fn update_user<F>(&self, id: &str, apply: F) -> Result<Option<User>, anyhow::Error>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|user| user.id == id).map(|user| {
            apply(user);
            user.updated_at = now();
            user.clone()
        }))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, anyhow::Error> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.phone_number == user.phone_number) {
            return Err(DuplicateKey("users_phone_number_key".to_string()).into());
        }
        if users.iter().any(|u| u.referral_code == user.referral_code) {
            return Err(DuplicateKey("users_referral_code_key".to_string()).into());
        }

        let timestamp = now();
        let user = User {
            id: Uuid::new_v4().hyphenated().to_string(),
            name: user.name,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            referral_code: user.referral_code,
            referred_by_code: user.referred_by_code,
            role: user.role,
            verified: user.verified,
            blocked: false,
            created_at: timestamp,
            updated_at: timestamp,
        };
        users.push(user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_phone_number(
        &self,
        phone_number: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.phone_number == phone_number).cloned())
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.referral_code == code).cloned())
    }

    async fn list_referred_by(&self, code: &str) -> Result<Vec<User>, anyhow::Error> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| u.referred_by_code.as_deref() == Some(code))
            .cloned()
            .collect())
    }

    async fn set_blocked(&self, id: &str, blocked: bool) -> Result<Option<User>, anyhow::Error> {
        self.update_user(id, |user| user.blocked = blocked).await
    }

    async fn set_verified(
        &self,
        id: &str,
        verified: bool,
    ) -> Result<Option<User>, anyhow::Error> {
        self.update_user(id, |user| user.verified = verified).await
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, order: NewOrder) -> Result<Order, anyhow::Error> {
        let timestamp = now();
        let order = Order {
            id: Uuid::new_v4().hyphenated().to_string(),
            user_id: order.user_id,
            buyer: order.buyer,
            product_id: order.product_id,
            product_name: order.product_name,
            transaction_id: order.transaction_id,
            quantity: order.quantity,
            unit_price_cents: order.unit_price_cents,
            total_price_cents: order.total_price_cents,
            referral_code: order.referral_code,
            commission_cents: order.commission_cents,
            commission_rate: order.commission_rate,
            status: OrderStatus::Pending,
            receipt_url: order.receipt_url,
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.orders.write().await.push(order.clone());

        Ok(order)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, anyhow::Error> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find(
        &self,
        filter: &OrderFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), anyhow::Error> {
        let orders = self.orders.read().await;
        let matching: Vec<&Order> = orders
            .iter()
            .rev()
            .filter(|order| match filter {
                OrderFilter::Bought { user_id } => &order.user_id == user_id,
                OrderFilter::Reference { referral_code } => {
                    order.referral_code.as_ref() == Some(referral_code)
                }
            })
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>, anyhow::Error> {
        let mut orders = self.orders.write().await;
        Ok(orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.updated_at = now();
            order.clone()
        }))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_or_create(&self, default_rate: f64) -> Result<AppSetting, anyhow::Error> {
        let mut settings = self.settings.write().await;
        let setting = settings.get_or_insert_with(|| {
            let timestamp = now();
            AppSetting {
                id: 1,
                referral_commission: default_rate,
                created_at: timestamp,
                updated_at: timestamp,
            }
        });

        Ok(setting.clone())
    }

    async fn set_commission_rate(&self, rate: f64) -> Result<AppSetting, anyhow::Error> {
        let mut settings = self.settings.write().await;
        let timestamp = now();
        let setting = settings.get_or_insert_with(|| AppSetting {
            id: 1,
            referral_commission: rate,
            created_at: timestamp,
            updated_at: timestamp,
        });
        setting.referral_commission = rate;
        setting.updated_at = timestamp;

        Ok(setting.clone())
    }
}
