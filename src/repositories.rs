use async_trait::async_trait;

use crate::models::{
    orders::{NewOrder, Order, OrderFilter, OrderStatus},
    settings::AppSetting,
    users::{NewUser, User},
};

pub mod memory;
pub mod orders;
pub mod settings;
pub mod users;

pub use self::memory::MemoryStore;
pub use self::orders::OrderRepository;
pub use self::settings::SettingsRepository;
pub use self::users::UserRepository;

/// A write rejected by a uniqueness constraint. Stores return it inside the
/// `anyhow::Error` so services can tell it apart from outages.
#[derive(Debug, thiserror::Error)]
#[error("duplicate key value violates unique constraint {0}")]
pub struct DuplicateKey(pub String);

impl DuplicateKey {
    pub fn is(error: &anyhow::Error) -> bool {
        error.downcast_ref::<DuplicateKey>().is_some()
    }
}

/// Turns a Postgres unique violation into `DuplicateKey`.
pub(crate) fn map_unique_violation(error: sqlx::Error) -> anyhow::Error {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DuplicateKey(db.constraint().unwrap_or("unknown").to_string()).into()
        }
        _ => error.into(),
    }
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn create(&self, user: NewUser) -> Result<User, anyhow::Error>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error>;

    async fn find_by_phone_number(&self, phone_number: &str)
        -> Result<Option<User>, anyhow::Error>;

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error>;

    /// Users whose `referred_by_code` equals `code`, in insertion order.
    async fn list_referred_by(&self, code: &str) -> Result<Vec<User>, anyhow::Error>;

    async fn set_blocked(&self, id: &str, blocked: bool) -> Result<Option<User>, anyhow::Error>;

    async fn set_verified(&self, id: &str, verified: bool)
        -> Result<Option<User>, anyhow::Error>;
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    async fn create(&self, order: NewOrder) -> Result<Order, anyhow::Error>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, anyhow::Error>;

    /// Newest first. Returns the requested page and the total number of matches.
    async fn find(
        &self,
        filter: &OrderFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64), anyhow::Error>;

    async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Option<Order>, anyhow::Error>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// Reads the singleton, inserting it with `default_rate` when absent.
    async fn get_or_create(&self, default_rate: f64) -> Result<AppSetting, anyhow::Error>;

    async fn set_commission_rate(&self, rate: f64) -> Result<AppSetting, anyhow::Error>;
}
