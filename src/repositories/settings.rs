use crate::models::settings::AppSetting;

use async_trait::async_trait;
use sqlx::PgPool;

use super::SettingsStore;

#[derive(Clone)]
pub struct SettingsRepository {
    conn: PgPool,
}

impl SettingsRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn get_or_create(&self, default_rate: f64) -> Result<AppSetting, anyhow::Error> {
        sqlx::query(
            "INSERT INTO app_settings (id, referral_commission) VALUES (1, $1) ON CONFLICT (id) DO NOTHING",
        )
        .bind(default_rate)
        .execute(&self.conn)
        .await?;

        let setting = sqlx::query_as::<_, AppSetting>(
            "SELECT id, referral_commission, created_at, updated_at FROM app_settings WHERE id = 1",
        )
        .fetch_one(&self.conn)
        .await?;

        Ok(setting)
    }

    async fn set_commission_rate(&self, rate: f64) -> Result<AppSetting, anyhow::Error> {
        let setting = sqlx::query_as::<_, AppSetting>(
            r#"
                INSERT INTO app_settings (id, referral_commission) VALUES (1, $1)
                ON CONFLICT (id) DO UPDATE
                SET referral_commission = EXCLUDED.referral_commission, updated_at = CURRENT_TIMESTAMP
                RETURNING id, referral_commission, created_at, updated_at
            "#,
        )
        .bind(rate)
        .fetch_one(&self.conn)
        .await?;

        Ok(setting)
    }
}
