use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const MIN_SECRET_LENGTH: usize = 16;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Referrals {
    /// Rate applied until an administrator stores one.
    pub default_commission_percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    /// HMAC secret for session tokens.
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub http: Http,
    pub referrals: Referrals,
    pub auth: Auth,
}

impl Settings {
    /// Loads `path` (optional) and overlays `MARKET__SECTION__KEY` variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("MARKET").separator("__"))
            .build()?;

        config.try_deserialize::<Settings>()?.validated()
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;

        config.try_deserialize::<Settings>()?.validated()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("postgres.max_connections", 5)?
            .set_default("http.listen", "0.0.0.0:8080")?
            .set_default("referrals.default_commission_percent", 10.0)?
            .set_default("auth.token_ttl_hours", 24 * 7)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let rate = self.referrals.default_commission_percent;
        if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
            return Err(ConfigError::Message(format!(
                "referrals.default_commission_percent must be between 0 and 100, got {rate}"
            )));
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Message(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        if self.postgres.max_connections == 0 {
            return Err(ConfigError::Message(
                "postgres.max_connections must be at least 1".to_string(),
            ));
        }

        Ok(self)
    }
}
