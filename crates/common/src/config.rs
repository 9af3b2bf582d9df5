use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string. When unset, realtime notices stay in-process.
    pub redis_url: Option<String>,

    /// Port the API server binds to (default: 3000)
    pub api_port: u16,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Recipients dispatched concurrently per broadcast batch (default: 100)
    pub broadcast_batch_size: usize,

    /// Pause between broadcast batches in milliseconds (default: 1000)
    pub broadcast_batch_cooldown_ms: u64,

    /// Upper bound on a single channel send in milliseconds (default: 10000)
    pub channel_timeout_ms: u64,

    /// Emergency phone line quoted in SMS and email bodies (default: "108")
    pub emergency_line: String,

    /// Push gateway endpoint (FCM-compatible HTTP v1 send URL)
    pub push_gateway_url: Option<String>,

    /// Push gateway bearer credential
    pub push_server_key: Option<String>,

    /// Twilio account SID for SMS delivery
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token
    pub twilio_auth_token: Option<String>,

    /// Twilio sender phone number
    pub twilio_from_number: Option<String>,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL").ok(),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            broadcast_batch_size: std::env::var("BROADCAST_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BROADCAST_BATCH_SIZE must be a valid usize"))?,
            broadcast_batch_cooldown_ms: std::env::var("BROADCAST_BATCH_COOLDOWN_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BROADCAST_BATCH_COOLDOWN_MS must be a valid u64"))?,
            channel_timeout_ms: std::env::var("CHANNEL_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CHANNEL_TIMEOUT_MS must be a valid u64"))?,
            emergency_line: std::env::var("EMERGENCY_LINE").unwrap_or_else(|_| "108".to_string()),
            push_gateway_url: std::env::var("PUSH_GATEWAY_URL").ok(),
            push_server_key: std::env::var("PUSH_SERVER_KEY").ok(),
            twilio_account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok(),
            twilio_auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok(),
            twilio_from_number: std::env::var("TWILIO_FROM_NUMBER").ok(),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would disable batching or leave sends unbounded.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broadcast_batch_size == 0 {
            anyhow::bail!("BROADCAST_BATCH_SIZE must be greater than zero");
        }
        if self.channel_timeout_ms == 0 {
            anyhow::bail!("CHANNEL_TIMEOUT_MS must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_string(),
            redis_url: None,
            api_port: 3000,
            db_max_connections: 5,
            broadcast_batch_size: 100,
            broadcast_batch_cooldown_ms: 1000,
            channel_timeout_ms: 10_000,
            emergency_line: "108".to_string(),
            push_gateway_url: None,
            push_server_key: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            resend_api_key: None,
            email_from: None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = AppConfig {
            broadcast_batch_size: 0,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_channel_timeout_rejected() {
        let config = AppConfig {
            channel_timeout_ms: 0,
            ..base_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CHANNEL_TIMEOUT_MS"));
    }
}
