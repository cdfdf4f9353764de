/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // API server
    pub api_port: u16,

    // Monitor sessions
    pub poll_interval_secs: u64,
    pub record_retry_attempts: u32,
    pub record_retry_delay_secs: u64,
    /// Sessions older than this are expired; `None` means sessions run
    /// until they close or are cancelled.
    pub max_session_lifetime_secs: Option<u64>,

    // Simulated price feed
    pub feed_base_price: f64,
    pub feed_jitter: f64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            database_url: required_env("DATABASE_URL"),
            api_port: optional_env("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            poll_interval_secs: optional_env("POLL_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            record_retry_attempts: optional_env("RECORD_RETRY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            record_retry_delay_secs: optional_env("RECORD_RETRY_DELAY_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            max_session_lifetime_secs: optional_env("MAX_SESSION_LIFETIME_SECS")
                .and_then(|v| v.parse().ok()),
            feed_base_price: optional_env("FEED_BASE_PRICE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000.0),
            feed_jitter: optional_env("FEED_JITTER")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
