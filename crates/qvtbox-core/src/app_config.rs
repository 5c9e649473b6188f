use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Public origin the storefront is reachable on; checkout return URLs
    /// are built on it. No trailing slash.
    pub public_base_url: String,
    pub catalog_path: PathBuf,
    /// Payment provider base URL override; the client's default applies
    /// when unset.
    pub checkout_base_url: Option<String>,
    /// Unset means checkout is disabled (the server still boots).
    pub checkout_api_key: Option<String>,
    pub checkout_timeout_secs: u64,
    pub checkout_max_retries: u32,
    pub cart_ttl_minutes: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("public_base_url", &self.public_base_url)
            .field("catalog_path", &self.catalog_path)
            .field("database_url", &"[redacted]")
            .field("checkout_base_url", &self.checkout_base_url)
            .field(
                "checkout_api_key",
                &self.checkout_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("checkout_timeout_secs", &self.checkout_timeout_secs)
            .field("checkout_max_retries", &self.checkout_max_retries)
            .field("cart_ttl_minutes", &self.cart_ttl_minutes)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
