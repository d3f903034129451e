use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        10
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Jwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// HS256 signing secret, required in `jwt` mode
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim, unchecked when absent
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default = "AuthConfig::default_leeway_secs")]
    pub leeway_secs: u64,
}

impl AuthConfig {
    const fn default_leeway_secs() -> u64 {
        60
    }

    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::None,
            jwt_secret: None,
            issuer: None,
            leeway_secs: Self::default_leeway_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of cached dashboard counters
    pub dashboard_ttl_secs: u64,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dashboard_ttl_secs: 300,
            max_entries: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    None,
    /// Trust `CF-Connecting-IP`
    Cloudflare,
    /// Trust `Forwarded` / `X-Forwarded-For` with chain validation
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub ip_anonymization: bool,
    pub trusted_proxy_mode: TrustedProxyMode,
    /// CIDR ranges or single addresses of trusted proxies
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// Number of proxies in front of the service, counted from the right
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ip_anonymization: false,
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
        }
    }
}

impl Config {
    /// Load configuration from `APP__`-prefixed environment variables,
    /// e.g. `APP__DATABASE__URL` or `APP__AUTH__MODE`. A `.env` file is
    /// read first when present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = ::config::Config::builder()
            .set_default("database.backend", "sqlite")?
            .set_default("database.url", "sqlite://./stationery.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("api_server.host", "127.0.0.1")?
            .set_default("api_server.port", 8080)?
            .set_default("auth.mode", "none")?
            .set_default("auth.leeway_secs", 60)?
            .set_default("cache.dashboard_ttl_secs", 300)?
            .set_default("cache.max_entries", 1_000)?
            .set_default("analytics.ip_anonymization", false)?
            .set_default("analytics.trusted_proxy_mode", "none")?
            .add_source(
                ::config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("analytics.trusted_proxies"),
            )
            .build()
            .context("failed to read configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.mode == AuthMode::Jwt {
            let secret = self
                .auth
                .jwt_secret
                .as_deref()
                .context("APP__AUTH__JWT_SECRET must be set when APP__AUTH__MODE=jwt")?;
            anyhow::ensure!(!secret.is_empty(), "APP__AUTH__JWT_SECRET must not be empty");
        }

        if self.database.max_connections == 0 {
            tracing::warn!("database.max_connections is 0, the pool will never hand out connections");
        }

        Ok(())
    }
}
