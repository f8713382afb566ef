use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    pub url: String,
    /// No token means the Hub is unconfigured: email becomes log-only,
    /// AI endpoints answer 503.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub hub: HubConfig,
    pub disable_dev_login: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "orghub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "orghub-users".into()),
            ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
        };
        let hub = HubConfig {
            url: std::env::var("HUB_URL").unwrap_or_else(|_| "https://hub.invalid/api".into()),
            token: std::env::var("HUB_TOKEN").ok().filter(|t| !t.is_empty()),
        };
        let disable_dev_login = std::env::var("DISABLE_DEV_LOGIN")
            .map(|v| v == "true")
            .unwrap_or(false);
        Ok(Self {
            database_url,
            jwt,
            hub,
            disable_dev_login,
        })
    }
}
