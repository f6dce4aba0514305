use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::models::entitlement::ProductTier;

/// Package identifier used when neither legacy override is present
pub const DEFAULT_PACKAGE_NAME: &str = "com.appsbyanandakumar.billing";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub google_play: GooglePlayConfig,
    #[serde(default)]
    pub entitlement: EntitlementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider that issues caller tokens
    pub jwt_secret: String,
}

#[derive(Clone, Deserialize)]
pub struct GooglePlayConfig {
    pub package_name: String,
    /// Raw Base64 blob; decoded on every verification, never cached
    #[serde(default)]
    pub service_account_base64: Option<String>,
    pub api_base: String,
    /// Fallback when the service account JSON carries no `token_uri`
    pub oauth_token_uri: String,
}

impl std::fmt::Debug for GooglePlayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GooglePlayConfig")
            .field("package_name", &self.package_name)
            .field(
                "service_account_base64",
                &self.service_account_base64.as_ref().map(|_| "<redacted>"),
            )
            .field("api_base", &self.api_base)
            .field("oauth_token_uri", &self.oauth_token_uri)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntitlementConfig {
    /// Exact product id → tier. Ids missing from this table fall back to
    /// substring matching on the product id.
    #[serde(default)]
    pub product_tiers: Vec<ProductTierEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductTierEntry {
    pub product_id: String,
    pub tier: ProductTier,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let sources = config::Config::builder()
            // config.yml is optional; deployments usually configure through the environment
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("SUBGRANT")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::resolve(sources, |key| env::var(key).ok())
    }

    /// Layer defaults under `sources` and the legacy variables over them.
    ///
    /// `ANDROID_PACKAGE_NAME` wins over `APP_PACKAGE_NAME`, which wins over
    /// any file or `SUBGRANT__*` value. Empty values count as unset.
    fn resolve<F>(sources: ConfigBuilder<DefaultState>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let package_name =
            non_empty("ANDROID_PACKAGE_NAME").or_else(|| non_empty("APP_PACKAGE_NAME"));

        sources
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("google_play.package_name", DEFAULT_PACKAGE_NAME)?
            .set_default("google_play.api_base", "https://androidpublisher.googleapis.com")?
            .set_default("google_play.oauth_token_uri", "https://oauth2.googleapis.com/token")?
            .set_override_option("google_play.package_name", package_name)?
            .set_override_option(
                "google_play.service_account_base64",
                non_empty("GPLAY_SERVICE_ACCOUNT_BASE64"),
            )?
            .build()?
            .try_deserialize()
    }
}
