use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Signing secrets for the two token classes.
///
/// Access and refresh tokens are signed with distinct secrets so that a
/// compromise of one cannot forge the other.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
}

/// Credentials and endpoints for one upstream identity provider.
///
/// The endpoint URLs default to the provider's public endpoints; overriding
/// them is mainly useful for pointing the adapter at a test double.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub userinfo_url: Option<String>,
    /// GitHub only: the `/user/emails` endpoint.
    #[serde(default)]
    pub emails_url: Option<String>,
}

/// Providers are individually optional; a login attempt against an
/// unconfigured provider is rejected at request time.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProvidersConfig {
    pub google: Option<ProviderConfig>,
    pub github: Option<ProviderConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub tokens: TokenConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variable override convention: any var matching the key path
/// separated by double underscores (e.g. `TOKENS__ACCESS_SECRET`) overrides
/// the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how
/// to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.tokens.access_secret.len() < 32 {
        return Err(ConfigError::Validation(
            "tokens.access_secret must be at least 32 characters".into(),
        ));
    }
    if app.tokens.refresh_secret.len() < 32 {
        return Err(ConfigError::Validation(
            "tokens.refresh_secret must be at least 32 characters".into(),
        ));
    }
    if app.tokens.access_secret == app.tokens.refresh_secret {
        return Err(ConfigError::Validation(
            "tokens.access_secret and tokens.refresh_secret must differ".into(),
        ));
    }
    Ok(())
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
