use gatehouse::AppResources;
use gatehouse::api::start_webserver;
use gatehouse::auth::session::{RedisSessionStore, SessionStore};
use gatehouse::auth::tokens::TokenKeys;
use gatehouse::config::load_config_or_panic;
use gatehouse::providers::ProviderRegistry;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "gatehouse=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    dotenvy::dotenv().ok();

    initialize_tracing();

    let config = Arc::new(load_config_or_panic());

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    let sessions: Arc<dyn SessionStore> = Arc::new(
        RedisSessionStore::connect(&config.redis_url)
            .await
            .expect("Failed to connect to Redis"),
    );

    let keys = Arc::new(TokenKeys::new(&config.tokens));
    let providers = Arc::new(ProviderRegistry::from_config(&config.providers));

    let resources = AppResources {
        db,
        sessions,
        keys,
        providers,
        config,
    };

    start_webserver(resources).await?;
    Ok(())
}
