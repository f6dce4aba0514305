use subgrant::{routes::create_router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,subgrant=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting subscription verification service (subgrant)");

    // Load configuration
    let config = Config::load()?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        package_name = %config.google_play.package_name,
        credentials_configured = config.google_play.service_account_base64.is_some(),
        "Loaded configuration"
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    tracing::info!("Initialized application state");

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
