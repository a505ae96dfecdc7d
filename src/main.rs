use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use emberlog::config::Config;
use emberlog::routes::build_router;
use emberlog::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("emberlog=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let address = config.server_address();

    let state = AppState::new(config).await?;
    let app = build_router(state);

    tracing::info!("emberlog listening on http://{}", address);
    let listener = TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
