use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use app::config::Config;
use app::{AppState, router};
use services::{AppServices, Clock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,app=debug,services=debug")),
        )
        .init();

    let config = Config::parse();
    let settings = config.engine_settings();
    let policy = config.admin_policy();
    if policy.is_empty() {
        tracing::warn!("no admin emails configured; only admin-role users can author surveys");
    }

    let db_url = config.database_url();
    let services =
        AppServices::new_sqlite(&db_url, Clock::System, settings, Arc::new(policy)).await?;

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, db = %db_url, ?settings, "listening");
    axum::serve(listener, router(AppState::new(services))).await?;
    Ok(())
}
