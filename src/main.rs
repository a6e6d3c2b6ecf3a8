//! Storefront - retail shop backend

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::StorefrontConfig;
use storefront::notify::{NatsSink, Notifier};
use storefront::services::Services;
use storefront::store::{DynStore, MemoryStore, PgStore};
use storefront::{api, seed};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StorefrontConfig::from_env()?;

    let store: DynStore = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            tracing::info!("using PostgreSQL store");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data lives in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier = match &config.nats_url {
        Some(url) => match NatsSink::connect(url, "storefront").await {
            Ok(sink) => Notifier::new(Arc::new(sink)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order notifications go to the log");
                Notifier::log_only()
            }
        },
        None => Notifier::log_only(),
    };

    if config.session_secret.is_none() {
        tracing::warn!("JWT_SECRET not set, sessions are signed with a per-process key and end on restart");
    }
    let services = Services::new(store, notifier, config.checkout(), config.low_stock_threshold, config.session_tokens());
    if config.seed_demo_data {
        seed::seed_demo_data(&services).await?;
    }
    if let Some(admin) = &config.admin {
        seed::bootstrap_admin(&services, admin).await?;
    }

    let app = api::router(services);
    let addr = config.addr();
    tracing::info!("storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
