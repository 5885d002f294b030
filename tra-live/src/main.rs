use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tra_live::cache::CachedTdxClient;
use tra_live::config::Config;
use tra_live::domain::next_midnight;
use tra_live::provider::ResourceProvider;
use tra_live::relay::{RelayState, create_router};
use tra_live::tdx::TdxClient;

/// Wait past midnight before the daily refresh, so that cache entries
/// expiring at midnight are gone.
const DAILY_REFRESH_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        api_root = %config.api_root,
        relays = config.relays.len(),
        live_interval = ?config.live_interval,
        "loaded configuration"
    );

    let client = TdxClient::new(config.tdx())?;
    let cached = Arc::new(CachedTdxClient::new(client, &config.cache()));
    let provider = Arc::new(ResourceProvider::new(Arc::clone(&cached)));

    // Refuse to start without the required data sets
    provider.fetch_init().await?;

    let daily = Arc::clone(&provider);
    tokio::spawn(async move {
        loop {
            let now = Local::now().naive_local();
            let wait = (next_midnight(now) - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait + DAILY_REFRESH_DELAY).await;
            match daily.fetch_daily().await {
                Ok(()) => info!("daily refresh complete"),
                Err(e) => warn!(error = %e, "daily refresh incomplete"),
            }
        }
    });

    let live = Arc::clone(&provider);
    let live_interval = config.live_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(live_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            if let Err(e) = live.fetch_live().await {
                warn!(error = %e, "live refresh failed");
            }
        }
    });

    let app = create_router(RelayState::new(cached, &config.api_root));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.relay_port));
    info!(%addr, "relay listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
