mod alerts;
mod api;
mod config;
mod dashboard;
mod decode;
mod devices;
mod error;
mod poller;
mod reconcile;
mod ui;
mod view;
mod web;

use crate::api::RadarClient;
use crate::config::AppConfig;
use crate::dashboard::Dashboard;
use crate::web::AppState;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::from_env());

    tracing::info!(
        "Starting radar console on {} (radar: {})",
        config.http_bind,
        config.radar_url
    );

    let radar = RadarClient::new(&config.radar_url, config.http_timeout)?;
    let dashboard = Arc::new(RwLock::new(Dashboard::new(&config)));
    let (notifier, _) = broadcast::channel(16);

    poller::bootstrap(&radar, &dashboard).await;

    let poll_task = poller::spawn_poller(
        radar.clone(),
        Arc::clone(&dashboard),
        notifier.clone(),
        config.poll_interval,
    );
    let tick_task = poller::spawn_ticker(Arc::clone(&dashboard), notifier.clone());

    let state = AppState {
        config: config.clone(),
        radar,
        dashboard,
        notifier,
    };

    web::serve(state).await?;

    poll_task.abort();
    tick_task.abort();
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}
