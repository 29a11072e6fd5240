use crate::api::RadarClient;
use crate::dashboard::{Dashboard, PollOutcome};
use crate::error::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub type SharedDashboard = Arc<RwLock<Dashboard>>;

/// How often faded rows and the toast are checked between polls.
const TICK: Duration = Duration::from_millis(100);

/// One-off startup reads. Failures leave the defaults in place.
pub async fn bootstrap(radar: &RadarClient, dashboard: &SharedDashboard) {
    match radar.vendors().await {
        Ok(vendors) => dashboard.write().await.set_vendors(vendors),
        Err(err) => tracing::warn!("Unable to load vendor table: {err}"),
    }
    refresh_surveillance(radar, dashboard).await;
    match radar.alerts().await {
        Ok(macs) => {
            if !macs.is_empty() {
                tracing::info!("Radar reports {} already alerted devices", macs.len());
            }
            dashboard.write().await.seed_alerts(macs);
        }
        Err(err) => tracing::debug!("No alert list from radar: {err}"),
    }
}

pub async fn refresh_surveillance(radar: &RadarClient, dashboard: &SharedDashboard) {
    match radar.surveillance().await {
        Ok(active) => dashboard.write().await.set_surveillance(active),
        Err(err) => tracing::warn!("Unable to read surveillance state: {err}"),
    }
}

/// Fetch whitelist and devices in parallel and fold them into the dashboard.
pub async fn poll_once(
    radar: &RadarClient,
    dashboard: &SharedDashboard,
    notifier: &broadcast::Sender<()>,
) -> Result<PollOutcome> {
    let (whitelist, devices) = tokio::join!(radar.whitelist(), radar.devices());
    let (whitelist, devices) = (whitelist?, devices?);
    let outcome = dashboard
        .write()
        .await
        .apply_poll(whitelist, devices, Instant::now(), unix_now());
    if outcome.changed() {
        let _ = notifier.send(());
    }
    Ok(outcome)
}

pub fn spawn_poller(
    radar: RadarClient,
    dashboard: SharedDashboard,
    notifier: broadcast::Sender<()>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match poll_once(&radar, &dashboard, &notifier).await {
                Ok(outcome) => {
                    for mac in &outcome.alerted {
                        tracing::warn!("New device while armed: {mac}");
                    }
                }
                Err(err) if err.is_busy() => tracing::debug!("Skipping poll: {err}"),
                Err(err) => tracing::warn!("Poll failed: {err}"),
            }
        }
    })
}

pub fn spawn_ticker(dashboard: SharedDashboard, notifier: broadcast::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if dashboard.write().await.tick(Instant::now()) {
                let _ = notifier.send(());
            }
        }
    })
}

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
