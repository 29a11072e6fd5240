use crate::api::RadarClient;
use crate::config::AppConfig;
use crate::dashboard::{ListView, NodeView, Snapshot, ToastView};
use crate::devices;
use crate::error::Error;
use crate::poller::{self, SharedDashboard};
use crate::reconcile::NodeId;
use crate::ui;
use crate::view::{DetectedRow, WhitelistRow};
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use axum::{
    Form, Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub radar: RadarClient,
    pub dashboard: SharedDashboard,
    /// Fires whenever the dashboard changed and views should be re-sent
    pub notifier: broadcast::Sender<()>,
}

impl AppState {
    async fn view(&self, sent: Option<&mut SentRevisions>) -> ViewMessage {
        let snapshot = self.dashboard.write().await.snapshot(Instant::now());
        ViewMessage::build(&snapshot, sent)
    }

    fn notify(&self) {
        let _ = self.notifier.send(());
    }

    /// Re-read the radar after an action so the lists settle quickly.
    async fn refresh(&self) {
        match poller::poll_once(&self.radar, &self.dashboard, &self.notifier).await {
            Ok(_) => {}
            Err(err) if err.is_busy() => tracing::debug!("Refresh skipped: {err}"),
            Err(err) => tracing::warn!("Refresh after action failed: {err}"),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/view", get(view))
        .route("/api/surveillance/toggle", post(toggle_surveillance))
        .route("/api/whitelist/add", post(whitelist_add))
        .route("/api/whitelist/remove", post(whitelist_remove))
        .route("/api/whitelist/add-all", post(whitelist_add_all))
        .route("/api/whitelist/clear", post(whitelist_clear))
        .route("/ws/view", get(ws_view))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = state.config.http_bind.parse()?;
    let router = router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Console listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown())
        .await?;

    Ok(())
}

async fn graceful_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down http server");
}

/// A row as sent to the browser: identity plus pre-rendered markup. The
/// markup is left out when this client already has the current revision.
#[derive(Serialize, Debug)]
struct NodeFragment {
    id: NodeId,
    revision: u64,
    fading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
}

#[derive(Serialize, Debug)]
struct ListMessage {
    count: usize,
    nodes: Vec<NodeFragment>,
}

/// Revisions one WebSocket client has already received, per list.
#[derive(Debug, Default)]
struct SentRevisions {
    detected: HashMap<NodeId, u64>,
    whitelist: HashMap<NodeId, u64>,
}

impl ListMessage {
    fn render<T>(
        list: &ListView<T>,
        render: fn(&NodeView<T>) -> String,
        mut sent: Option<&mut HashMap<NodeId, u64>>,
    ) -> Self {
        if let Some(sent) = sent.as_deref_mut() {
            sent.retain(|id, _| list.nodes.iter().any(|n| n.id == *id));
        }
        let nodes = list
            .nodes
            .iter()
            .map(|node| {
                let fresh = match sent.as_deref_mut() {
                    Some(sent) => sent.insert(node.id, node.revision) != Some(node.revision),
                    None => true,
                };
                NodeFragment {
                    id: node.id,
                    revision: node.revision,
                    fading: node.fading,
                    html: fresh.then(|| render(node)),
                }
            })
            .collect();
        Self {
            count: list.count,
            nodes,
        }
    }
}

#[derive(Serialize, Debug)]
struct ViewMessage {
    firmware: Option<String>,
    surveillance: bool,
    vendors: usize,
    detected: ListMessage,
    whitelist: ListMessage,
    toast: Option<ToastView>,
}

impl ViewMessage {
    /// Full view when `sent` is None, otherwise only rows the client lacks
    /// carry markup.
    fn build(snapshot: &Snapshot, sent: Option<&mut SentRevisions>) -> Self {
        let (detected_sent, whitelist_sent) = match sent {
            Some(sent) => (Some(&mut sent.detected), Some(&mut sent.whitelist)),
            None => (None, None),
        };
        Self {
            firmware: snapshot.firmware.clone(),
            surveillance: snapshot.surveillance,
            vendors: snapshot.vendors,
            detected: ListMessage::render::<DetectedRow>(
                &snapshot.detected,
                ui::render_detected,
                detected_sent,
            ),
            whitelist: ListMessage::render::<WhitelistRow>(
                &snapshot.whitelist,
                ui::render_whitelisted,
                whitelist_sent,
            ),
            toast: snapshot.toast.clone(),
        }
    }
}

fn reject(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::InvalidMac(_) => StatusCode::BAD_REQUEST,
        Error::Busy(_) => StatusCode::CONFLICT,
        Error::Http { .. } | Error::Status { .. } => StatusCode::BAD_GATEWAY,
    };
    tracing::warn!("Action failed: {err}");
    (status, err.to_string())
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.dashboard.write().await.snapshot(Instant::now());
    Html(ui::render_page(&snapshot, state.radar.base_url()))
}

async fn view(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.view(None).await)
}

async fn toggle_surveillance(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let active = state.radar.toggle_surveillance().await.map_err(reject)?;
    state.dashboard.write().await.set_surveillance(active);
    state.notify();
    Ok(Json(json!({ "active": active })))
}

#[derive(Deserialize)]
struct MacForm {
    mac: String,
    /// Typed in by hand rather than picked from a list
    #[serde(default)]
    manual: bool,
}

impl MacForm {
    fn validated(&self) -> crate::error::Result<String> {
        if self.manual {
            return devices::normalize_manual_mac(&self.mac);
        }
        match devices::parse_mac(&self.mac) {
            Some(_) => Ok(self.mac.clone()),
            None => Err(Error::InvalidMac(self.mac.clone())),
        }
    }
}

async fn whitelist_add(
    State(state): State<AppState>,
    Form(form): Form<MacForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mac = form.validated().map_err(reject)?;
    if state
        .dashboard
        .write()
        .await
        .optimistic_whitelist(&mac, Instant::now())
    {
        state.notify();
    }
    state.radar.add_to_whitelist(&mac).await.map_err(reject)?;
    tracing::info!("Whitelisted {mac}");
    state.refresh().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn whitelist_remove(
    State(state): State<AppState>,
    Form(form): Form<MacForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mac = form.validated().map_err(reject)?;
    if state
        .dashboard
        .write()
        .await
        .optimistic_remove(&mac, Instant::now())
    {
        state.notify();
    }
    let result = state.radar.remove_from_whitelist(&mac).await;
    // Re-read either way so a failed removal brings the row back.
    state.refresh().await;
    result.map_err(reject)?;
    tracing::info!("Removed {mac} from whitelist");
    Ok(StatusCode::NO_CONTENT)
}

async fn whitelist_add_all(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state
        .dashboard
        .write()
        .await
        .optimistic_add_all(Instant::now())
        > 0
    {
        state.notify();
    }
    let added = state.radar.add_all().await.map_err(reject)?;
    tracing::info!("Whitelisted {added} devices");
    state.refresh().await;
    Ok(Json(json!({ "added": added })))
}

async fn whitelist_clear(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.dashboard.write().await.optimistic_clear();
    state.notify();
    let result = state.radar.clear_whitelist().await;
    state.refresh().await;
    let removed = result.map_err(reject)?;
    tracing::info!("Cleared {removed} whitelist entries");
    Ok(Json(json!({ "removed": removed })))
}

async fn ws_view(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_view(socket, state))
}

async fn handle_ws_view(mut socket: WebSocket, state: AppState) {
    let mut rx = state.notifier.subscribe();
    let mut sent = SentRevisions::default();
    if send_view(&mut socket, &state, &mut sent).await.is_err() {
        return;
    }
    loop {
        match rx.recv().await {
            // Every message carries the whole view, so skipped ones are harmless.
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
        if send_view(&mut socket, &state, &mut sent).await.is_err() {
            break;
        }
    }
}

async fn send_view(
    socket: &mut WebSocket,
    state: &AppState,
    sent: &mut SentRevisions,
) -> Result<(), ()> {
    let payload = serde_json::to_string(&state.view(Some(sent)).await).map_err(|_| ())?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{self, Radar};
    use crate::dashboard::Dashboard;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::RwLock;

    async fn console(radar: Radar) -> (String, fake::Shared, AppState) {
        let (radar_url, shared) = fake::spawn(radar).await;
        let config = AppConfig {
            radar_url: radar_url.clone(),
            ..AppConfig::default()
        };
        let (notifier, _) = broadcast::channel(16);
        let state = AppState {
            radar: RadarClient::new(&radar_url, Duration::from_secs(2)).unwrap(),
            dashboard: Arc::new(RwLock::new(Dashboard::new(&config))),
            config: Arc::new(config),
            notifier,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), shared, state)
    }

    #[tokio::test]
    async fn view_carries_rendered_nodes() {
        let (base, _, state) = console(Radar {
            devices: vec![serde_json::json!({ "mac": "AA:BB:CC:DD:EE:FF", "rssi": -40 })],
            ..Default::default()
        })
        .await;
        state.refresh().await;

        let view: Value = reqwest::get(format!("{base}/api/view"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["detected"]["count"], 1);
        let node = &view["detected"]["nodes"][0];
        assert_eq!(node["revision"], 0);
        assert!(node["html"].as_str().unwrap().contains("AA:BB:CC:DD:EE:FF"));
        assert_eq!(view["firmware"], "v11-test");
    }

    #[test]
    fn clients_only_get_markup_for_new_revisions() {
        let mut dash = Dashboard::new(&AppConfig::default());
        let now = Instant::now();
        let poll = |rssi: i32| crate::devices::DevicesResponse {
            version: None,
            devices: vec![
                crate::devices::DeviceRecord {
                    mac: "AA:BB:CC:DD:EE:FF".into(),
                    rssi,
                    ..Default::default()
                },
                crate::devices::DeviceRecord {
                    mac: "11:22:33:44:55:66".into(),
                    rssi: -70,
                    ..Default::default()
                },
            ],
        };
        let mut sent = SentRevisions::default();

        dash.apply_poll(vec![], poll(-40), now, 0);
        let first = ViewMessage::build(&dash.snapshot(now), Some(&mut sent));
        assert!(first.detected.nodes.iter().all(|n| n.html.is_some()));

        let again = ViewMessage::build(&dash.snapshot(now), Some(&mut sent));
        assert!(again.detected.nodes.iter().all(|n| n.html.is_none()));

        dash.apply_poll(vec![], poll(-41), now, 0);
        let changed = ViewMessage::build(&dash.snapshot(now), Some(&mut sent));
        let with_html: Vec<u64> = changed
            .detected
            .nodes
            .iter()
            .filter(|n| n.html.is_some())
            .map(|n| n.revision)
            .collect();
        assert_eq!(with_html, vec![1]);

        let full = ViewMessage::build(&dash.snapshot(now), None);
        assert!(full.detected.nodes.iter().all(|n| n.html.is_some()));
    }

    #[tokio::test]
    async fn manual_mac_is_validated() {
        let (base, shared, _) = console(Radar::default()).await;
        let http = reqwest::Client::new();

        let res = http
            .post(format!("{base}/api/whitelist/add"))
            .form(&[("mac", "not-a-mac"), ("manual", "true")])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(shared.lock().unwrap().posted.is_empty());

        let res = http
            .post(format!("{base}/api/whitelist/add"))
            .form(&[("mac", " aa-bb-cc-dd-ee-ff "), ("manual", "true")])
            .send()
            .await
            .unwrap();
        assert!(res.status().is_success());
        let posted = shared.lock().unwrap().posted.clone();
        assert_eq!(posted, vec![("add".to_string(), "AA-BB-CC-DD-EE-FF".to_string())]);
    }

    #[tokio::test]
    async fn whitelisting_moves_device_between_lists() {
        let (base, shared, state) = console(Radar {
            devices: vec![serde_json::json!({ "mac": "AA:BB:CC:DD:EE:FF", "rssi": -40 })],
            ..Default::default()
        })
        .await;
        state.refresh().await;
        // The radar flags whitelisted devices itself.
        shared.lock().unwrap().devices[0]["whitelisted"] = Value::Bool(true);

        let res = reqwest::Client::new()
            .post(format!("{base}/api/whitelist/add"))
            .form(&[("mac", "AA:BB:CC:DD:EE:FF")])
            .send()
            .await
            .unwrap();
        assert!(res.status().is_success());

        let snap = state.dashboard.write().await.snapshot(Instant::now());
        assert_eq!(snap.detected.count, 0);
        assert_eq!(snap.whitelist.count, 1);
        assert_eq!(snap.whitelist.nodes[0].row.last_seen.text, "🟢 Present now");
    }

    #[tokio::test]
    async fn toggle_reports_new_state() {
        let (base, _, state) = console(Radar::default()).await;
        let body: Value = reqwest::Client::new()
            .post(format!("{base}/api/surveillance/toggle"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["active"], true);
        assert!(state.dashboard.read().await.surveillance());
    }
}
