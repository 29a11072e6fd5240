use crate::alerts::ToastPhase;
use crate::dashboard::{NodeView, Snapshot, ToastView};
use crate::decode::Brand;
use crate::view::{Badge, BadgeKind, DetectedRow, Freshness, SignalTier, WhitelistRow};
use dioxus::core::NoOpMutations;
use dioxus::prelude::*;

#[derive(Props, Clone, PartialEq)]
pub struct AppProps {
    pub snapshot: Snapshot,
    pub radar_url: String,
}

#[derive(Props, Clone, PartialEq)]
pub struct DetectedProps {
    pub node: NodeView<DetectedRow>,
}

#[derive(Props, Clone, PartialEq)]
pub struct WhitelistProps {
    pub node: NodeView<WhitelistRow>,
}

#[derive(Props, Clone, PartialEq)]
pub struct BadgesProps {
    pub badges: Vec<Badge>,
}

pub fn render_page(snapshot: &Snapshot, radar_url: &str) -> String {
    render(
        App,
        AppProps {
            snapshot: snapshot.clone(),
            radar_url: radar_url.to_string(),
        },
    )
}

/// One detected row, as pushed to the browser when its revision changes.
pub fn render_detected(node: &NodeView<DetectedRow>) -> String {
    render(DetectedItem, DetectedProps { node: node.clone() })
}

pub fn render_whitelisted(node: &NodeView<WhitelistRow>) -> String {
    render(WhitelistItem, WhitelistProps { node: node.clone() })
}

fn render<P: Clone + 'static>(root: fn(P) -> Element, props: P) -> String {
    let mut app = VirtualDom::new_with_props(root, props);
    // Build the tree before rendering to avoid SSR panics.
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    dioxus_ssr::render(&mut app)
}

fn badge_class(badge: &Badge) -> String {
    let kind = match badge.kind {
        BadgeKind::AddressType => "badge-addr",
        BadgeKind::Private => "badge-private",
        BadgeKind::Appearance => "badge-appearance",
        BadgeKind::Vendor => "badge-vendor",
        BadgeKind::Battery => "badge-battery",
        BadgeKind::Manufacturer => "badge-mfg",
        BadgeKind::Service => "badge-service",
    };
    match badge.brand {
        Some(brand) => format!("badge {kind} {}", brand_class(brand)),
        None => format!("badge {kind}"),
    }
}

fn brand_class(brand: Brand) -> &'static str {
    match brand {
        Brand::Apple => "brand-apple",
        Brand::Microsoft => "brand-microsoft",
        Brand::Google => "brand-google",
        Brand::Samsung => "brand-samsung",
        Brand::Audio => "brand-audio",
        Brand::Other => "brand-other",
    }
}

fn tier_class(tier: SignalTier) -> &'static str {
    match tier {
        SignalTier::Strong => "strong",
        SignalTier::Medium => "medium",
        SignalTier::Weak => "weak",
    }
}

fn freshness_class(freshness: Freshness) -> &'static str {
    match freshness {
        Freshness::Recent => "seen-recent",
        Freshness::Today => "seen-today",
        Freshness::Old => "seen-old",
        Freshness::Never => "seen-never",
    }
}

fn toast_class(toast: Option<&ToastView>) -> &'static str {
    match toast.map(|t| t.phase) {
        Some(ToastPhase::Visible) => "toast show",
        Some(ToastPhase::Fading) => "toast show fading",
        None => "toast",
    }
}

#[component]
fn Badges(props: BadgesProps) -> Element {
    rsx! {
        div { class: "badges",
            for badge in props.badges.iter() {
                span { class: badge_class(badge), "{badge.text}" }
            }
        }
    }
}

#[component]
fn DetectedItem(props: DetectedProps) -> Element {
    let node = &props.node;
    let row = &node.row;
    let mut class = String::from("device-card");
    if node.fading {
        class.push_str(" fading");
    }
    if row.intruder {
        class.push_str(" intruder");
    }
    let name_class = if row.gatt_resolved {
        "device-name gatt"
    } else {
        "device-name"
    };
    let tier = tier_class(row.signal.tier);
    let percent = row.signal.percent;
    let tx_power = row
        .tx_power
        .map(|tx| format!("TX {tx} dBm"))
        .unwrap_or_default();

    rsx! {
        div {
            class: "{class}",
            "data-node": "{node.id}",
            "data-rev": "{node.revision}",
            "data-mac": "{row.mac}",
            div { class: "device-body",
                div { class: "device-head",
                    span { class: "{name_class}", "{row.title}" }
                    span { class: "device-mac", "{row.mac}" }
                }
                Badges { badges: row.badges.clone() }
                div { class: "signal",
                    div { class: "signal-track",
                        div { class: "signal-fill {tier}", style: "width: {percent}%" }
                    }
                    span { class: "signal-value", "{row.rssi} dBm" }
                    span { class: "tx-power", hidden: row.tx_power.is_none(), "{tx_power}" }
                }
            }
            button {
                class: "pill-btn",
                "data-action": "whitelist-add",
                "data-mac": "{row.mac}",
                "✅ Authorize"
            }
        }
    }
}

#[component]
fn WhitelistItem(props: WhitelistProps) -> Element {
    let node = &props.node;
    let row = &node.row;
    let class = if node.fading {
        "device-card authorized fading"
    } else {
        "device-card authorized"
    };
    let seen_class = freshness_class(row.last_seen.freshness);
    let seen_title = row.last_seen.full.clone().unwrap_or_default();

    rsx! {
        div {
            class: "{class}",
            "data-node": "{node.id}",
            "data-rev": "{node.revision}",
            "data-mac": "{row.mac}",
            div { class: "device-body",
                div { class: "device-head",
                    span { class: "device-name", "{row.title}" }
                    span { class: "device-mac", "{row.mac}" }
                }
                Badges { badges: row.badges.clone() }
                span { class: "last-seen {seen_class}", title: "{seen_title}", "{row.last_seen.text}" }
            }
            button {
                class: "pill-btn danger-outline",
                "data-action": "whitelist-remove",
                "data-mac": "{row.mac}",
                "🗑 Remove"
            }
        }
    }
}

#[component]
fn App(props: AppProps) -> Element {
    let styles = r#"
:root {
    color-scheme: dark;
}
* { box-sizing: border-box; }
body, html {
    margin: 0;
    padding: 0;
    background: radial-gradient(circle at 20% 20%, #171a24, #0b0d13 40%), #0b0d13;
}
.page { min-height: 100vh; display: flex; justify-content: center; padding: 36px 18px; color: #e9ecf5; font-family: "Space Grotesk", "Inter", system-ui, -apple-system, sans-serif; }
.shell { width: min(960px, 100%); display: flex; flex-direction: column; gap: 12px; }
.header { display: flex; flex-direction: column; gap: 6px; }
.title { font-size: 26px; margin: 0; letter-spacing: 0.4px; }
.subtitle { margin: 0; color: #9aa4bc; font-size: 15px; }
.tags { display: flex; flex-wrap: wrap; gap: 8px; }
.tag { display: inline-flex; align-items: center; gap: 8px; width: fit-content; padding: 8px 12px; border-radius: 999px; background: #10131c; border: 1px solid #1f2431; color: #c5cee3; font-size: 14px; }
.controls { display: flex; flex-wrap: wrap; gap: 10px; align-items: center; }
.nav-btn { padding: 10px 14px; border-radius: 12px; border: 1px solid #1f2230; background: #11131b; color: #c5cee3; font-weight: 700; letter-spacing: 0.2px; cursor: pointer; transition: transform 120ms ease, background 140ms ease, border 140ms ease; }
.nav-btn.armed { background: linear-gradient(135deg, #ff5f7a, #ff3c5a); color: #0a0c12; border-color: #ff90a3; box-shadow: 0 12px 28px rgba(255, 79, 100, 0.28); transform: translateY(-1px); }
.manual { display: inline-flex; gap: 8px; align-items: center; }
.manual input { width: 190px; padding: 10px 12px; border-radius: 10px; border: 1px solid #262b38; background: #0f1118; color: #e9ecf5; font-weight: 700; font-family: ui-monospace, monospace; }
.card { width: 100%; background: linear-gradient(145deg, #161a23, #0f1219); border: 1px solid #1f2230; border-radius: 16px; padding: 22px; box-shadow: 0 18px 44px rgba(0,0,0,0.35); }
.card-title { margin: 0 0 4px 0; font-size: 20px; display: flex; align-items: center; gap: 10px; }
.count { font-size: 13px; padding: 2px 10px; border-radius: 999px; background: #10141d; border: 1px solid #1f2230; color: #9aa4bc; }
.muted { color: #8f98ac; margin: 0 0 16px 0; font-size: 14px; }
.empty { color: #7c859c; font-size: 14px; padding: 12px 0; }
.device-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(280px, 1fr)); gap: 8px; }
.device-card { display: flex; gap: 10px; align-items: flex-start; padding: 10px 12px; border-radius: 12px; border: 1px solid #1f2230; background: #0f1218; min-height: 48px; transition: opacity 600ms ease, transform 600ms ease; }
.device-card.fading { opacity: 0; transform: scale(0.97); pointer-events: none; }
.device-card.intruder { border-color: #ff4f64; box-shadow: 0 0 0 1px #ff4f64, 0 10px 24px rgba(255,79,100,0.22); }
.device-body { display: flex; flex-direction: column; gap: 6px; flex: 1; min-width: 0; }
.device-head { display: flex; flex-direction: column; gap: 2px; }
.device-name { font-weight: 700; font-size: 14px; color: #f0f2fb; }
.device-name.gatt { color: #8fe3b0; }
.device-mac { font-size: 12px; color: #8f98ac; letter-spacing: 0.3px; font-family: ui-monospace, monospace; }
.badges { display: flex; flex-wrap: wrap; gap: 6px; }
.badge { font-size: 11px; padding: 2px 8px; border-radius: 999px; background: #161925; border: 1px solid #262c3a; color: #c5cee3; }
.badge-private { border-color: #7a5cff; color: #c9bbff; }
.badge-battery { border-color: #3fb97a; color: #a7efc6; }
.badge-vendor { border-color: #3a7bd5; color: #b6d3ff; }
.badge-service { color: #9aa4bc; }
.brand-apple { border-color: #d9d9de; color: #f2f2f7; }
.brand-microsoft { border-color: #00a4ef; color: #9ddcff; }
.brand-google { border-color: #fbbc05; color: #ffe39a; }
.brand-samsung { border-color: #1428a0; color: #a9b6ff; }
.brand-audio { border-color: #ff8a3d; color: #ffc9a3; }
.signal { display: flex; align-items: center; gap: 8px; font-size: 12px; color: #9aa4bc; }
.signal-track { width: 90px; height: 6px; border-radius: 999px; background: #1c2030; overflow: hidden; }
.signal-fill { height: 100%; border-radius: 999px; transition: width 300ms ease; }
.signal-fill.strong { background: #3fb97a; }
.signal-fill.medium { background: #f5b942; }
.signal-fill.weak { background: #ff4f64; }
.last-seen { font-size: 12px; }
.seen-recent { color: #8fe3b0; }
.seen-today { color: #f5d27a; }
.seen-old { color: #ff9aa8; }
.seen-never { color: #7c859c; }
.pill-btn { padding: 8px 10px; border-radius: 10px; border: 1px solid #262b38; background: #0f1118; color: #dfe4f3; font-weight: 700; cursor: pointer; transition: all 120ms ease; white-space: nowrap; }
.pill-btn:hover { border-color: #ff90a3; color: #ffb5c2; }
.pill-btn:disabled { opacity: 0.5; cursor: progress; }
.danger-outline { border-color: #4a2630; }
.status { margin-top: 10px; color: #8f98ac; font-size: 14px; min-height: 18px; }
.toast { position: fixed; right: 18px; bottom: 18px; width: min(360px, calc(100% - 36px)); padding: 14px 16px; border-radius: 14px; background: #0f121a; border: 1px solid #ff4f64; box-shadow: 0 18px 40px rgba(0,0,0,0.4); opacity: 0; transform: translateY(12px); pointer-events: none; transition: opacity 500ms ease, transform 500ms ease; }
.toast.show { opacity: 1; transform: translateY(0); }
.toast.show.fading { opacity: 0; }
.toast-title { margin: 0 0 4px 0; color: #ff90a3; font-weight: 800; }
.toast-body { margin: 0; color: #c5cee3; font-size: 14px; }
@media (max-width: 640px) {
    .page { padding: 20px 14px; }
    .shell { gap: 10px; }
    .card { padding: 18px; }
    .title { font-size: 22px; }
    .subtitle { font-size: 14px; }
    .nav-btn { flex: 1; text-align: center; padding: 10px 12px; }
    .card-title { font-size: 18px; }
}
"#;

    let script = r#"
(() => {
  const detectedList = document.getElementById('detected-list');
  const whitelistList = document.getElementById('whitelist-list');
  const detectedEmpty = document.getElementById('detected-empty');
  const whitelistEmpty = document.getElementById('whitelist-empty');
  const detectedCount = document.getElementById('detected-count');
  const whitelistCount = document.getElementById('whitelist-count');
  const surveillanceBtn = document.getElementById('surveillance-btn');
  const firmware = document.getElementById('firmware');
  const vendorCount = document.getElementById('vendor-count');
  const manualMac = document.getElementById('manual-mac');
  const status = document.getElementById('status');
  const toast = document.getElementById('toast');
  const toastName = document.getElementById('toast-name');
  const toastMac = document.getElementById('toast-mac');
  let ws;

  function fromHtml(html) {
    const tpl = document.createElement('template');
    tpl.innerHTML = html.trim();
    return tpl.content.firstElementChild;
  }

  // Parts of a row that change between revisions. The row element itself
  // stays in place so transitions keep running.
  const ROW_PARTS = ['.device-name', '.badges', '.signal-fill', '.signal-value', '.tx-power', '.last-seen'];

  function patchRow(el, html) {
    const next = fromHtml(html);
    if (!next) return;
    el.className = next.className;
    el.dataset.rev = next.dataset.rev;
    ROW_PARTS.forEach((selector) => {
      const from = next.querySelector(selector);
      const to = el.querySelector(selector);
      if (!from || !to) return;
      to.className = from.className;
      to.hidden = from.hidden;
      if (from.hasAttribute('style')) to.setAttribute('style', from.getAttribute('style'));
      if (from.hasAttribute('title')) to.title = from.title;
      else to.removeAttribute('title');
      if (to.innerHTML !== from.innerHTML) to.innerHTML = from.innerHTML;
    });
  }

  function applyList(container, list, emptyEl, countEl) {
    const seen = new Set();
    list.nodes.forEach((node) => {
      const id = String(node.id);
      seen.add(id);
      let el = container.querySelector(`[data-node="${id}"]`);
      if (!el) {
        if (!node.html) return;
        el = fromHtml(node.html);
        if (el) container.appendChild(el);
      } else if (el.dataset.rev !== String(node.revision) && node.html) {
        patchRow(el, node.html);
      }
      if (el) el.classList.toggle('fading', node.fading);
    });
    container.querySelectorAll('[data-node]').forEach((el) => {
      if (!seen.has(el.dataset.node)) el.remove();
    });
    countEl.textContent = list.count;
    emptyEl.hidden = list.nodes.length > 0;
  }

  function applySurveillance(active) {
    surveillanceBtn.classList.toggle('armed', active);
    surveillanceBtn.classList.toggle('disarmed', !active);
    surveillanceBtn.textContent = active ? '🔒 Disarm' : '🔓 Arm surveillance';
  }

  function applyToast(data) {
    if (!data) {
      toast.className = 'toast';
      return;
    }
    toastName.textContent = data.name;
    toastMac.textContent = data.mac;
    toast.className = data.phase === 'fading' ? 'toast show fading' : 'toast show';
  }

  function applyView(view) {
    applyList(detectedList, view.detected, detectedEmpty, detectedCount);
    applyList(whitelistList, view.whitelist, whitelistEmpty, whitelistCount);
    applySurveillance(view.surveillance);
    applyToast(view.toast);
    firmware.textContent = view.firmware || 'unknown';
    vendorCount.textContent = view.vendors;
  }

  function connect() {
    if (ws && (ws.readyState === WebSocket.OPEN || ws.readyState === WebSocket.CONNECTING)) {
      return;
    }
    const proto = location.protocol === 'https:' ? 'wss' : 'ws';
    ws = new WebSocket(`${proto}://${location.host}/ws/view`);
    ws.onopen = () => {
      status.textContent = '';
    };
    ws.onmessage = (evt) => {
      try {
        applyView(JSON.parse(evt.data));
      } catch (err) {
        console.error('Bad view message', err);
      }
    };
    ws.onclose = () => {
      status.textContent = 'Reconnecting...';
      setTimeout(connect, 1500);
    };
  }

  async function post(path, params) {
    const res = await fetch(path, {
      method: 'POST',
      headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
      body: new URLSearchParams(params || {}),
    });
    if (!res.ok) {
      throw new Error(await res.text());
    }
    return res;
  }

  async function run(button, path, params) {
    if (button) button.disabled = true;
    try {
      return await post(path, params);
    } catch (err) {
      alert(err.message || 'Request failed');
    } finally {
      if (button) button.disabled = false;
    }
  }

  document.addEventListener('click', (evt) => {
    const button = evt.target.closest('[data-action]');
    if (!button) return;
    const mac = button.dataset.mac;
    switch (button.dataset.action) {
      case 'whitelist-add':
        run(button, '/api/whitelist/add', { mac });
        break;
      case 'whitelist-remove':
        if (confirm('Remove this device from the whitelist?')) {
          run(button, '/api/whitelist/remove', { mac });
        }
        break;
      case 'whitelist-manual': {
        const value = manualMac.value.trim();
        if (!value) return;
        run(button, '/api/whitelist/add', { mac: value, manual: 'true' }).then((res) => {
          if (res) manualMac.value = '';
        });
        break;
      }
      case 'add-all':
        if (Number(detectedCount.textContent) === 0) return;
        if (confirm('Authorize every detected device?')) {
          run(button, '/api/whitelist/add-all');
        }
        break;
      case 'clear':
        if (Number(whitelistCount.textContent) === 0) return;
        if (confirm('Remove every authorized device?')) {
          run(button, '/api/whitelist/clear');
        }
        break;
      case 'surveillance':
        run(button, '/api/surveillance/toggle');
        break;
    }
  });

  manualMac.addEventListener('keydown', (evt) => {
    if (evt.key === 'Enter') {
      document.getElementById('manual-add').click();
    }
  });

  connect();
})();
"#;

    let snapshot = &props.snapshot;
    let firmware = snapshot.firmware.as_deref().unwrap_or("unknown");
    let (surveillance_class, surveillance_label) = if snapshot.surveillance {
        ("nav-btn armed", "🔒 Disarm")
    } else {
        ("nav-btn disarmed", "🔓 Arm surveillance")
    };
    let toast = snapshot.toast.as_ref();
    let toast_state = toast_class(toast);
    let toast_name = toast.map(|t| t.name.clone()).unwrap_or_default();
    let toast_mac = toast.map(|t| t.mac.clone()).unwrap_or_default();

    rsx! {
        div { class: "page",
            div { class: "shell",
                div { class: "header",
                    h1 { class: "title", "BLE Radar" }
                    p { class: "subtitle", "Presence detection console" }
                    div { class: "tags",
                        div { class: "tag", "Radar {props.radar_url}" }
                        div { class: "tag", "Firmware " span { id: "firmware", "{firmware}" } }
                        div { class: "tag", "OUI prefixes " span { id: "vendor-count", "{snapshot.vendors}" } }
                    }
                }
                div { class: "controls",
                    button {
                        id: "surveillance-btn",
                        class: "{surveillance_class}",
                        "data-action": "surveillance",
                        "{surveillance_label}"
                    }
                    button { class: "pill-btn", "data-action": "add-all", "Authorize all" }
                    button { class: "pill-btn danger-outline", "data-action": "clear", "Clear whitelist" }
                    label { class: "manual",
                        input { id: "manual-mac", r#type: "text", placeholder: "AA:BB:CC:DD:EE:FF", maxlength: "17" }
                        button { id: "manual-add", class: "pill-btn", "data-action": "whitelist-manual", "Add MAC" }
                    }
                }
                div { id: "status", class: "status" }
                div { class: "card",
                    h2 { class: "card-title",
                        "📡 Detected devices"
                        span { id: "detected-count", class: "count", "{snapshot.detected.count}" }
                    }
                    p { class: "muted", "Devices in range that are not authorized yet." }
                    div { id: "detected-list", class: "device-grid",
                        for node in snapshot.detected.nodes.iter() {
                            DetectedItem { key: "{node.id}", node: node.clone() }
                        }
                    }
                    div { id: "detected-empty", class: "empty", hidden: !snapshot.detected.is_empty(), "No unknown devices in range" }
                }
                div { class: "card",
                    h2 { class: "card-title",
                        "🛡 Authorized devices"
                        span { id: "whitelist-count", class: "count", "{snapshot.whitelist.count}" }
                    }
                    p { class: "muted", "Devices that never raise an alert." }
                    div { id: "whitelist-list", class: "device-grid",
                        for node in snapshot.whitelist.nodes.iter() {
                            WhitelistItem { key: "{node.id}", node: node.clone() }
                        }
                    }
                    div { id: "whitelist-empty", class: "empty", hidden: !snapshot.whitelist.is_empty(), "Whitelist is empty" }
                }
            }
        }
        div { id: "toast", class: "{toast_state}",
            p { class: "toast-title", "🚨 New device detected" }
            p { class: "toast-body",
                span { id: "toast-name", "{toast_name}" }
                " "
                span { id: "toast-mac", class: "device-mac", "{toast_mac}" }
            }
        }
        style { "{styles}" }
        script { "{script}" }
    }
}
