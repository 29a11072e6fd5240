//! Client state for one console process: vendor table, alert bookkeeping,
//! both reconciled lists and the toast slot.

use crate::alerts::{AlertState, ToastPhase, ToastSlot};
use crate::config::AppConfig;
use crate::devices::{DeviceRecord, DevicesResponse, VendorTable};
use crate::reconcile::{Node, NodeId, Patch, Reconciler};
use crate::view::{DetectedRow, WhitelistRow};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub struct Dashboard {
    vendors: VendorTable,
    alerts: AlertState,
    detected: Reconciler<DetectedRow>,
    whitelist: Reconciler<WhitelistRow>,
    toast: ToastSlot,
    last_toast: Option<(u64, ToastPhase)>,
    firmware: Option<String>,
}

#[derive(Debug, Default)]
pub struct PollOutcome {
    pub detected: Patch,
    pub whitelist: Patch,
    /// MACs that raised a toast during this poll
    pub alerted: Vec<String>,
    pub firmware_changed: bool,
}

impl PollOutcome {
    pub fn changed(&self) -> bool {
        self.firmware_changed || !self.detected.is_empty() || !self.whitelist.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView<T> {
    pub id: NodeId,
    pub revision: u64,
    pub fading: bool,
    pub row: T,
}

impl<T: Clone> From<&Node<T>> for NodeView<T> {
    fn from(node: &Node<T>) -> Self {
        Self {
            id: node.id,
            revision: node.revision,
            fading: node.is_fading(),
            row: node.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView<T> {
    /// Live entries only, fading ones are already gone for the user
    pub count: usize,
    pub nodes: Vec<NodeView<T>>,
}

impl<T: Clone + PartialEq> From<&Reconciler<T>> for ListView<T> {
    fn from(list: &Reconciler<T>) -> Self {
        Self {
            count: list.live_len(),
            nodes: list.iter().map(NodeView::from).collect(),
        }
    }
}

impl<T> ListView<T> {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToastView {
    pub id: u64,
    pub mac: String,
    pub name: String,
    pub phase: ToastPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub firmware: Option<String>,
    pub surveillance: bool,
    pub vendors: usize,
    pub detected: ListView<DetectedRow>,
    pub whitelist: ListView<WhitelistRow>,
    pub toast: Option<ToastView>,
}

impl Dashboard {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_timings(config.fade, config.toast_visible, config.toast_fade)
    }

    pub fn with_timings(fade: Duration, toast_visible: Duration, toast_fade: Duration) -> Self {
        Self {
            vendors: VendorTable::default(),
            alerts: AlertState::new(),
            detected: Reconciler::new(fade),
            // Whitelist rows disappear without a fade.
            whitelist: Reconciler::new(Duration::ZERO),
            toast: ToastSlot::new(toast_visible, toast_fade),
            last_toast: None,
            firmware: None,
        }
    }

    pub fn set_vendors(&mut self, vendors: VendorTable) {
        tracing::info!("Loaded {} OUI vendor prefixes", vendors.len());
        self.vendors = vendors;
    }

    pub fn seed_alerts(&mut self, macs: Vec<String>) {
        self.alerts.seed(macs);
    }

    pub fn surveillance(&self) -> bool {
        self.alerts.armed()
    }

    /// Apply the armed flag reported by the radar. Disarming drops the
    /// intruder marker from every detected row.
    pub fn set_surveillance(&mut self, active: bool) {
        if !self.alerts.set_armed(active) {
            return;
        }
        tracing::info!("Surveillance {}", if active { "armed" } else { "disarmed" });
        if !active {
            self.detected.update_each(|row| std::mem::replace(&mut row.intruder, false));
        }
    }

    pub fn apply_poll(
        &mut self,
        whitelist: Vec<DeviceRecord>,
        devices: DevicesResponse,
        now: Instant,
        now_unix: i64,
    ) -> PollOutcome {
        let firmware_changed = devices.version.is_some() && devices.version != self.firmware;
        if firmware_changed {
            self.firmware = devices.version;
        }
        let (authorized, candidates): (Vec<DeviceRecord>, Vec<DeviceRecord>) =
            devices.devices.into_iter().partition(|d| d.whitelisted);

        self.alerts
            .capture_baseline(candidates.iter().map(|d| d.mac.as_str()));

        let mut alerted = Vec::new();
        for device in &candidates {
            if self.alerts.observe(&device.mac) {
                self.toast.show(&device.mac, &device.alert_name(), now);
                alerted.push(device.mac.clone());
            }
        }

        let rows: Vec<(String, DetectedRow)> = candidates
            .iter()
            .map(|d| {
                let intruder = self.alerts.is_intruder(&d.mac);
                (d.mac.clone(), DetectedRow::build(d, &self.vendors, intruder))
            })
            .collect();
        let detected = self.detected.reconcile(rows, now);

        let visible: HashSet<&str> = authorized.iter().map(|d| d.mac.as_str()).collect();
        let wl_rows: Vec<(String, WhitelistRow)> = whitelist
            .iter()
            .map(|entry| {
                let live = entry.live == Some(true) || visible.contains(entry.mac.as_str());
                (
                    entry.mac.clone(),
                    WhitelistRow::build(entry, &self.vendors, live, now_unix),
                )
            })
            .collect();
        let whitelist = self.whitelist.reconcile(wl_rows, now);

        tracing::debug!(
            "Poll applied: {} detected (+{} ~{} -{}), {} whitelisted",
            self.detected.live_len(),
            detected.created.len(),
            detected.updated.len(),
            detected.fading.len() + detected.removed.len(),
            self.whitelist.live_len()
        );

        PollOutcome {
            detected,
            whitelist,
            alerted,
            firmware_changed,
        }
    }

    /// Fade a detected row right away while the radar processes the add.
    pub fn optimistic_whitelist(&mut self, mac: &str, now: Instant) -> bool {
        self.detected.fade(mac, now)
    }

    pub fn optimistic_add_all(&mut self, now: Instant) -> usize {
        self.detected.fade_all(now)
    }

    pub fn optimistic_remove(&mut self, mac: &str, now: Instant) -> bool {
        self.whitelist.fade(mac, now)
    }

    pub fn optimistic_clear(&mut self) {
        self.whitelist.clear();
    }

    /// Evict faded nodes. Returns true if anything was removed.
    pub fn sweep(&mut self, now: Instant) -> bool {
        let detected = self.detected.sweep(now);
        let whitelist = self.whitelist.sweep(now);
        !detected.is_empty() || !whitelist.is_empty()
    }

    /// Timer housekeeping between polls: evicts faded rows and advances the
    /// toast. Returns true when the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let swept = self.sweep(now);
        let toast = self.toast.current(now).map(|(t, phase)| (t.id, phase));
        let toast_changed = toast != self.last_toast;
        self.last_toast = toast;
        swept || toast_changed
    }

    pub fn snapshot(&mut self, now: Instant) -> Snapshot {
        let toast = self.toast.current(now).map(|(t, phase)| ToastView {
            id: t.id,
            mac: t.mac.clone(),
            name: t.name.clone(),
            phase,
        });
        Snapshot {
            firmware: self.firmware.clone(),
            surveillance: self.alerts.armed(),
            vendors: self.vendors.len(),
            detected: ListView::from(&self.detected),
            whitelist: ListView::from(&self.whitelist),
            toast,
        }
    }
}
