use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Client side intruder bookkeeping for one armed session.
#[derive(Clone, Debug, Default)]
pub struct AlertState {
    armed: bool,
    // MACs already present on the first successful poll. Those never alert.
    baseline: Option<HashSet<String>>,
    alerted: HashSet<String>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    /// Returns true when the state actually flipped. Disarming forgets every
    /// alert raised during the session.
    pub fn set_armed(&mut self, armed: bool) -> bool {
        if self.armed == armed {
            return false;
        }
        self.armed = armed;
        if !armed {
            self.alerted.clear();
        }
        true
    }

    /// Record the MACs visible at startup. Only the first call counts.
    pub fn capture_baseline<'a, I>(&mut self, macs: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.baseline.is_none() {
            self.baseline = Some(macs.into_iter().map(str::to_string).collect());
        }
    }

    /// Mark MACs the radar already alerted on so they do not toast again.
    pub fn seed<I: IntoIterator<Item = String>>(&mut self, macs: I) {
        self.alerted.extend(macs);
    }

    /// Returns true exactly once per MAC per armed session, and only for
    /// MACs that showed up after the baseline was taken.
    pub fn observe(&mut self, mac: &str) -> bool {
        if !self.armed {
            return false;
        }
        let Some(baseline) = &self.baseline else {
            return false;
        };
        if baseline.contains(mac) || self.alerted.contains(mac) {
            return false;
        }
        self.alerted.insert(mac.to_string());
        true
    }

    pub fn is_intruder(&self, mac: &str) -> bool {
        self.armed && self.alerted.contains(mac)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub mac: String,
    pub name: String,
    #[serde(skip)]
    pub raised_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastPhase {
    Visible,
    Fading,
}

/// A single toast slot. A new toast replaces whatever is showing.
#[derive(Clone, Debug)]
pub struct ToastSlot {
    current: Option<Toast>,
    visible_for: Duration,
    fade_for: Duration,
    next_id: u64,
}

impl ToastSlot {
    pub fn new(visible_for: Duration, fade_for: Duration) -> Self {
        Self {
            current: None,
            visible_for,
            fade_for,
            next_id: 1,
        }
    }

    pub fn show(&mut self, mac: &str, name: &str, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        tracing::info!("Intruder detected: {mac} ({name})");
        self.current = Some(Toast {
            id,
            mac: mac.to_string(),
            name: name.to_string(),
            raised_at: now,
        });
        id
    }

    /// Current toast and its phase, dropping it once fully faded.
    pub fn current(&mut self, now: Instant) -> Option<(&Toast, ToastPhase)> {
        let age = now.saturating_duration_since(self.current.as_ref()?.raised_at);
        if age >= self.visible_for + self.fade_for {
            self.current = None;
            return None;
        }
        let phase = if age >= self.visible_for {
            ToastPhase::Fading
        } else {
            ToastPhase::Visible
        };
        self.current.as_ref().map(|t| (t, phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_with_baseline(baseline: &[&str]) -> AlertState {
        let mut state = AlertState::new();
        state.capture_baseline(baseline.iter().copied());
        state.set_armed(true);
        state
    }

    #[test]
    fn alerts_once_per_mac_per_session() {
        let mut state = armed_with_baseline(&[]);
        assert!(state.observe("AA:BB:CC:DD:EE:FF"));
        for _ in 0..10 {
            assert!(!state.observe("AA:BB:CC:DD:EE:FF"));
        }
        assert!(state.is_intruder("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn baseline_devices_never_alert() {
        let mut state = armed_with_baseline(&["11:11:11:11:11:11"]);
        assert!(!state.observe("11:11:11:11:11:11"));
        assert!(!state.is_intruder("11:11:11:11:11:11"));
        state.capture_baseline(["22:22:22:22:22:22"]);
        assert!(state.observe("22:22:22:22:22:22"));
    }

    #[test]
    fn no_alert_before_baseline_or_while_disarmed() {
        let mut state = AlertState::new();
        state.set_armed(true);
        assert!(!state.observe("AA"));
        state.set_armed(false);
        state.capture_baseline(std::iter::empty());
        assert!(!state.observe("AA"));
    }

    #[test]
    fn disarm_starts_a_new_session() {
        let mut state = armed_with_baseline(&[]);
        assert!(state.observe("AA"));
        assert!(state.set_armed(false));
        assert!(!state.set_armed(false));
        assert!(!state.is_intruder("AA"));
        state.set_armed(true);
        assert!(state.observe("AA"));
    }

    #[test]
    fn seeded_macs_are_intruders_without_toast() {
        let mut state = armed_with_baseline(&[]);
        state.seed(["AA".to_string()]);
        assert!(!state.observe("AA"));
        assert!(state.is_intruder("AA"));
    }

    #[test]
    fn toast_lifecycle() {
        let mut slot = ToastSlot::new(Duration::from_secs(5), Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(slot.current(t0).is_none());

        let first = slot.show("AA", "Phone", t0);
        let second = slot.show("BB", "Tag", t0 + Duration::from_secs(1));
        assert_ne!(first, second);

        let (toast, phase) = slot.current(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(toast.mac, "BB");
        assert_eq!(phase, ToastPhase::Visible);

        let (_, phase) = slot.current(t0 + Duration::from_millis(6_200)).unwrap();
        assert_eq!(phase, ToastPhase::Fading);

        assert!(slot.current(t0 + Duration::from_millis(6_500)).is_none());
        assert!(slot.current(t0).is_none());
    }
}
