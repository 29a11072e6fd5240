//! Row content for both lists, built from radar records.
//!
//! Rows are plain values compared with `PartialEq` by the reconciler, so
//! everything a row displays must live in the row.

use crate::decode::{self, Brand};
use crate::devices::{DeviceRecord, VendorTable};
use chrono::DateTime;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeKind {
    AddressType,
    Private,
    Appearance,
    Vendor,
    Battery,
    Manufacturer,
    Service,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub kind: BadgeKind,
    pub text: String,
    pub brand: Option<Brand>,
}

impl Badge {
    fn new(kind: BadgeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            brand: None,
        }
    }
}

pub fn badges_for(record: &DeviceRecord, vendors: &VendorTable) -> Vec<Badge> {
    let mut badges = vec![Badge::new(
        BadgeKind::AddressType,
        record.address_type.as_deref().unwrap_or("Unknown"),
    )];
    if decode::is_private_address(record.address_type.as_deref()) {
        badges.push(Badge::new(BadgeKind::Private, "🎭 Private"));
    }
    if let Some(label) = decode::appearance_label(record.appearance) {
        badges.push(Badge::new(BadgeKind::Appearance, label));
    }
    if let Some(vendor) = vendors.resolve(record) {
        badges.push(Badge::new(BadgeKind::Vendor, vendor));
    }
    if let Some(level) = record.battery() {
        badges.push(Badge::new(BadgeKind::Battery, format!("🔋 {level}%")));
    }
    if let Some(mfg) = decode::decode_manufacturer(record.mfg_data.as_deref()) {
        badges.push(Badge {
            kind: BadgeKind::Manufacturer,
            text: mfg.to_string(),
            brand: Some(mfg.brand),
        });
    }
    badges.extend(
        decode::decode_services(record.services.as_deref())
            .into_iter()
            .map(|svc| Badge::new(BadgeKind::Service, svc.to_string())),
    );
    badges
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalTier {
    Strong,
    Medium,
    Weak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SignalBar {
    pub percent: u8,
    pub tier: SignalTier,
}

impl SignalBar {
    /// Maps -100 dBm..-40 dBm onto 0..100 %.
    pub fn from_rssi(rssi: i32) -> Self {
        let pct = ((f64::from(rssi) + 100.0) / 60.0 * 100.0).clamp(0.0, 100.0);
        let tier = if pct > 60.0 {
            SignalTier::Strong
        } else if pct > 30.0 {
            SignalTier::Medium
        } else {
            SignalTier::Weak
        };
        Self {
            percent: pct.round() as u8,
            tier,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetectedRow {
    pub mac: String,
    pub title: String,
    pub gatt_resolved: bool,
    pub badges: Vec<Badge>,
    pub rssi: i32,
    pub signal: SignalBar,
    pub tx_power: Option<i32>,
    pub intruder: bool,
}

impl DetectedRow {
    pub fn build(record: &DeviceRecord, vendors: &VendorTable, intruder: bool) -> Self {
        let gatt = record.gatt_name.as_deref().filter(|n| !n.is_empty());
        let title = match (gatt, usable_name(record)) {
            (Some(gatt), _) => gatt.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => "Unknown device".to_string(),
        };
        Self {
            mac: record.mac.clone(),
            title,
            gatt_resolved: gatt.is_some(),
            badges: badges_for(record, vendors),
            rssi: record.rssi,
            signal: SignalBar::from_rssi(record.rssi),
            tx_power: record.tx_power(),
            intruder,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Freshness {
    Recent,
    Today,
    Old,
    Never,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LastSeen {
    pub text: String,
    pub freshness: Freshness,
    /// Absolute UTC time for the tooltip
    pub full: Option<String>,
}

impl LastSeen {
    pub fn classify(last_seen: Option<i64>, live: bool, now_unix: i64) -> Self {
        if live {
            return Self {
                text: "🟢 Present now".into(),
                freshness: Freshness::Recent,
                full: None,
            };
        }
        let Some(ts) = last_seen.filter(|ts| *ts != 0) else {
            return Self {
                text: "⚫ Never seen".into(),
                freshness: Freshness::Never,
                full: None,
            };
        };
        let diff = (now_unix - ts).max(0);
        let (text, freshness) = match diff {
            d if d < 60 => (format!("🟢 {d}s ago"), Freshness::Recent),
            d if d < 3_600 => (format!("🟢 {}min ago", d / 60), Freshness::Recent),
            d if d < 86_400 => (format!("🟡 {}h ago", d / 3_600), Freshness::Today),
            d => (format!("🔴 {}d ago", d / 86_400), Freshness::Old),
        };
        Self {
            text,
            freshness,
            full: format_utc(ts),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WhitelistRow {
    pub mac: String,
    pub title: String,
    pub badges: Vec<Badge>,
    pub last_seen: LastSeen,
}

impl WhitelistRow {
    pub fn build(record: &DeviceRecord, vendors: &VendorTable, live: bool, now_unix: i64) -> Self {
        let title = match usable_name(record) {
            Some(name) => name.to_string(),
            None if live => "Detected device".to_string(),
            None => "Authorized device".to_string(),
        };
        Self {
            mac: record.mac.clone(),
            title,
            badges: badges_for(record, vendors),
            last_seen: LastSeen::classify(record.last_seen, live, now_unix),
        }
    }
}

fn usable_name(record: &DeviceRecord) -> Option<&str> {
    record
        .name
        .as_deref()
        .filter(|n| !n.is_empty() && *n != "Unknown")
}

/// `YYYY-MM-DD HH:MM:SS UTC` for a unix timestamp.
pub fn format_utc(ts: i64) -> Option<String> {
    DateTime::from_timestamp(ts, 0).map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(mac: &str) -> DeviceRecord {
        DeviceRecord {
            mac: mac.into(),
            rssi: -40,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(-40, 100, SignalTier::Strong)]
    #[case(-20, 100, SignalTier::Strong)]
    #[case(-70, 50, SignalTier::Medium)]
    #[case(-82, 30, SignalTier::Weak)]
    #[case(-110, 0, SignalTier::Weak)]
    fn signal_bar(#[case] rssi: i32, #[case] percent: u8, #[case] tier: SignalTier) {
        assert_eq!(SignalBar::from_rssi(rssi), SignalBar { percent, tier });
    }

    #[rstest]
    #[case(None, false, "⚫ Never seen", Freshness::Never)]
    #[case(Some(0), false, "⚫ Never seen", Freshness::Never)]
    #[case(Some(0), true, "🟢 Present now", Freshness::Recent)]
    #[case(Some(1_000_000 - 42), false, "🟢 42s ago", Freshness::Recent)]
    #[case(Some(1_000_000 - 600), false, "🟢 10min ago", Freshness::Recent)]
    #[case(Some(1_000_000 - 7_300), false, "🟡 2h ago", Freshness::Today)]
    #[case(Some(1_000_000 - 3 * 86_400), false, "🔴 3d ago", Freshness::Old)]
    fn last_seen_tiers(
        #[case] ts: Option<i64>,
        #[case] live: bool,
        #[case] text: &str,
        #[case] freshness: Freshness,
    ) {
        let seen = LastSeen::classify(ts, live, 1_000_000);
        assert_eq!(seen.text, text);
        assert_eq!(seen.freshness, freshness);
    }

    #[test]
    fn utc_formatting() {
        assert_eq!(format_utc(0).as_deref(), Some("1970-01-01 00:00:00 UTC"));
        assert_eq!(format_utc(1_700_000_000).as_deref(), Some("2023-11-14 22:13:20 UTC"));
        assert_eq!(format_utc(951_782_400).as_deref(), Some("2000-02-29 00:00:00 UTC"));
        assert_eq!(format_utc(i64::MAX), None);
    }

    #[test]
    fn detected_title_prefers_gatt_name() {
        let vendors = VendorTable::default();
        let mut rec = record("AA:BB:CC:DD:EE:FF");
        assert_eq!(DetectedRow::build(&rec, &vendors, false).title, "Unknown device");
        rec.name = Some("Unknown".into());
        assert_eq!(DetectedRow::build(&rec, &vendors, false).title, "Unknown device");
        rec.name = Some("Buds".into());
        assert_eq!(DetectedRow::build(&rec, &vendors, false).title, "Buds");
        rec.gatt_name = Some("Galaxy Buds2".into());
        let row = DetectedRow::build(&rec, &vendors, false);
        assert_eq!(row.title, "Galaxy Buds2");
        assert!(row.gatt_resolved);
    }

    #[test]
    fn whitelist_title_fallbacks() {
        let vendors = VendorTable::default();
        let rec = record("AA:BB:CC:DD:EE:FF");
        assert_eq!(WhitelistRow::build(&rec, &vendors, true, 0).title, "Detected device");
        assert_eq!(WhitelistRow::build(&rec, &vendors, false, 0).title, "Authorized device");
    }

    #[test]
    fn badge_order_and_content() {
        let vendors: VendorTable = [("AA:BB:CC".to_string(), "Acme".to_string())]
            .into_iter()
            .collect();
        let rec = DeviceRecord {
            mac: "AA:BB:CC:DD:EE:FF".into(),
            address_type: Some("Static Random".into()),
            appearance: Some(64),
            battery: Some(80),
            mfg_data: Some("4C001219".into()),
            services: Some("180F".into()),
            ..Default::default()
        };
        let badges = badges_for(&rec, &vendors);
        let kinds: Vec<BadgeKind> = badges.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BadgeKind::AddressType,
                BadgeKind::Private,
                BadgeKind::Appearance,
                BadgeKind::Vendor,
                BadgeKind::Battery,
                BadgeKind::Manufacturer,
                BadgeKind::Service,
            ]
        );
        assert_eq!(badges[3].text, "Acme");
        assert_eq!(badges[4].text, "🔋 80%");
        assert_eq!(badges[5].brand, Some(Brand::Apple));
        assert_eq!(badges[6].text, "🔋 Battery");
    }

    #[test]
    fn minimal_record_has_only_address_badge() {
        let badges = badges_for(&record("AA"), &VendorTable::default());
        assert_eq!(badges, vec![Badge::new(BadgeKind::AddressType, "Unknown")]);
    }
}
