use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transmit power value the firmware uses when the advertisement had none.
pub const TX_POWER_ABSENT: i32 = -999;

/// One advertiser as reported by `/api/devices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceRecord {
    pub mac: String,
    pub rssi: i32,
    pub address_type: Option<String>,
    pub name: Option<String>,
    pub gatt_name: Option<String>,
    pub vendor: Option<String>,
    pub appearance: Option<u16>,
    pub battery: Option<i32>,
    pub mfg_data: Option<String>,
    pub services: Option<String>,
    pub tx_power: Option<i32>,
    pub whitelisted: bool,
    pub last_seen: Option<i64>,
    pub live: Option<bool>,
}

impl DeviceRecord {
    pub fn tx_power(&self) -> Option<i32> {
        self.tx_power.filter(|p| *p != TX_POWER_ABSENT && *p != 0)
    }

    pub fn battery(&self) -> Option<u8> {
        self.battery
            .filter(|b| *b >= 0)
            .map(|b| b.min(100) as u8)
    }

    /// Name to show in toasts: GATT-resolved name first, then the advertised one.
    pub fn alert_name(&self) -> String {
        [self.gatt_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or("Unknown device")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// `/api/whitelist` answers with bare MAC strings on old firmware and with
/// metadata objects on newer builds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WhitelistItem {
    Mac(String),
    Entry(DeviceRecord),
}

impl From<WhitelistItem> for DeviceRecord {
    fn from(item: WhitelistItem) -> Self {
        match item {
            WhitelistItem::Mac(mac) => DeviceRecord {
                mac,
                whitelisted: true,
                ..Default::default()
            },
            WhitelistItem::Entry(mut record) => {
                record.whitelisted = true;
                record
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SurveillanceState {
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AddAllResponse {
    pub added: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClearResponse {
    pub removed: u32,
}

/// OUI prefix (`AA:BB:CC`) to vendor name, as served by `/vendors.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct VendorTable {
    prefixes: HashMap<String, String>,
}

impl VendorTable {
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn lookup(&self, mac: &str) -> Option<&str> {
        let prefix = mac.get(..8)?.to_ascii_uppercase();
        self.prefixes.get(&prefix).map(String::as_str)
    }

    /// Vendor reported by the radar unless it is a placeholder, else the
    /// OUI table entry.
    pub fn resolve<'a>(&'a self, record: &'a DeviceRecord) -> Option<&'a str> {
        match record.vendor.as_deref() {
            Some(v) if !v.is_empty() && v != "N/A" => Some(v),
            _ => self.lookup(&record.mac),
        }
    }
}

impl FromIterator<(String, String)> for VendorTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            prefixes: iter
                .into_iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v))
                .collect(),
        }
    }
}

pub fn parse_mac(input: &str) -> Option<[u8; 6]> {
    let cleaned: String = input.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if cleaned.len() != 12 {
        return None;
    }
    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let idx = i * 2;
        *byte = u8::from_str_radix(&cleaned[idx..idx + 2], 16).ok()?;
    }
    Some(bytes)
}

/// Validate a MAC typed by hand: six hex pairs separated by `:` or `-`.
/// The result is trimmed and upper-cased, separators are kept as typed.
pub fn normalize_manual_mac(input: &str) -> Result<String> {
    let mac = input.trim().to_ascii_uppercase();
    let bytes = mac.as_bytes();
    let well_formed = bytes.len() == 17
        && bytes.iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                *b == b':' || *b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        });
    if well_formed {
        Ok(mac)
    } else {
        Err(Error::InvalidMac(input.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn device_record_from_firmware_json() {
        let json = r#"{
            "mac": "AA:BB:CC:DD:EE:FF", "name": "Pixel", "rssi": -61,
            "vendor": "N/A", "addressType": "Public (Fixe)", "txPower": -999,
            "services": "0000180f-0000-1000-8000-00805f9b34fb", "mfgData": "E00001",
            "appearance": 64, "gattName": "", "battery": -1, "whitelisted": false
        }"#;
        let record: DeviceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.rssi, -61);
        assert_eq!(record.tx_power(), None);
        assert_eq!(record.battery(), None);
        assert_eq!(record.appearance, Some(64));
        assert_eq!(record.alert_name(), "Pixel");
        assert!(!record.whitelisted);
    }

    #[test]
    fn whitelist_accepts_both_shapes() {
        let json = r#"["11:22:33:44:55:66", {"mac": "AA:BB:CC:DD:EE:FF", "name": "Watch", "lastSeen": 1700000000, "live": false}]"#;
        let items: Vec<WhitelistItem> = serde_json::from_str(json).unwrap();
        let records: Vec<DeviceRecord> = items.into_iter().map(Into::into).collect();
        assert_eq!(records[0].mac, "11:22:33:44:55:66");
        assert_eq!(records[0].last_seen, None);
        assert_eq!(records[1].name.as_deref(), Some("Watch"));
        assert_eq!(records[1].last_seen, Some(1_700_000_000));
        assert!(records.iter().all(|r| r.whitelisted));
    }

    #[test]
    fn vendor_resolution_prefers_radar_value() {
        let table: VendorTable = [("aa:bb:cc".to_string(), "Acme".to_string())]
            .into_iter()
            .collect();
        let mut record = DeviceRecord {
            mac: "aa:bb:cc:00:11:22".into(),
            vendor: Some("N/A".into()),
            ..Default::default()
        };
        assert_eq!(table.resolve(&record), Some("Acme"));
        record.vendor = Some("Nordic".into());
        assert_eq!(table.resolve(&record), Some("Nordic"));
        record.mac = "01".into();
        record.vendor = None;
        assert_eq!(table.resolve(&record), None);
    }

    #[test]
    fn alert_name_fallbacks() {
        let mut record = DeviceRecord::default();
        assert_eq!(record.alert_name(), "Unknown device");
        record.name = Some("Buds".into());
        record.gatt_name = Some("Galaxy Buds".into());
        assert_eq!(record.alert_name(), "Galaxy Buds");
    }

    #[rstest]
    #[case(" aa:bb:cc:dd:ee:ff ", Some("AA:BB:CC:DD:EE:FF"))]
    #[case("AA-BB-CC-DD-EE-FF", Some("AA-BB-CC-DD-EE-FF"))]
    #[case("AABBCCDDEEFF", None)]
    #[case("AA:BB:CC:DD:EE", None)]
    #[case("AA:BB:CC:DD:EE:FG", None)]
    #[case("AA.BB.CC.DD.EE.FF", None)]
    fn manual_mac_validation(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_manual_mac(input).ok().as_deref(), expected);
    }

    #[test]
    fn loose_mac_parsing() {
        assert_eq!(
            parse_mac("aa-bb-cc-dd-ee-0f"),
            Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x0F])
        );
        assert_eq!(parse_mac("aa:bb"), None);
    }
}
