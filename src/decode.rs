//! Advertisement metadata decoders.
//!
//! Everything here turns the raw strings the radar forwards (manufacturer
//! data as hex, service UUID lists, appearance codes) into display hints.
//! The vendor rules are reverse-engineered byte patterns, not a protocol
//! parser: a payload that does not match a rule simply gets no hint.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Brand {
    Apple,
    Microsoft,
    Google,
    Samsung,
    Audio,
    Other,
}

#[derive(Clone, Copy, Debug)]
struct KnownCompany {
    icon: &'static str,
    name: &'static str,
    brand: Brand,
}

lazy_static! {
    static ref KNOWN_MFG: HashMap<&'static str, KnownCompany> = {
        let mut m = HashMap::new();
        m.insert("4C00", KnownCompany { icon: "🍎", name: "Apple", brand: Brand::Apple });
        m.insert("0600", KnownCompany { icon: "🪟", name: "Microsoft", brand: Brand::Microsoft });
        m.insert("E000", KnownCompany { icon: "🔍", name: "Google", brand: Brand::Google });
        m.insert("7500", KnownCompany { icon: "📱", name: "Samsung", brand: Brand::Samsung });
        m.insert("0A00", KnownCompany { icon: "🎧", name: "Sony", brand: Brand::Audio });
        m.insert("1D00", KnownCompany { icon: "🎧", name: "Bose", brand: Brand::Audio });
        m
    };
    static ref KNOWN_SERVICES: HashMap<&'static str, (&'static str, &'static str)> = {
        let mut m = HashMap::new();
        m.insert("180D", ("💓", "Heart rate"));
        m.insert("180F", ("🔋", "Battery"));
        m.insert("180A", ("ℹ️", "Device info"));
        m.insert("1812", ("⌨️", "HID"));
        m.insert("FD6F", ("🦠", "Exposure"));
        m.insert("FE2C", ("🔗", "Fast Pair"));
        m.insert("FE9F", ("📺", "Android TV"));
        m.insert("FEED", ("📍", "Tile"));
        m
    };
    static ref APPEARANCE: HashMap<u16, &'static str> = {
        let mut m = HashMap::new();
        m.insert(64, "📱 Smartphone");
        m.insert(128, "🖥️ Computer");
        m.insert(192, "⌚ Watch/Band");
        m.insert(512, "🌡️ Sensor");
        m.insert(832, "💓 Heart rate");
        m.insert(961, "⌨️ Keyboard");
        m.insert(962, "🖱️ Mouse");
        m.insert(1024, "🎮 Gamepad");
        m.insert(1152, "🖨️ Printer");
        m.insert(2368, "🚲 Cycling");
        m.insert(3136, "🧴 Scale");
        m
    };
}

/// Decoded manufacturer-specific data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MfgBadge {
    /// Company identifier as it appears on the wire (little-endian hex)
    pub company_id: String,
    pub vendor: Option<&'static str>,
    pub icon: &'static str,
    pub brand: Brand,
    pub hints: Vec<&'static str>,
    /// Payload after the company identifier, upper-cased
    pub raw_hex: String,
}

impl fmt::Display for MfgBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor {
            Some(name) => write!(f, "{} {name}", self.icon)?,
            None => write!(f, "{} 0x{}", self.icon, self.company_id)?,
        }
        for hint in &self.hints {
            write!(f, " [{hint}]")?;
        }
        if !self.raw_hex.is_empty() {
            write!(f, " [HEX: {}]", self.raw_hex)?;
        }
        Ok(())
    }
}

/// Decode `mfgId (4 hex chars) + payload`. Returns `None` for absent or too
/// short input.
pub fn decode_manufacturer(input: Option<&str>) -> Option<MfgBadge> {
    let input = input?.trim();
    if input.len() < 4 || !input.is_ascii() {
        return None;
    }
    let upper = input.to_ascii_uppercase();
    let (company_id, raw_hex) = upper.split_at(4);

    let mut hints = Vec::new();
    match company_id {
        "0600" => microsoft_hints(raw_hex, &mut hints),
        "4C00" => apple_hints(raw_hex, &mut hints),
        _ => {}
    }

    let known = KNOWN_MFG.get(company_id);
    Some(MfgBadge {
        company_id: company_id.to_string(),
        vendor: known.map(|k| k.name),
        icon: known.map(|k| k.icon).unwrap_or("🏭"),
        brand: known.map(|k| k.brand).unwrap_or(Brand::Other),
        hints,
        raw_hex: raw_hex.to_string(),
    })
}

fn byte_at(raw: &str, offset: usize) -> Option<&str> {
    raw.get(offset * 2..offset * 2 + 2)
}

// MS-CDP beacon: scenario byte, device type byte, then a flags byte whose
// lowest bit marks Nearby Share visibility.
fn microsoft_hints(raw: &str, hints: &mut Vec<&'static str>) {
    if raw.len() < 4 {
        return;
    }
    if byte_at(raw, 0) == Some("01") {
        let device = match byte_at(raw, 1) {
            Some("01") => Some("🎮 Xbox One"),
            Some("09") => Some("🖥️ PC Desktop"),
            Some("0B") => Some("🎮 Xbox One S"),
            Some("0C") => Some("🎮 Xbox Series X"),
            Some("0D") => Some("🎮 Xbox One X"),
            Some("0E") => Some("📺 Surface Hub"),
            Some("0F") => Some("💻 Surface Pro/Laptop"),
            Some("10") => Some("📱 Windows tablet"),
            _ => None,
        };
        hints.extend(device);
    }
    if raw.len() >= 10 {
        let flags = byte_at(raw, 2).and_then(|b| u8::from_str_radix(b, 16).ok());
        if flags.is_some_and(|f| f & 1 == 1) {
            hints.push("Nearby Share");
        }
    }
}

// Apple Continuity: first byte is the message type. Proximity pairing (0x07)
// carries the model id at byte 3.
fn apple_hints(raw: &str, hints: &mut Vec<&'static str>) {
    let hint = match byte_at(raw, 0) {
        Some("07") if raw.len() >= 8 => Some(match byte_at(raw, 3) {
            Some("0E") => "🎧 AirPods Pro",
            Some("0F") => "🎧 AirPods 2",
            Some("13") => "🎧 AirPods 3",
            Some("0A") => "🎧 AirPods Max",
            _ => "🎧 AirPods/Beats",
        }),
        Some("12") => Some("📍 AirTag"),
        Some("05") => Some("📡 AirDrop"),
        Some("10") => Some("🤝 Handoff"),
        Some("09") => Some("📺 AirPlay"),
        Some("02") => Some("📡 iBeacon"),
        _ => None,
    };
    hints.extend(hint);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceBadge {
    pub short_id: String,
    pub icon: &'static str,
    pub label: Option<&'static str>,
}

impl fmt::Display for ServiceBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{} {label}", self.icon),
            None => write!(f, "🧩 {}", self.short_id),
        }
    }
}

/// Decode a comma separated service UUID list. Full 128-bit UUIDs are
/// assumed to follow the Bluetooth SIG base layout (`0000XXXX-...`).
pub fn decode_services(input: Option<&str>) -> Vec<ServiceBadge> {
    let Some(input) = input else {
        return Vec::new();
    };
    input
        .split(',')
        .map(str::trim)
        .filter(|uuid| !uuid.is_empty())
        .map(|uuid| {
            let short = match uuid.get(4..8) {
                Some(s) if uuid.len() >= 8 => s,
                _ => uuid,
            };
            let short_id = short.to_uppercase();
            let known = KNOWN_SERVICES.get(short_id.as_str());
            ServiceBadge {
                icon: known.map(|(icon, _)| *icon).unwrap_or("🧩"),
                label: known.map(|(_, label)| *label),
                short_id,
            }
        })
        .collect()
}

pub fn appearance_label(code: Option<u16>) -> Option<&'static str> {
    code.and_then(|c| APPEARANCE.get(&c).copied())
}

/// Random and resolvable-private address types rotate, so a MAC alone is
/// not a stable identity for them.
pub fn is_private_address(address_type: Option<&str>) -> bool {
    address_type.is_some_and(|t| t.to_ascii_lowercase().contains("random"))
}
