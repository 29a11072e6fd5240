//! HTTP client for the radar firmware API.

use crate::devices::{
    AddAllResponse, ClearResponse, DeviceRecord, DevicesResponse, SurveillanceState, VendorTable,
    WhitelistItem,
};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const VENDORS: &str = "/vendors.json";
pub const DEVICES: &str = "/api/devices";
pub const WHITELIST: &str = "/api/whitelist";
pub const WHITELIST_ADD: &str = "/api/whitelist/add";
pub const WHITELIST_REMOVE: &str = "/api/whitelist/remove";
pub const WHITELIST_ADD_ALL: &str = "/api/whitelist/add-all";
pub const WHITELIST_CLEAR: &str = "/api/whitelist/clear";
pub const SURVEILLANCE: &str = "/api/surveillance";
pub const SURVEILLANCE_TOGGLE: &str = "/api/surveillance/toggle";
pub const ALERTS: &str = "/api/alerts";

#[derive(Clone)]
pub struct RadarClient {
    http: reqwest::Client,
    base_url: Arc<String>,
    in_flight: Arc<Mutex<HashSet<&'static str>>>,
}

/// Held while a request to `endpoint` is outstanding.
struct InFlight {
    set: Arc<Mutex<HashSet<&'static str>>>,
    endpoint: &'static str,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.endpoint);
    }
}

impl RadarClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::http("client", err))?;
        Ok(Self {
            http,
            base_url: Arc::new(base_url.trim_end_matches('/').to_string()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn vendors(&self) -> Result<VendorTable> {
        self.get_json(VENDORS).await
    }

    pub async fn devices(&self) -> Result<DevicesResponse> {
        self.get_json(DEVICES).await
    }

    pub async fn whitelist(&self) -> Result<Vec<DeviceRecord>> {
        let items: Vec<WhitelistItem> = self.get_json(WHITELIST).await?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    pub async fn surveillance(&self) -> Result<bool> {
        let state: SurveillanceState = self.get_json(SURVEILLANCE).await?;
        Ok(state.active)
    }

    pub async fn toggle_surveillance(&self) -> Result<bool> {
        let state: SurveillanceState = self.post_json(SURVEILLANCE_TOGGLE).await?;
        Ok(state.active)
    }

    /// MACs the radar itself has already alerted on.
    pub async fn alerts(&self) -> Result<Vec<String>> {
        self.get_json(ALERTS).await
    }

    pub async fn add_to_whitelist(&self, mac: &str) -> Result<()> {
        self.post_mac(WHITELIST_ADD, mac).await
    }

    pub async fn remove_from_whitelist(&self, mac: &str) -> Result<()> {
        self.post_mac(WHITELIST_REMOVE, mac).await
    }

    pub async fn add_all(&self) -> Result<u32> {
        let resp: AddAllResponse = self.post_json(WHITELIST_ADD_ALL).await?;
        Ok(resp.added)
    }

    pub async fn clear_whitelist(&self) -> Result<u32> {
        let resp: ClearResponse = self.post_json(WHITELIST_CLEAR).await?;
        Ok(resp.removed)
    }

    fn claim(&self, endpoint: &'static str) -> Result<InFlight> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(endpoint) {
            return Err(Error::Busy(endpoint));
        }
        Ok(InFlight {
            set: Arc::clone(&self.in_flight),
            endpoint,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T> {
        let _guard = self.claim(endpoint)?;
        let response = self
            .http
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|err| Error::http(endpoint, err))?;
        decode(endpoint, response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T> {
        let _guard = self.claim(endpoint)?;
        let response = self
            .http
            .post(self.url(endpoint))
            .send()
            .await
            .map_err(|err| Error::http(endpoint, err))?;
        decode(endpoint, response).await
    }

    async fn post_mac(&self, endpoint: &'static str, mac: &str) -> Result<()> {
        let _guard = self.claim(endpoint)?;
        let response = self
            .http
            .post(self.url(endpoint))
            .form(&[("mac", mac)])
            .send()
            .await
            .map_err(|err| Error::http(endpoint, err))?;
        check_status(endpoint, response).await?;
        Ok(())
    }
}

async fn check_status(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Status {
        endpoint,
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(endpoint: &'static str, response: reqwest::Response) -> Result<T> {
    check_status(endpoint, response)
        .await?
        .json::<T>()
        .await
        .map_err(|err| Error::http(endpoint, err))
}


#[cfg(test)]
mod tests {
    use super::fake::{self, Radar};
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> RadarClient {
        RadarClient::new(base, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn reads_every_endpoint() {
        let (base, _radar) = fake::spawn(Radar {
            devices: vec![json!({ "mac": "AA:BB:CC:DD:EE:FF", "rssi": -40 })],
            whitelist: vec![json!("11:22:33:44:55:66")],
            ..Default::default()
        })
        .await;
        let radar = client(&format!("{base}/"));
        assert_eq!(radar.base_url(), base);

        let devices = radar.devices().await.unwrap();
        assert_eq!(devices.version.as_deref(), Some("v11-test"));
        assert_eq!(devices.devices[0].rssi, -40);

        let whitelist = radar.whitelist().await.unwrap();
        assert_eq!(whitelist[0].mac, "11:22:33:44:55:66");

        let vendors = radar.vendors().await.unwrap();
        assert_eq!(vendors.lookup("aa:bb:cc:00:00:00"), Some("Acme Corp"));

        assert!(!radar.surveillance().await.unwrap());
        assert!(radar.toggle_surveillance().await.unwrap());
        assert_eq!(radar.alerts().await.unwrap(), vec!["DE:AD:BE:EF:00:01"]);
    }

    #[tokio::test]
    async fn whitelist_actions_post_forms() {
        let (base, shared) = fake::spawn(Radar {
            devices: vec![json!({ "mac": "AA:BB:CC:DD:EE:FF", "rssi": -40 })],
            ..Default::default()
        })
        .await;
        let radar = client(&base);

        radar.add_to_whitelist("11:22:33:44:55:66").await.unwrap();
        radar.remove_from_whitelist("11:22:33:44:55:66").await.unwrap();
        let err = radar
            .remove_from_whitelist("11:22:33:44:55:66")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status { status: 404, .. }));

        assert_eq!(radar.add_all().await.unwrap(), 1);
        assert_eq!(radar.clear_whitelist().await.unwrap(), 1);

        let posted = shared.lock().unwrap().posted.clone();
        assert_eq!(posted.len(), 3);
        assert_eq!(posted[0], ("add".to_string(), "11:22:33:44:55:66".to_string()));
    }

    #[tokio::test]
    async fn overlapping_requests_to_one_endpoint_are_refused() {
        let (base, _radar) = fake::spawn(Radar {
            slow_devices: true,
            ..Default::default()
        })
        .await;
        let radar = client(&base);

        let slow = {
            let radar = radar.clone();
            tokio::spawn(async move { radar.devices().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = radar.devices().await.unwrap_err();
        assert!(err.is_busy());
        // Other endpoints are unaffected.
        radar.whitelist().await.unwrap();

        slow.await.unwrap().unwrap();
        radar.devices().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_radar_is_an_http_error() {
        let radar = client("http://127.0.0.1:9");
        let err = radar.devices().await.unwrap_err();
        assert!(matches!(err, Error::Http { endpoint: DEVICES, .. }));
        // The guard is released after a failure.
        assert!(!radar.devices().await.unwrap_err().is_busy());
    }
}
