use std::env;
use std::time::Duration;

pub struct AppConfig {
    pub radar_url: String,
    pub http_bind: String,
    pub poll_interval: Duration,
    pub fade: Duration,
    pub toast_visible: Duration,
    pub toast_fade: Duration,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            radar_url: env_var("RADAR_URL", &defaults.radar_url),
            http_bind: env_var("HTTP_BIND", &defaults.http_bind),
            poll_interval: env_millis("POLL_INTERVAL_MS", defaults.poll_interval),
            fade: env_millis("FADE_MS", defaults.fade),
            toast_visible: env_millis("TOAST_MS", defaults.toast_visible),
            toast_fade: defaults.toast_fade,
            http_timeout: env_millis("HTTP_TIMEOUT_MS", defaults.http_timeout),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            radar_url: "http://192.168.4.1".to_string(),
            http_bind: "0.0.0.0:8080".to_string(),
            poll_interval: Duration::from_millis(3_000),
            fade: Duration::from_millis(600),
            toast_visible: Duration::from_millis(5_000),
            toast_fade: Duration::from_millis(500),
            http_timeout: Duration::from_millis(4_000),
        }
    }
}

fn env_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
