//! Error types shared by the radar client and the web front.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure or undecodable body
    #[error("Request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The radar answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// A previous request to the same endpoint is still outstanding
    #[error("{0} already has a request in flight")]
    Busy(&'static str),

    /// Manually entered MAC address that does not match `AA:BB:CC:DD:EE:FF`
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
}

impl Error {
    pub fn http(endpoint: &'static str, source: reqwest::Error) -> Self {
        Self::Http { endpoint, source }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
