// src/upstream/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{endpoint} request failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("decoding {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("fixture failure: {0}")]
    Scripted(String),

    #[error("building http client: {0}")]
    Client(#[from] reqwest::Error),
}
