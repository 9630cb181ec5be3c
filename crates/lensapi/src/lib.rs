//! Client for the remote explanation and variation service.
//!
//! Both endpoints take JSON with camelCase field names and answer either with
//! their payload or with `{"error": "..."}`.

mod client;
mod wire;

pub use client::ServiceClient;
pub use wire::{
    InterpretRequest, Interpretation, Variation, VariationRequest, VariationSet,
    EXPECTED_VARIATIONS,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid service base url '{0}'")]
    InvalidBaseUrl(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("service returned HTTP {status} for {url}: {snippet}")]
    Status {
        url: String,
        status: u16,
        snippet: String,
    },
    #[error("service error: {0}")]
    Remote(String),
    #[error("unexpected service response ({message}); first 200 bytes: {snippet}")]
    Decode { message: String, snippet: String },
    #[error("expected 3 variations, got {0}")]
    UnexpectedVariationCount(usize),
}
