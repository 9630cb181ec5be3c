use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::wire::{ApiError, InterpretRequest, Interpretation, VariationRequest, VariationSet};
use crate::ServiceError;

const SNIPPET_CHARS: usize = 200;

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}

/// Blocking client for the explanation and variation endpoints.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base: Url,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let base =
            Url::parse(base_url).map_err(|_| ServiceError::InvalidBaseUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ServiceError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ServiceError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `POST {base}/interpret`.
    pub fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation, ServiceError> {
        debug!(lines = ?request.line_indices, "requesting interpretation");
        self.post("interpret", request)
    }

    /// `POST {base}/variations`. A count other than three is logged, not
    /// rejected.
    pub fn variations(&self, request: &VariationRequest) -> Result<VariationSet, ServiceError> {
        debug!(value = %request.param_value, line = request.line_index, "requesting variations");
        let set: VariationSet = self.post("variations", request)?;
        if let Err(err) = set.check_count() {
            warn!(%err, param = %set.param_name, "variation service returned an unusual count");
        }
        Ok(set)
    }

    fn endpoint(&self, name: &str) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    fn post<Req, Resp>(&self, name: &str, body: &Req) -> Result<Resp, ServiceError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(name)?;
        let transport = |source: reqwest::Error| ServiceError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .map_err(transport)?;
        let status = response.status();
        let text = response.text().map_err(transport)?;

        if status.is_success() {
            // Try to decode the happy path first.
            match serde_json::from_str::<Resp>(&text) {
                Ok(payload) => return Ok(payload),
                Err(err) => {
                    if let Ok(remote) = serde_json::from_str::<ApiError>(&text) {
                        return Err(ServiceError::Remote(remote.error));
                    }
                    return Err(ServiceError::Decode {
                        message: err.to_string(),
                        snippet: snippet(&text),
                    });
                }
            }
        }

        if let Ok(remote) = serde_json::from_str::<ApiError>(&text) {
            return Err(ServiceError::Remote(remote.error));
        }
        Err(ServiceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            snippet: snippet(&text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_extend_the_base_path() {
        let client =
            ServiceClient::new("http://localhost:3001/api", Duration::from_secs(1)).expect("client");
        assert_eq!(
            client.endpoint("interpret").expect("url").as_str(),
            "http://localhost:3001/api/interpret"
        );

        let client =
            ServiceClient::new("http://localhost:3001/api/", Duration::from_secs(1)).expect("client");
        assert_eq!(
            client.endpoint("variations").expect("url").as_str(),
            "http://localhost:3001/api/variations"
        );
    }

    #[test]
    fn rejects_non_http_base() {
        for base in ["localhost:3001", "ftp://example.com", "not a url"] {
            let err = ServiceClient::new(base, Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidBaseUrl(_)), "{base}");
        }
    }
}
