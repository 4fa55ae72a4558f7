//! Check-in request type and HTTP attestor.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `{endpoint}` | Report `{nodeId, version, tier, org}` for the license in the bearer header |

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use helm_core::{LicenseId, NodeId};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CheckInError;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Longest response body excerpt kept in a `Rejected` error.
const MAX_BODY_EXCERPT: usize = 512;

/// Body of a check-in `POST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub node_id: NodeId,
    pub version: String,
    pub tier: String,
    pub org: String,
}

/// Performs one check-in.
///
/// `credential` is sent as the bearer token. Implementations must bound
/// their own latency; the scheduler relies on a failure arriving in time.
pub trait Attestor: Send + Sync + std::fmt::Debug {
    fn check_in<'a>(
        &'a self,
        credential: &'a LicenseId,
        request: &'a CheckInRequest,
    ) -> BoxFuture<'a, Result<(), CheckInError>>;
}

/// reqwest-backed attestor.
#[derive(Debug, Clone)]
pub struct HttpAttestor {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpAttestor {
    /// Build an attestor posting to `endpoint`. `timeout` bounds each
    /// request end to end.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, CheckInError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CheckInError::ClientInit)?;
        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(
        &self,
        credential: &LicenseId,
        request: &CheckInRequest,
    ) -> Result<(), CheckInError> {
        let endpoint = format!("POST {}", self.endpoint);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| CheckInError::InvalidCredential)?;
        bearer.set_sensitive(true);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, bearer)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_BODY_EXCERPT {
                let mut cut = MAX_BODY_EXCERPT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(CheckInError::Rejected {
                endpoint,
                status,
                body,
            });
        }

        tracing::debug!(endpoint = %self.endpoint, node_id = %request.node_id, "check-in accepted");
        Ok(())
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> CheckInError {
        if e.is_timeout() {
            CheckInError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            CheckInError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            }
        }
    }
}

impl Attestor for HttpAttestor {
    fn check_in<'a>(
        &'a self,
        credential: &'a LicenseId,
        request: &'a CheckInRequest,
    ) -> BoxFuture<'a, Result<(), CheckInError>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.post(credential, request)).await {
                Ok(result) => result,
                Err(_) => Err(CheckInError::Timeout {
                    endpoint: format!("POST {}", self.endpoint),
                    timeout_secs: self.timeout.as_secs(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let req = CheckInRequest {
            node_id: NodeId::new("node-1").unwrap(),
            version: "0.1.0".to_string(),
            tier: "enterprise".to_string(),
            org: "Acme".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "nodeId": "node-1",
                "version": "0.1.0",
                "tier": "enterprise",
                "org": "Acme",
            })
        );
    }

    #[test]
    fn attestor_is_object_safe() {
        fn _assert(_: &dyn Attestor) {}
    }

    #[test]
    fn error_accessors() {
        let rejected = CheckInError::Rejected {
            endpoint: "POST x".to_string(),
            status: 403,
            body: String::new(),
        };
        assert_eq!(rejected.status(), Some(403));
        assert!(!rejected.is_timeout());
        let timeout = CheckInError::Timeout {
            endpoint: "POST x".to_string(),
            timeout_secs: 10,
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.status(), None);
    }
}
