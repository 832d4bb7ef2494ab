//! REST request gateway
//!
//! Every REST call goes through a [`Gateway`]. A gateway never fails with an
//! `Err`: transport problems and undecodable bodies come back as
//! [`RequestResult`] variants so each caller decides whether to retry, log or
//! abort. The gateway itself never retries.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::config::A2fConfig;
use crate::endpoints::{A2fEndpoint, Method};
use crate::error::{A2fError, Result, config_error};

const APPLICATION_JSON: &str = "application/json";

/// Outcome of one REST call
#[derive(Debug, Clone, PartialEq)]
pub enum RequestResult {
    /// Body decoded as JSON.
    Success(Value),
    /// Connection refused, timeout, or non-2xx status.
    TransportError(String),
    /// The server answered but the body is not JSON.
    DecodeError(String),
}

impl RequestResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The `status` field of a JSON object payload, if present
    pub fn status(&self) -> Option<&str> {
        self.payload()?.get("status")?.as_str()
    }

    /// The `message` field of a JSON object payload, if present
    pub fn message(&self) -> Option<&str> {
        self.payload()?.get("message")?.as_str()
    }

    /// Decoded, and not flagged `"status": "ERROR"` by the server
    pub fn is_confirmed(&self) -> bool {
        self.is_success() && !self.status().is_some_and(|s| s.eq_ignore_ascii_case("ERROR"))
    }

    /// Short reason for a non-confirmed result
    pub fn failure_reason(&self) -> String {
        match self {
            Self::Success(value) => self
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("server reported {value}")),
            Self::TransportError(cause) => cause.clone(),
            Self::DecodeError(body) => format!("undecodable body: {body}"),
        }
    }

    /// Convert into the payload, treating a decode failure as an empty result.
    ///
    /// # Errors
    /// Only a transport failure becomes an `Err`.
    pub fn into_payload(self, route: &str) -> Result<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::DecodeError(_) => Ok(Value::Null),
            Self::TransportError(cause) => Err(A2fError::Transport {
                route: route.to_string(),
                cause,
            }),
        }
    }

    /// Like [`into_payload`](Self::into_payload), additionally logging a
    /// server-side `"ERROR"` status. Used by fire-and-forget mutations whose
    /// failure is not fatal to the caller's flow.
    pub fn settle(self, route: &str) -> Result<Value> {
        match &self {
            Self::Success(_) if !self.is_confirmed() => {
                tracing::warn!(route, reason = %self.failure_reason(), "server rejected call");
            }
            Self::DecodeError(_) => {
                tracing::debug!(route, "treating undecodable body as empty result");
            }
            _ => {}
        }
        self.into_payload(route)
    }

    /// Strict conversion: both transport and decode failures are errors
    pub fn into_result(self, route: &str) -> Result<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::DecodeError(body) => Err(A2fError::Decode {
                route: route.to_string(),
                body,
            }),
            Self::TransportError(cause) => Err(A2fError::Transport {
                route: route.to_string(),
                cause,
            }),
        }
    }
}

/// Request/response transport to the headless server
#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn get(&self, route: &str) -> RequestResult;

    async fn post(&self, route: &str, payload: Value) -> RequestResult;

    /// Dispatch a typed endpoint by its method
    async fn send<E: A2fEndpoint>(&self, endpoint: &E) -> RequestResult {
        match E::METHOD {
            Method::Get => self.get(E::PATH).await,
            Method::Post => self.post(E::PATH, endpoint.payload()).await,
        }
    }
}

impl<G: Gateway> Gateway for &G {
    async fn get(&self, route: &str) -> RequestResult {
        (**self).get(route).await
    }

    async fn post(&self, route: &str, payload: Value) -> RequestResult {
        (**self).post(route, payload).await
    }
}

/// JSON-over-HTTP gateway backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpGateway {
    inner: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(config: &A2fConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .parse::<Url>()
            .map_err(|e| config_error("base-url", &e.to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| config_error("http-client", &e.to_string()))?;

        Ok(Self {
            inner: client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, route: &str) -> std::result::Result<Url, String> {
        self.base_url
            .join(route.trim_start_matches('/'))
            .map_err(|e| format!("invalid route {route}: {e}"))
    }

    async fn execute(&self, route: &str, builder: reqwest::RequestBuilder) -> RequestResult {
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(route, error = %e, "API call failed");
                return RequestResult::TransportError(e.to_string());
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(route, error = %e, "failed to read response body");
                return RequestResult::TransportError(e.to_string());
            }
        };

        if !status.is_success() {
            tracing::warn!(route, %status, "API call returned error status");
            return RequestResult::TransportError(format!("HTTP {status}: {body}"));
        }

        decode_body(route, body)
    }
}

impl Gateway for HttpGateway {
    async fn get(&self, route: &str) -> RequestResult {
        let url = match self.url(route) {
            Ok(url) => url,
            Err(e) => return RequestResult::TransportError(e),
        };
        tracing::trace!(%url, "GET");
        self.execute(route, self.inner.get(url)).await
    }

    async fn post(&self, route: &str, payload: Value) -> RequestResult {
        let url = match self.url(route) {
            Ok(url) => url,
            Err(e) => return RequestResult::TransportError(e),
        };
        tracing::trace!(%url, "POST");
        let builder = self
            .inner
            .post(url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .json(&payload);
        self.execute(route, builder).await
    }
}

fn decode_body(route: &str, body: String) -> RequestResult {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => RequestResult::Success(value),
        Err(_) => {
            tracing::warn!(route, "response is not JSON");
            RequestResult::DecodeError(body)
        }
    }
}
