//! The send-a-request capability and its blocking `ureq` implementation.
//!
//! # Design
//! The agent never owns sockets. Pooling, timeouts, TLS and any resilience
//! policy (retries, circuit breaking) belong to whatever [`Transport`] the
//! caller injects; the agent only composes blocking calls around it.

use crate::error::BoxError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Sends an [`HttpRequest`] and returns the service's answer.
///
/// A non-2xx status is still a response, not an error; errors are reserved
/// for failures to get an answer at all (bad address, refused connection,
/// unsupported scheme, ...).
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError>;
}

/// [`Transport`] over a blocking [`ureq::Agent`].
///
/// Response bodies are read in full with no size cap unless one is set with
/// [`with_body_limit`](Self::with_body_limit).
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    body_limit: u64,
}

impl UreqTransport {
    /// Transport with ureq defaults, except that 4xx/5xx responses are
    /// returned as data rather than as errors.
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self::from_agent(agent)
    }

    /// Wraps a caller-configured agent (timeouts, proxies, TLS).
    ///
    /// The agent should be built with `http_status_as_error(false)`;
    /// otherwise error statuses surface as transport errors instead of
    /// [`Error::Remote`](crate::Error::Remote).
    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            body_limit: u64::MAX,
        }
    }

    /// Fails any response whose body is longer than `limit` bytes.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        let url = request.url.as_str();
        let headers = &request.headers;

        let mut response = match (request.method, request.body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Head, _) => with_headers(self.agent.head(url), headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Options, _) => with_headers(self.agent.options(url), headers).call(),
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(url), headers).send(&body[..]),
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), headers).send(&body[..]),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
            (HttpMethod::Patch, Some(body)) => with_headers(self.agent.patch(url), headers).send(&body[..]),
            (HttpMethod::Patch, None) => with_headers(self.agent.patch(url), headers).send_empty(),
            (HttpMethod::Other(token), body) => {
                let mut builder = ureq::http::Request::builder().method(token.as_str()).uri(url);
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                let request = builder.body(body.unwrap_or_default())?;
                self.agent.run(request)
            }
        }?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
