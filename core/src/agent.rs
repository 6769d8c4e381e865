//! Dual-role authenticated request dispatch.
//!
//! # Design
//! The [`Agent`] routes every request by HTTP method alone: `GET` goes to the
//! slave (replica) endpoint with the slave role's token, every other method
//! goes to the master (primary) endpoint with the master role's token. A
//! read issued right after a write may therefore see replica lag.
//!
//! Each call is a straight line of blocking steps: shape checks, token
//! minting, [`Transport::send`], and (for the `*_json` variants) response
//! normalization. The agent holds no mutable state after construction, so a
//! single instance can be cloned and shared across threads freely.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::http::{
    HttpMethod, HttpRequest, HttpResponse, AUTHORIZATION, CONTENT_TYPE, PREFER,
    RETURN_REPRESENTATION,
};
use crate::query::{build_url, Query};
use crate::response::{decode_json, expect_success, JsonResponse};
use crate::token::{Claims, TokenSigner};
use crate::transport::Transport;

/// Which backend (and which role's identity) a request is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The primary, write-capable backend.
    Master,
    /// The read replica.
    Slave,
}

impl Endpoint {
    /// `GET` reads from the slave; every other method, including extension
    /// methods, goes to the master.
    pub fn for_method(method: &HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Endpoint::Slave,
            _ => Endpoint::Master,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Master => "master",
            Endpoint::Slave => "slave",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for a PostgREST deployment split into master and slave endpoints.
#[derive(Clone)]
pub struct Agent {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    signer: Arc<dyn TokenSigner>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("master_base_url", &self.config.master_base_url)
            .field("slave_base_url", &self.config.slave_base_url)
            .finish_non_exhaustive()
    }
}

/// Collects an [`Agent`]'s configuration and capabilities.
#[derive(Default)]
pub struct AgentBuilder {
    config: Option<AgentConfig>,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn TokenSigner>>,
}

impl AgentBuilder {
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(self, transport: impl Transport + 'static) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn signer(self, signer: impl TokenSigner + 'static) -> Self {
        self.shared_signer(Arc::new(signer))
    }

    pub fn shared_signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Validates everything and returns the agent.
    ///
    /// Fails with [`Error::MissingConfig`], [`Error::MissingTransport`] or
    /// [`Error::MissingSigner`] (checked in that order) when a part was never
    /// supplied, and with [`Error::InvalidConfig`] listing every bad field.
    pub fn build(self) -> Result<Agent> {
        let config = self.config.ok_or(Error::MissingConfig)?;
        let transport = self.transport.ok_or(Error::MissingTransport)?;
        let signer = self.signer.ok_or(Error::MissingSigner)?;
        config.validate()?;
        Ok(Agent {
            config,
            transport,
            signer,
        })
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    pub fn new(
        config: AgentConfig,
        transport: impl Transport + 'static,
        signer: impl TokenSigner + 'static,
    ) -> Result<Self> {
        Agent::builder()
            .config(config)
            .transport(transport)
            .signer(signer)
            .build()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Builds an authorized request for a full URL.
    ///
    /// The URL and method are checked before any token is minted: an empty
    /// `url` is [`Error::MissingUrl`], an empty `method` is
    /// [`Error::MissingMethod`]. Any other method token is accepted, only
    /// exactly `GET` reads from the slave. The token comes from the role
    /// [`Endpoint::for_method`] picks; signing failures are returned as
    /// [`Error::Signing`].
    pub fn new_request(&self, method: &str, url: &str, body: Option<Vec<u8>>) -> Result<HttpRequest> {
        if url.is_empty() {
            return Err(Error::MissingUrl);
        }
        let method: HttpMethod = method.parse()?;
        let url = Url::parse(url).map_err(|source| Error::MalformedUrl {
            url: url.to_string(),
            source,
        })?;
        self.authorize(method, url, body)
    }

    /// Sends a request built by [`new_request`](Self::new_request) or by hand.
    pub fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).map_err(Error::Transport)
    }

    /// `GET`s rows of `table` from the slave.
    ///
    /// Pagination and filtering go in `query`, e.g. `limit=10`, `offset=20`
    /// or `id=eq.5`.
    pub fn get(&self, table: &str, query: Option<&Query>) -> Result<HttpResponse> {
        let url = self.table_url(Endpoint::Slave, table, query)?;
        self.dispatch(HttpMethod::Get, url, None)
    }

    /// [`get`](Self::get), decoding the rows into `T`.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Option<&Query>,
    ) -> Result<JsonResponse<T>> {
        let url = self.table_url(Endpoint::Slave, table, query)?;
        let response = self.dispatch(HttpMethod::Get, url.clone(), None)?;
        decode_json(HttpMethod::Get, &url, response)
    }

    /// `POST`s an already-serialized body to `table` on the master.
    pub fn post(&self, table: &str, body: impl Into<Vec<u8>>) -> Result<HttpResponse> {
        let url = self.table_url(Endpoint::Master, table, None)?;
        self.dispatch(HttpMethod::Post, url, Some(body.into()))
    }

    /// [`post`](Self::post) asking the service to answer with the created
    /// rows (`Prefer: return=representation`).
    pub fn post_and_return(&self, table: &str, body: impl Into<Vec<u8>>) -> Result<HttpResponse> {
        let url = self.table_url(Endpoint::Master, table, None)?;
        let request = with_representation(self.authorize(HttpMethod::Post, url, Some(body.into()))?);
        self.send_logged(request)
    }

    /// Serializes `payload` as JSON and `POST`s it, returning the status.
    pub fn post_json<P: Serialize + ?Sized>(&self, table: &str, payload: &P) -> Result<u16> {
        let body = encode(payload)?;
        let url = self.table_url(Endpoint::Master, table, None)?;
        let response = self.dispatch(HttpMethod::Post, url.clone(), Some(body))?;
        expect_success(HttpMethod::Post, &url, response)
    }

    /// Serializes `payload` as JSON, `POST`s it with
    /// `Prefer: return=representation` and decodes the created rows into `T`.
    pub fn post_json_and_return<P, T>(&self, table: &str, payload: &P) -> Result<JsonResponse<T>>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(payload)?;
        let url = self.table_url(Endpoint::Master, table, None)?;
        let request = with_representation(self.authorize(HttpMethod::Post, url.clone(), Some(body))?);
        let response = self.send_logged(request)?;
        decode_json(HttpMethod::Post, &url, response)
    }

    /// `PATCH`es the rows of `table` selected by `query` on the master.
    pub fn patch(&self, table: &str, query: Option<&Query>, body: impl Into<Vec<u8>>) -> Result<HttpResponse> {
        let url = self.table_url(Endpoint::Master, table, query)?;
        self.dispatch(HttpMethod::Patch, url, Some(body.into()))
    }

    /// Serializes `payload` as JSON and `PATCH`es it, returning the status.
    pub fn patch_json<P: Serialize + ?Sized>(
        &self,
        table: &str,
        query: Option<&Query>,
        payload: &P,
    ) -> Result<u16> {
        let body = encode(payload)?;
        let url = self.table_url(Endpoint::Master, table, query)?;
        let response = self.dispatch(HttpMethod::Patch, url.clone(), Some(body))?;
        expect_success(HttpMethod::Patch, &url, response)
    }

    /// `DELETE`s the rows of `table` selected by `query` on the master.
    pub fn delete(&self, table: &str, query: Option<&Query>) -> Result<HttpResponse> {
        let url = self.table_url(Endpoint::Master, table, query)?;
        self.dispatch(HttpMethod::Delete, url, None)
    }

    /// [`delete`](Self::delete), returning only the status.
    pub fn delete_json(&self, table: &str, query: Option<&Query>) -> Result<u16> {
        let url = self.table_url(Endpoint::Master, table, query)?;
        let response = self.dispatch(HttpMethod::Delete, url.clone(), None)?;
        expect_success(HttpMethod::Delete, &url, response)
    }

    /// Checks the master and then the slave answer a `GET` on their base URL
    /// with a 2xx status.
    ///
    /// Stops at the first failure, reported as [`Error::Unhealthy`] naming
    /// the endpoint; the slave is not contacted when the master fails.
    pub fn ping(&self) -> Result<()> {
        for endpoint in [Endpoint::Master, Endpoint::Slave] {
            if let Err(err) = self.probe(self.config.base_url(endpoint)) {
                tracing::warn!(%endpoint, %err, "postgrest endpoint failed health check");
                return Err(Error::Unhealthy {
                    endpoint,
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }

    fn probe(&self, base_url: &str) -> Result<()> {
        let request = self.new_request(HttpMethod::Get.as_str(), base_url, None)?;
        let url = request.url.clone();
        let response = self.send_logged(request)?;
        expect_success(HttpMethod::Get, &url, response).map(|_| ())
    }

    fn table_url(&self, endpoint: Endpoint, table: &str, query: Option<&Query>) -> Result<Url> {
        build_url(self.config.base_url(endpoint), table, query)
    }

    fn dispatch(&self, method: HttpMethod, url: Url, body: Option<Vec<u8>>) -> Result<HttpResponse> {
        let request = self.authorize(method, url, body)?;
        self.send_logged(request)
    }

    /// Attaches the bearer token for `method`'s role.
    fn authorize(&self, method: HttpMethod, url: Url, body: Option<Vec<u8>>) -> Result<HttpRequest> {
        let endpoint = Endpoint::for_method(&method);
        let token = self.mint_token(endpoint)?;

        let mut headers = vec![(AUTHORIZATION.to_string(), format!("Bearer {token}"))];
        if body.is_some() {
            headers.push((CONTENT_TYPE.to_string(), "application/json".to_string()));
        }
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    fn mint_token(&self, endpoint: Endpoint) -> Result<String> {
        let claims = Claims::for_role(
            self.config.role(endpoint),
            &self.config.issuer,
            self.config.token_lifetime(),
        );
        self.signer
            .sign(&claims, self.config.secret(endpoint))
            .map_err(Error::Signing)
    }

    fn send_logged(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method.clone();
        let url = request.url.to_string();
        tracing::debug!(%method, %url, role = %Endpoint::for_method(&method), "sending postgrest request");
        let response = self.send(request)?;
        tracing::debug!(%method, %url, status = response.status, "postgrest responded");
        Ok(response)
    }
}

fn with_representation(mut request: HttpRequest) -> HttpRequest {
    request
        .headers
        .push((PREFER.to_string(), RETURN_REPRESENTATION.to_string()));
    request
}

fn encode<P: Serialize + ?Sized>(payload: &P) -> Result<Vec<u8>> {
    serde_json::to_vec(payload).map_err(Error::Encode)
}
