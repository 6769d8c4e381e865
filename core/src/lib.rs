//! Authenticated client for PostgREST deployments with a primary and a
//! read replica.
//!
//! # Overview
//! An [`Agent`] sends reads (`GET`) to the slave endpoint under the slave
//! role and every other method to the master endpoint under the master role,
//! minting a short-lived bearer token for each request. Responses come back
//! raw, or through the `*_json` variants that check the status and decode
//! the body.
//!
//! # Design
//! - Sending and signing are capabilities injected at construction
//!   ([`Transport`], [`TokenSigner`]), so tests and callers can swap in their
//!   own. [`UreqTransport`] and [`JwtSigner`] are the bundled defaults.
//! - No retries, pooling policy or circuit breaking live here; wrap the
//!   transport for that.
//! - All failures are [`Error`] values.
//!
//! ```no_run
//! use std::time::Duration;
//! use pgrest_core::{Agent, AgentConfig, JwtSigner, Query, UreqTransport};
//!
//! # fn main() -> pgrest_core::Result<()> {
//! let config = AgentConfig::default()
//!     .with_master("http://pg-primary:3000", "writer", "primary-secret")
//!     .with_slave("http://pg-replica:3000", "reader", "replica-secret")
//!     .with_token_lifetime(Duration::from_secs(30));
//! let agent = Agent::new(config, UreqTransport::new(), JwtSigner::hs256())?;
//!
//! let mut query = Query::new();
//! query.set("id", "eq.5").set("select", "id,name");
//! let rows = agent.get_json::<Vec<serde_json::Value>>("people", Some(&query))?;
//! println!("{} -> {:?}", rows.status, rows.body);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod response;
pub mod token;
pub mod transport;

pub use agent::{Agent, AgentBuilder, Endpoint};
pub use config::AgentConfig;
pub use error::{BoxError, Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::{build_url, Query};
pub use response::{decode_json, expect_success, is_success, JsonResponse, INTERNAL_ERROR_STATUS};
pub use token::{Claims, JwtSigner, TokenSigner};
pub use transport::{Transport, UreqTransport};
