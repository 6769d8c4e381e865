//! Error type for the PostgREST agent.
//!
//! # Design
//! Every failure the agent can produce is a variant of [`Error`], grouped by
//! when it is detected: configuration and construction problems surface from
//! [`AgentBuilder::build`](crate::AgentBuilder::build), request-shape problems
//! before any signing or I/O, and the remaining variants while dispatching.
//! Signing and transport failures come from injected capabilities and are
//! carried as boxed errors so their messages reach the caller unchanged.

use crate::agent::Endpoint;
use crate::http::HttpMethod;
use crate::response::INTERNAL_ERROR_STATUS;

/// Boxed error returned by the injected [`Transport`](crate::Transport) and
/// [`TokenSigner`](crate::TokenSigner) capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("postgrest error: missing config parameter")]
    MissingConfig,

    /// One or more required configuration fields are empty or not positive.
    #[error("postgrest error: invalid config parameters: \n- {}", .fields.join("\n- "))]
    InvalidConfig { fields: Vec<&'static str> },

    #[error("postgrest error: configuration file not found: {path}")]
    ConfigFileNotFound { path: String },

    #[error("postgrest error: failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("postgrest error: missing transport")]
    MissingTransport,

    #[error("postgrest error: missing token signer")]
    MissingSigner,

    #[error("postgrest error: missing request url")]
    MissingUrl,

    #[error("postgrest error: missing request method")]
    MissingMethod,

    /// The method is not a valid HTTP token.
    #[error("postgrest error: invalid request method {0:?}")]
    InvalidMethod(String),

    #[error("postgrest error: table name not specified in request")]
    MissingPath,

    /// The configured base URL of an endpoint could not be parsed.
    #[error("parse {base}: {source}")]
    MalformedBase {
        base: String,
        #[source]
        source: url::ParseError,
    },

    /// A full request URL handed to the agent could not be parsed.
    #[error("parse {url}: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("postgrest error: failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("postgrest error: missing 'role' in postgrest claims")]
    MissingRole,

    #[error("postgrest error: invalid 'exp' in postgrest claims")]
    ExpiredClaims,

    #[error("{0}")]
    Signing(#[source] BoxError),

    #[error("{0}")]
    Transport(#[source] BoxError),

    /// The service answered outside the 2xx range.
    #[error("postgrest error ({method} {url}): {status} {reason}")]
    Remote {
        method: HttpMethod,
        url: String,
        status: u16,
        reason: String,
    },

    /// A 2xx body could not be decoded into the requested type.
    #[error("postgrest error: failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{endpoint} service error: {source}")]
    Unhealthy {
        endpoint: Endpoint,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// HTTP status to report for this failure, if it has one.
    ///
    /// Remote failures carry the service's status. Decode failures report
    /// [`INTERNAL_ERROR_STATUS`] because the fault is local, even though the
    /// service answered with a success code.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            Error::Decode(_) => Some(INTERNAL_ERROR_STATUS),
            Error::Unhealthy { source, .. } => source.status(),
            _ => None,
        }
    }
}
