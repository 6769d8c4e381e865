//! Connection settings for the master and slave PostgREST endpoints.
//!
//! Settings can be built in code, or loaded from a YAML file with
//! `PGREST_`-prefixed environment variables taking precedence:
//!
//! ```yaml
//! issuer: billing
//! master_base_url: http://pg-primary:3000
//! master_role: writer
//! master_secret: change-me
//! slave_base_url: http://pg-replica:3000
//! slave_role: reader
//! slave_secret: change-me-too
//! timeout: 30
//! ```
//!
//! `PGREST_MASTER_SECRET=...` overrides `master_secret`, and so on.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::agent::Endpoint;
use crate::error::{Error, Result};

const ENV_PREFIX: &str = "PGREST";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Value of the `iss` claim. Optional.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(default)]
    pub master_base_url: String,
    #[serde(default)]
    pub master_role: String,
    #[serde(default)]
    pub master_secret: String,
    #[serde(default)]
    pub slave_base_url: String,
    #[serde(default)]
    pub slave_role: String,
    #[serde(default)]
    pub slave_secret: String,
    /// Token lifetime in seconds.
    #[serde(default, rename = "timeout")]
    pub timeout_secs: u64,
}

type Check = (&'static str, fn(&AgentConfig) -> bool);

/// Required fields, in the order they are reported.
const REQUIRED: &[Check] = &[
    ("master_base_url", |c| !c.master_base_url.is_empty()),
    ("master_role", |c| !c.master_role.is_empty()),
    ("master_secret", |c| !c.master_secret.is_empty()),
    ("slave_base_url", |c| !c.slave_base_url.is_empty()),
    ("slave_role", |c| !c.slave_role.is_empty()),
    ("slave_secret", |c| !c.slave_secret.is_empty()),
    ("timeout", |c| c.timeout_secs > 0),
];

impl AgentConfig {
    /// Loads a YAML file, then applies `PGREST_*` environment overrides.
    ///
    /// The result is not validated; [`AgentBuilder::build`](crate::AgentBuilder::build)
    /// does that, so partial files can be completed in code first.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigFileNotFound {
                path: path.display().to_string(),
            });
        }
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Reads every field from `PGREST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let config = Config::builder().add_source(environment()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Fails with [`Error::InvalidConfig`] naming every required field that
    /// is empty (or, for `timeout`, zero).
    pub fn validate(&self) -> Result<()> {
        let fields: Vec<&'static str> = REQUIRED
            .iter()
            .filter(|(_, is_set)| !is_set(self))
            .map(|(name, _)| *name)
            .collect();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig { fields })
        }
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_url(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Master => &self.master_base_url,
            Endpoint::Slave => &self.slave_base_url,
        }
    }

    pub fn role(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Master => &self.master_role,
            Endpoint::Slave => &self.slave_role,
        }
    }

    pub(crate) fn secret(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Master => &self.master_secret,
            Endpoint::Slave => &self.slave_secret,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_master(
        mut self,
        base_url: impl Into<String>,
        role: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.master_base_url = base_url.into();
        self.master_role = role.into();
        self.master_secret = secret.into();
        self
    }

    pub fn with_slave(
        mut self,
        base_url: impl Into<String>,
        role: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.slave_base_url = base_url.into();
        self.slave_role = role.into();
        self.slave_secret = secret.into();
        self
    }

    /// Sets the token lifetime, rounding any sub-second remainder up.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        let partial = u64::from(lifetime.subsec_nanos() > 0);
        self.timeout_secs = lifetime.as_secs().saturating_add(partial);
        self
    }
}

/// `PGREST_*` variables, with numeric strings parsed so `PGREST_TIMEOUT=30`
/// fills `timeout`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .try_parsing(true)
}
