//! Credential handling
//!
//! Credentials are opaque, read-only inputs supplied by an external store.
//! Empty fields flow through as empty strings; the only hard failure is an
//! endpoint URL that cannot be constructed at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection settings for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Programmatic access token
    pub token: String,
    /// Account host, without scheme
    pub account_url: String,
    pub database: String,
    pub schema: String,
    pub agent: String,
}

#[derive(Debug, Error)]
#[error("could not build agent endpoint URL from \"{url}\"")]
pub struct InvalidEndpoint {
    pub url: String,
}

impl Credentials {
    fn base_url(&self) -> String {
        format!(
            "https://{}/api/v2/databases/{}/schemas/{}/agents/{}",
            self.account_url, self.database, self.schema, self.agent
        )
    }

    /// Describe endpoint, used by the connectivity check.
    pub fn agent_url(&self) -> Result<reqwest::Url, InvalidEndpoint> {
        let url = self.base_url();
        reqwest::Url::parse(&url).map_err(|_| InvalidEndpoint { url })
    }

    /// Streaming run endpoint.
    pub fn agent_run_url(&self) -> Result<reqwest::Url, InvalidEndpoint> {
        let url = format!("{}:run", self.base_url());
        reqwest::Url::parse(&url).map_err(|_| InvalidEndpoint { url })
    }
}

/// Read-only source of credentials, resolved once per turn.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Credentials {
        self.clone()
    }
}
