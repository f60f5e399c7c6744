use reqwest::{Client, RequestBuilder};
use url::Url;

use crate::auth::Credentials;
use crate::error::{AuditError, Result};

/// Authenticated handle on one XNAT instance.
///
/// Built once per run by the audit driver and shared by reference; it is never
/// mutated after construction.
pub struct XnatClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    session_type: String,
}

impl XnatClient {
    /// Creates a client for `base_url` (e.g. `https://xnat.example.org`).
    ///
    /// `session_type` is the `xsiType` used to filter listings, normally
    /// `xnat:mrSessionData`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Config`] if the HTTP client cannot be built or
    /// the URL cannot carry a path.
    pub fn new(base_url: &str, credentials: Credentials, session_type: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("xnat-audit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuditError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AuditError::Config(format!("Invalid XNAT URL: {e}")))?;

        if base_url.cannot_be_a_base() {
            return Err(AuditError::Config(format!(
                "Invalid XNAT URL: {base_url} cannot hold a path"
            )));
        }

        Ok(Self {
            client,
            base_url,
            credentials,
            session_type: session_type.to_owned(),
        })
    }

    pub fn session_type(&self) -> &str {
        &self.session_type
    }

    /// Helper to build authenticated GET requests
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client
            .get(url)
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
    }

    /// `{base}/data/experiments` followed by `extra` path segments.
    pub fn experiments_url(&self, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["data", "experiments"])
                .extend(extra);
        }
        url
    }
}
