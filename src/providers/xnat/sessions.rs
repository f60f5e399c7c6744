use log::{debug, info};
use url::Url;

use super::client::XnatClient;
use super::types::{DateRange, SessionTable};
use crate::error::{AuditError, Result};

/// `xsiType` of magnetic-resonance imaging sessions.
pub const MR_SESSION_TYPE: &str = "xnat:mrSessionData";

impl XnatClient {
    /// Listing URL for the client's session type, constrained to `range`.
    pub fn sessions_url(&self, range: &DateRange) -> Url {
        let mut url = self.experiments_url(&[]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("format", "csv")
                .append_pair("xsiType", self.session_type());
            if let Some(date) = range.query_value() {
                query.append_pair("date", &date);
            }
        }
        url
    }

    /// Lists every session of the client's type within `range`.
    ///
    /// Issues exactly one request. There is no retry: any failure aborts the
    /// listing.
    ///
    /// # Errors
    ///
    /// - [`AuditError::Network`] if the request cannot be sent.
    /// - [`AuditError::Transport`] on a non-success status.
    /// - [`AuditError::Parse`] if the body is not a CSV table with an `ID`
    ///   column.
    pub async fn list_sessions(&self, range: &DateRange) -> Result<SessionTable> {
        let url = self.sessions_url(range);
        info!("Listing {} sessions ({range})", self.session_type());
        debug!("GET {url}");

        let response = self.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::Transport {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let table = SessionTable::from_csv(&body)?;

        info!("Listed {} sessions", table.len());

        Ok(table)
    }
}
