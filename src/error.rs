use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Credentials file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Malformed credentials file {}: {reason}", path.display())]
    ConfigMalformed { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("XNAT request failed with status {status}: {url}")]
    Transport { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    pub fn parse(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
