use std::fmt;
use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption};
use log::debug;

use crate::error::{AuditError, Result};

/// File name of the credentials file looked up in the working directory,
/// then in the home directory.
pub const DEFAULT_AUTH_FILE: &str = ".xnat_auth";

const AUTH_SECTION: &str = "auth";

/// XNAT login used for HTTP basic auth on every request.
///
/// The `Debug` rendering redacts the password so credentials can be logged
/// safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Resolves the credentials file to use when none was given explicitly.
///
/// Prefers `./.xnat_auth`; falls back to `~/.xnat_auth` when only that one
/// exists. Returns the working-directory path otherwise so the error names it.
pub fn default_auth_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_AUTH_FILE);
    if local.exists() {
        return local;
    }

    dirs::home_dir()
        .map(|home| home.join(DEFAULT_AUTH_FILE))
        .filter(|path| path.exists())
        .unwrap_or(local)
}

/// Loads XNAT credentials from an INI-style file:
///
/// ```ini
/// [auth]
/// username = someone
/// password = secret
/// ```
///
/// # Errors
///
/// - [`AuditError::ConfigNotFound`] if `path` does not exist.
/// - [`AuditError::ConfigMalformed`] if the file cannot be parsed, has no
///   `[auth]` section, or has a missing or empty `username`/`password`.
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        return Err(AuditError::ConfigNotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    let malformed = |reason: String| AuditError::ConfigMalformed {
        path: path.to_path_buf(),
        reason,
    };

    // Passwords are taken verbatim: no quote stripping, no backslash escapes.
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(&contents, options).map_err(|e| malformed(e.to_string()))?;

    let section = ini
        .section(Some(AUTH_SECTION))
        .ok_or_else(|| malformed(format!("missing [{AUTH_SECTION}] section")))?;

    // Option names are case-insensitive.
    let field = |key: &str| {
        section
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(key))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };

    match (field("username"), field("password")) {
        (Some(username), Some(password)) => {
            debug!("Loaded credentials for {username} from {}", path.display());
            Ok(Credentials::new(username, password))
        }
        _ => Err(malformed("username or password missing".to_string())),
    }
}
