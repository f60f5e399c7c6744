use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::xnat::MR_SESSION_TYPE;

/// Configuration file structure for xnat-audit.
///
/// Holds the settings a scheduled run needs so the cron line stays short.
/// Command-line flags override every value here. Credentials are not part of
/// this file; they live in the separate auth file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// XNAT connection settings
    #[serde(default)]
    pub xnat: XnatConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Mail delivery settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Default date window for scheduled runs
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct XnatConfig {
    /// XNAT instance base URL
    pub host: Option<String>,

    /// `xsiType` of the sessions to audit
    #[serde(default = "default_xsi_type")]
    pub xsi_type: String,

    /// Path to the `[auth]` credentials file
    pub auth_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Where flagged sessions are written; defaults to
    /// `contaminated_sessions.<format>`
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    /// Export file used when no output path is configured.
    pub fn default_path(self) -> PathBuf {
        PathBuf::from(format!("contaminated_sessions.{}", self.extension()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MailConfig {
    /// Report recipients; mail is sent only when this is non-empty
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Local mail program, invoked as `<command> -s <subject> <recipients...>`
    #[serde(default = "default_mail_command")]
    pub command: String,

    /// Also send a message when nothing was flagged
    #[serde(default = "default_true")]
    pub notify_when_clean: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    /// Days covered by a run without explicit dates, ending today
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for XnatConfig {
    fn default() -> Self {
        Self {
            host: None,
            xsi_type: default_xsi_type(),
            auth_file: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: OutputFormat::Csv,
            pretty: false,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            command: default_mail_command(),
            notify_when_clean: true,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

fn default_xsi_type() -> String {
    MR_SESSION_TYPE.to_string()
}

fn default_mail_command() -> String {
    "mail".to_string()
}

fn default_true() -> bool {
    true
}

fn default_window_days() -> u32 {
    7
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./xnat-audit.toml
    /// 3. ./xnat-audit.json
    /// 4. ./xnat-audit.yaml
    /// 5. ./xnat-audit.yml
    ///
    /// Returns default configuration if no path was given and no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "xnat-audit.toml",
            "xnat-audit.json",
            "xnat-audit.yaml",
            "xnat-audit.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_path_follows_format() {
        assert_eq!(
            OutputFormat::Csv.default_path(),
            PathBuf::from("contaminated_sessions.csv")
        );
        assert_eq!(
            OutputFormat::Json.default_path(),
            PathBuf::from("contaminated_sessions.json")
        );
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.xnat.host, None);
        assert_eq!(config.xnat.xsi_type, "xnat:mrSessionData");
        assert_eq!(config.output.path, None);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert!(config.mail.recipients.is_empty());
        assert_eq!(config.mail.command, "mail");
        assert!(config.mail.notify_when_clean);
        assert_eq!(config.schedule.window_days, 7);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[xnat]
host = "https://xnat.example.org"
auth-file = "/etc/xnat-audit/auth"

[output]
path = "/var/reports/flagged.json"
format = "json"
pretty = true

[mail]
recipients = ["qa@example.org", "pi@example.org"]
notify-when-clean = false

[schedule]
window-days = 14
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.xnat.host.as_deref(), Some("https://xnat.example.org"));
        assert_eq!(config.xnat.xsi_type, "xnat:mrSessionData");
        assert_eq!(config.xnat.auth_file, Some(PathBuf::from("/etc/xnat-audit/auth")));
        assert_eq!(config.output.path, Some(PathBuf::from("/var/reports/flagged.json")));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
        assert_eq!(config.mail.recipients.len(), 2);
        assert_eq!(config.mail.command, "mail");
        assert!(!config.mail.notify_when_clean);
        assert_eq!(config.schedule.window_days, 14);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "xnat": {
    "host": "https://xnat.json.org",
    "xsi-type": "xnat:petSessionData"
  },
  "output": {
    "format": "csv"
  }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.xnat.host.as_deref(), Some("https://xnat.json.org"));
        assert_eq!(config.xnat.xsi_type, "xnat:petSessionData");
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.schedule.window_days, 7);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(
            temp_file,
            "mail:\n  recipients:\n    - qa@example.org\n  command: /usr/bin/mailx\n"
        )
        .unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.mail.recipients, vec!["qa@example.org".to_string()]);
        assert_eq!(config.mail.command, "/usr/bin/mailx");
    }

    #[test]
    fn test_load_config_without_extension() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[schedule]\nwindow-days = 1\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.schedule.window_days, 1);
    }

    #[test]
    fn test_load_explicit_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("missing.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[schedule]\nwindow-days = \"soon\"\n").unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}
