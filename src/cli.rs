use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::audit::{self, AuditReport, AuditSettings};
use crate::auth::default_auth_path;
use crate::config::{Config, OutputFormat};
use crate::mail::{LocalMailCommand, MailTransport};
use crate::providers::xnat::DateRange;
use crate::output;
use crate::report::{self, ReportOptions, ReportOutcome};

#[derive(Parser, Debug)]
#[command(name = "xnat-audit")]
#[command(
    author,
    version,
    about = "Find XNAT sessions whose scans are labeled with another project",
    long_about = None
)]
pub struct Cli {
    /// First acquisition date to audit (YYYY-MM-DD)
    #[arg(long, value_name = "YYYY-MM-DD")]
    start_date: Option<NaiveDate>,

    /// Last acquisition date to audit (YYYY-MM-DD)
    #[arg(long, value_name = "YYYY-MM-DD")]
    end_date: Option<NaiveDate>,

    /// Audit every session instead of the default window ending today
    #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
    all: bool,

    /// XNAT base URL
    #[arg(long, env = "XNAT_HOST")]
    host: Option<String>,

    /// Credentials file with an [auth] section [default: .xnat_auth]
    #[arg(long, env = "XNAT_AUTH_FILE")]
    auth_file: Option<PathBuf>,

    /// Settings file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write flagged sessions [default: contaminated_sessions.<format>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, default_value_t = false)]
    pretty: bool,

    /// Mail the report to this address (repeatable)
    #[arg(long = "mail-to", value_name = "ADDRESS")]
    mail_to: Vec<String>,

    /// Local mail program [default: mail]
    #[arg(long)]
    mail_command: Option<String>,
}

/// Date range for a run.
///
/// Explicit bounds are used as given, even if only one is set. With neither,
/// the range is the `window_days` days ending `today`, unless `all` asks for
/// no date constraint.
pub fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    all: bool,
    window_days: u32,
    today: NaiveDate,
) -> Result<DateRange> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            bail!("Start date {start} is after end date {end}");
        }
    }

    if all {
        return Ok(DateRange::default());
    }

    if start.is_none() && end.is_none() {
        let start = today - Duration::days(i64::from(window_days));
        return Ok(DateRange::new(Some(start), Some(today)));
    }

    Ok(DateRange::new(start, end))
}

impl Cli {
    fn audit_settings(&self, config: &Config) -> Result<AuditSettings> {
        let host = self
            .host
            .clone()
            .or_else(|| config.xnat.host.clone())
            .context("No XNAT host configured: pass --host, set XNAT_HOST, or set xnat.host")?;

        let auth_file = self
            .auth_file
            .clone()
            .or_else(|| config.xnat.auth_file.clone())
            .unwrap_or_else(default_auth_path);

        let range = resolve_range(
            self.start_date,
            self.end_date,
            self.all,
            config.schedule.window_days,
            Local::now().date_naive(),
        )?;

        Ok(AuditSettings {
            host,
            session_type: config.xnat.xsi_type.clone(),
            auth_file,
            range,
        })
    }

    fn report_options(&self, config: &Config) -> ReportOptions {
        let recipients = if self.mail_to.is_empty() {
            config.mail.recipients.clone()
        } else {
            self.mail_to.clone()
        };

        let format = self.format.unwrap_or(config.output.format);

        ReportOptions {
            output_path: self
                .output
                .clone()
                .or_else(|| config.output.path.clone())
                .unwrap_or_else(|| format.default_path()),
            format,
            pretty: self.pretty || config.output.pretty,
            recipients,
            notify_when_clean: config.mail.notify_when_clean,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let settings = self.audit_settings(&config)?;
        let options = self.report_options(&config);

        info!(
            "Auditing {} sessions on {} ({})",
            settings.session_type, settings.host, settings.range
        );

        let audit = audit::run(&settings).await.context("Audit failed")?;

        let mail_command = self
            .mail_command
            .clone()
            .unwrap_or_else(|| config.mail.command.clone());
        let outcome = deliver_report(audit, options, mail_command).await?;

        if let Some(path) = &outcome.written {
            info!("Flagged sessions exported to {}", path.display());
        }
        if let Some(e) = outcome.delivery_error() {
            println!("{}", output::warning_text(&format!("report not mailed: {e}")));
        }

        Ok(())
    }
}

/// Writes and mails the report off the async runtime, since the mail program
/// is waited on synchronously.
async fn deliver_report(
    audit: AuditReport,
    options: ReportOptions,
    mail_command: String,
) -> Result<ReportOutcome> {
    let output_path = options.output_path.clone();

    tokio::task::spawn_blocking(move || {
        let mail = LocalMailCommand::new(mail_command);
        let transport: Option<&dyn MailTransport> = if options.recipients.is_empty() {
            None
        } else {
            Some(&mail)
        };
        report::report(&audit, &options, transport)
    })
    .await
    .context("Report task failed")?
    .with_context(|| format!("Failed to write {}", output_path.display()))
}
