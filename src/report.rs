use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::audit::AuditReport;
use crate::config::OutputFormat;
use crate::error::{AuditError, Result};
use crate::mail::{MailMessage, MailTransport};
use crate::output::{self, export_report};

/// Where and how an audit's results are delivered.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub output_path: PathBuf,
    pub format: OutputFormat,
    pub pretty: bool,
    /// Mail is sent only when this is non-empty.
    pub recipients: Vec<String>,
    pub notify_when_clean: bool,
}

/// What the reporter did.
#[derive(Debug)]
pub struct ReportOutcome {
    /// Export file, if any sessions were flagged.
    pub written: Option<PathBuf>,
    /// Mail delivery result, if mail was attempted.
    pub delivery: Option<Result<()>>,
}

impl ReportOutcome {
    pub fn delivery_error(&self) -> Option<&AuditError> {
        match &self.delivery {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

/// Prints the summary, writes flagged sessions to disk and mails the result.
///
/// A delivery failure is logged and returned in [`ReportOutcome::delivery`]
/// for the caller to report; it never turns into an error, since the export
/// has already been written.
///
/// # Errors
///
/// Returns an error only if the export file cannot be written.
pub fn report(
    report: &AuditReport,
    options: &ReportOptions,
    transport: Option<&dyn MailTransport>,
) -> Result<ReportOutcome> {
    output::print_summary(report);

    let mut export = Vec::new();
    let written = if report.flagged.is_empty() {
        None
    } else {
        export_report(report, options.format, options.pretty, &mut export)?;
        write_export(&options.output_path, &export)?;
        println!(
            "Flagged sessions saved to '{}'",
            options.output_path.display()
        );
        Some(options.output_path.clone())
    };

    let message = if written.is_some() {
        Some(contamination_message(report, &options.recipients, &export))
    } else if options.notify_when_clean {
        Some(clean_message(report, &options.recipients))
    } else {
        None
    };

    let delivery = match (transport, message) {
        (Some(transport), Some(message)) if !message.recipients.is_empty() => {
            let result = transport.send(&message);
            match &result {
                Ok(()) => println!("Report mailed to {}", message.recipients.join(", ")),
                Err(e) => warn!("Mail delivery failed: {e}"),
            }
            Some(result)
        }
        _ => None,
    };

    Ok(ReportOutcome { written, delivery })
}

fn write_export(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    debug!("Export written to: {}", path.display());
    Ok(())
}

/// Message carrying the exported flagged sessions.
pub fn contamination_message(
    report: &AuditReport,
    recipients: &[String],
    export: &[u8],
) -> MailMessage {
    MailMessage {
        subject: format!("Contaminated XNAT sessions {}", report.range),
        recipients: recipients.to_vec(),
        body: String::from_utf8_lossy(export).into_owned(),
    }
}

/// Message sent when nothing was flagged.
pub fn clean_message(report: &AuditReport, recipients: &[String]) -> MailMessage {
    let mut body = format!(
        "No contaminated sessions found for {} ({} sessions checked).\n",
        report.range, report.total_sessions
    );
    if !report.undetermined.is_empty() {
        body.push_str(&format!(
            "{} sessions could not be checked: {}\n",
            report.undetermined.len(),
            report
                .undetermined
                .iter()
                .map(|s| s.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    MailMessage {
        subject: format!("No contaminated XNAT sessions {}", report.range),
        recipients: recipients.to_vec(),
        body,
    }
}
