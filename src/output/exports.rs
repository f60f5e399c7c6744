use std::io::Write;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::audit::{AuditReport, ContaminatedSession, UndeterminedSession};
use crate::config::OutputFormat;
use crate::error::Result;
use crate::providers::xnat::DateRange;

/// Writes the flagged sessions of an audit.
///
/// - CSV: the flagged listing rows under the listing's own header, so the file
///   can be read back exactly like an XNAT listing.
/// - JSON: the same rows as ordered objects, plus counts, the offending scans
///   and the sessions that could not be checked.
pub fn export_report(
    report: &AuditReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Csv => export_csv(report, output),
        OutputFormat::Json => export_json(report, pretty, output),
    }
}

fn export_csv(report: &AuditReport, output: &mut dyn Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(report.flagged.headers())?;
    for row in report.flagged.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    range: &'a DateRange,
    collected_at: DateTime<Utc>,
    total_sessions: usize,
    total_flagged: usize,
    flagged_sessions: Vec<IndexMap<String, String>>,
    contaminated: &'a [ContaminatedSession],
    undetermined: &'a [UndeterminedSession],
}

fn export_json(report: &AuditReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json_report = JsonReport {
        range: &report.range,
        collected_at: report.collected_at,
        total_sessions: report.total_sessions,
        total_flagged: report.flagged.len(),
        flagged_sessions: report.flagged.records(),
        contaminated: &report.contaminated,
        undetermined: &report.undetermined,
    };

    let json = if pretty {
        serde_json::to_string_pretty(&json_report)?
    } else {
        serde_json::to_string(&json_report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}
