use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::audit::{AuditReport, ContaminatedSession};

use super::styling::{clean, flagged, muted, section_title, session_id};
use super::tables::{count_cell, create_table, cyan_header};

/// Prints a human-readable summary of an audit to stdout.
///
/// Shows the overview counts, the flagged sessions with their original listing
/// columns and the offending scans, and any sessions that could not be
/// checked.
pub fn print_summary(report: &AuditReport) {
    println!("{}", render_summary(report));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{}", section_title(emoji, title));
}

fn format_mismatched_scans(session: &ContaminatedSession) -> String {
    session
        .mismatched_scans
        .iter()
        .map(|scan| {
            format!(
                "scan {}: {}",
                scan.scan_id.as_deref().unwrap_or("?"),
                scan.project
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_summary(report: &AuditReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Summary");

    let mut overview = create_table();
    overview.set_header(cyan_header([
        "Date range",
        "Sessions checked",
        "Flagged",
        "Undetermined",
    ]));
    overview.add_row(vec![
        Cell::new(report.range),
        Cell::new(report.total_sessions),
        count_cell(report.flagged.len(), TableColor::Red),
        count_cell(report.undetermined.len(), TableColor::Yellow),
    ]);
    let _ = writeln!(output, "{overview}");

    let flagged_line = format!(
        "Flagged {} sessions with scan/project mismatch.",
        report.flagged.len()
    );
    if report.flagged.is_empty() {
        let _ = writeln!(output, "  {}\n", clean(flagged_line));
    } else {
        let _ = writeln!(output, "  {}\n", flagged(flagged_line));
    }

    if !report.flagged.is_empty() {
        add_section_header(&mut output, "🚩", "Flagged Sessions");

        let mut table = create_table();
        let mut header = cyan_header(report.flagged.headers().iter());
        header.push(Cell::new("Mismatched scans").fg(TableColor::Red));
        table.set_header(header);

        for (row, session) in report.flagged.rows().iter().zip(&report.contaminated) {
            let mut cells: Vec<Cell> = row.iter().map(Cell::new).collect();
            cells.push(Cell::new(format_mismatched_scans(session)).fg(TableColor::Red));
            table.add_row(cells);
        }
        let _ = writeln!(output, "{table}\n");
    }

    if !report.undetermined.is_empty() {
        add_section_header(&mut output, "⚠️", "Sessions Not Checked");

        let mut table = create_table();
        table.set_header(cyan_header(["Session", "Reason"]));
        for session in &report.undetermined {
            table.add_row(vec![
                Cell::new(session_id(&session.id)),
                Cell::new(muted(&session.reason)),
            ]);
        }
        let _ = writeln!(output, "{table}\n");
    }

    output
}
