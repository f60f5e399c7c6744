mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

use styling::{brand, caution, flagged, muted};

pub use exports::export_report;
pub use progress::SessionProgress;
pub use summary::print_summary;

/// Prints the xnat-audit banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        brand("🧲 xnat-audit"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("Scan/project mismatch audit for XNAT")
    );
}

/// Status line for a session flagged with a scan/project mismatch.
pub fn flagged_line(session_id: &str) -> String {
    format!(
        "{} {}",
        flagged("Flagged session with project mismatch:"),
        session_id
    )
}

/// Status line for a session that could not be evaluated.
pub fn warning_line(session_id: &str, reason: &str) -> String {
    warning_text(&format!(
        "could not check session {session_id} {}",
        muted(format!("({reason})"))
    ))
}

pub fn warning_text(message: &str) -> String {
    format!("{} {message}", caution("Warning:"))
}
