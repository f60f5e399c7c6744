use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{caution, clean};

/// Progress of the per-session checks, drawn on stderr.
///
/// Status lines printed through [`SessionProgress::println`] go to stdout and
/// are written even when the bar is hidden (e.g. under cron).
pub struct SessionProgress {
    pb: ProgressBar,
}

impl SessionProgress {
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:30}] {pos}/{len} {spinner}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(caution("Checking sessions").to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn println(&self, line: &str) {
        self.pb.suspend(|| println!("{line}"));
    }

    pub fn advance(&self) {
        self.pb.inc(1);
    }

    pub fn finish(self, flagged: usize) {
        self.pb.finish_with_message(
            clean(format!("Checked sessions, {flagged} flagged ✓")).to_string(),
        );
    }
}
