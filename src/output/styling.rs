use std::fmt::Display;

use console::{Style, StyledObject};

fn paint(style: Style, text: impl Display) -> StyledObject<String> {
    style.apply_to(text.to_string())
}

/// Sessions with a scan/project mismatch, and failures.
pub fn flagged(text: impl Display) -> StyledObject<String> {
    paint(Style::new().red().bright(), text)
}

/// Clean outcomes and finished phases.
pub fn clean(text: impl Display) -> StyledObject<String> {
    paint(Style::new().green().bright(), text)
}

/// Sessions that could not be checked, and work in progress.
pub fn caution(text: impl Display) -> StyledObject<String> {
    paint(Style::new().yellow().bright(), text)
}

pub fn session_id(text: impl Display) -> StyledObject<String> {
    paint(Style::new().cyan(), text)
}

pub fn muted(text: impl Display) -> StyledObject<String> {
    paint(Style::new().dim(), text)
}

pub fn brand(text: impl Display) -> StyledObject<String> {
    paint(Style::new().magenta().bold(), text)
}

/// `"<emoji> <title>"` with the title underlined.
pub fn section_title(emoji: &str, title: &str) -> String {
    let bright = Style::new().bright();
    format!(
        "{} {}",
        bright.apply_to(emoji),
        bright.clone().underlined().apply_to(title)
    )
}
