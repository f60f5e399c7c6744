use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<Cell> {
    labels
        .into_iter()
        .map(|label| Cell::new(label).fg(TableColor::Cyan))
        .collect()
}

/// Green when nothing was counted, `alert` otherwise.
pub fn count_cell(count: usize, alert: TableColor) -> Cell {
    let color = if count == 0 { TableColor::Green } else { alert };
    Cell::new(count).fg(color)
}
