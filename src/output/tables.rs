use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use super::styling::StatusTone;
use crate::pipeline::PipelineStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: &PipelineStatus, label: impl std::fmt::Display) -> Cell {
    let color = match StatusTone::of(status) {
        StatusTone::Good => TableColor::Green,
        StatusTone::Bad => TableColor::Red,
        StatusTone::Warning => TableColor::Yellow,
        StatusTone::Active => TableColor::Blue,
        StatusTone::Waiting => TableColor::Cyan,
        StatusTone::Neutral => TableColor::White,
    };
    Cell::new(label).fg(color)
}
