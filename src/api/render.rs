use std::fmt::Write;

use crate::core::{
    SURFACE_AXIS_LABELS, ScenarioRow, SurfaceGrid, TABLE_COLUMNS, TableResult, select_row,
};

fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let text = format!("{value:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Tab-separated table: one header line, then one line per scenario.
pub fn render_table(table: &TableResult) -> String {
    let mut out = TABLE_COLUMNS.join("\t");
    out.push('\n');
    for row in &table.rows {
        let cells: Vec<String> = row
            .labeled_fields()
            .into_iter()
            .map(|(_, value)| format_value(value))
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    if table.degenerate_rows > 0 {
        let _ = writeln!(
            out,
            "# {} of {} scenarios have undefined margins (zero eval spend)",
            table.degenerate_rows,
            table.rows.len()
        );
    }
    out
}

pub fn render_selection(rows: &[ScenarioRow], index: i64) -> String {
    match select_row(rows, index) {
        Ok(row) => {
            let mut out = format!("Selected scenario (row {index})\n");
            for (label, value) in row.labeled_fields() {
                let _ = writeln!(out, "  {label}: {}", format_value(value));
            }
            out
        }
        Err(e) => format!("{e}\n"),
    }
}

/// Grid with prices down the side and pass rates across the top.
pub fn render_surface(grid: &SurfaceGrid) -> String {
    let [x_label, y_label, z_label] = SURFACE_AXIS_LABELS;
    let mut out = format!(
        "{z_label} at allocation {}\n{y_label} \\ {x_label}",
        format_value(grid.live_allocation)
    );
    for &pass_rate in &grid.pass_rates {
        let _ = write!(out, "\t{}", format_value(pass_rate));
    }
    out.push('\n');
    for (price, row) in grid.prices.iter().zip(&grid.values) {
        out.push_str(&format_value(*price));
        for &value in row {
            let _ = write!(out, "\t{}", format_value(value));
        }
        out.push('\n');
    }
    out
}
