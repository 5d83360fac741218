//! Plain-text rendering of a dashboard view.

use macroboard_core::charts::{Axis, Mark, Panel, PanelSeries, Section};
use macroboard_core::export::tail_preview;
use macroboard_core::{DashboardView, Diagnostic, Severity, Snapshot};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 40;

/// Unicode sparkline of `values`, downsampled to at most `width` cells.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }
    let step = values.len().div_ceil(width);
    let sampled: Vec<f64> = values.chunks(step).filter_map(|c| c.last().copied()).collect();
    let (lo, hi) = sampled
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = hi - lo;
    sampled
        .iter()
        .map(|v| {
            if span <= 0.0 {
                SPARK[SPARK.len() / 2]
            } else {
                let idx = ((v - lo) / span * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[idx.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

fn mark_label(series: &PanelSeries) -> &'static str {
    match (series.mark, series.axis) {
        (Mark::Bar, _) => "bars",
        (Mark::Area, _) => "area",
        (Mark::Line, Axis::Secondary) => "line, right axis",
        (Mark::Line, Axis::Primary) => "line",
    }
}

fn render_panel(out: &mut String, panel: &Panel) {
    out.push_str(&format!("  {} [{}]\n", panel.title, panel.unit));
    for s in &panel.series {
        let values: Vec<f64> = s.points.iter().map(|(_, v)| *v).collect();
        match s.stats {
            Some(st) => {
                out.push_str(&format!(
                    "    {:<28} {:>12.2} {:>+10.2}  min {:>10.2}  max {:>10.2}  ({})\n",
                    s.name,
                    st.last,
                    st.change,
                    st.min,
                    st.max,
                    mark_label(s)
                ));
            }
            None => {
                out.push_str(&format!("    {:<28} (no points)\n", s.name));
            }
        }
        out.push_str(&format!("    {}\n", sparkline(&values, SPARK_WIDTH)));
    }
}

/// The full dashboard: header, panels by section, diagnostics.
pub fn render_view(view: &DashboardView) -> String {
    let mut out = format!(
        "Period: {} ({})\n{} dates, {} series, {} panels\n",
        view.period.label(),
        view.range,
        view.prices.len(),
        view.prices.width(),
        view.panels.len()
    );

    let mut current: Option<Section> = None;
    for panel in &view.panels {
        if current != Some(panel.section) {
            out.push_str(&format!("\n== {} ==\n", panel.section));
            current = Some(panel.section);
        }
        render_panel(&mut out, panel);
    }

    if !view.diagnostics.is_empty() {
        out.push('\n');
        out.push_str(&render_diagnostics(&view.diagnostics, Severity::Info));
    }
    out
}

/// Diagnostics at or above `min`, one per line.
pub fn render_diagnostics(diagnostics: &[Diagnostic], min: Severity) -> String {
    diagnostics
        .iter()
        .filter(|d| d.severity >= min)
        .map(|d| format!("{d}\n"))
        .collect()
}

pub fn render_snapshot_header(snapshot: &Snapshot) -> String {
    format!(
        "Fetched {} UTC, fingerprint {}",
        snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S"),
        &snapshot.fingerprint[..16.min(snapshot.fingerprint.len())]
    )
}

/// Tail of the filtered price table, or a note when it cannot be built.
pub fn render_tail(view: &DashboardView, rows: usize) -> String {
    match tail_preview(&view.prices, rows) {
        Ok(table) => format!("Raw data (selected period)\n{table}\n"),
        Err(e) => format!("tail preview unavailable: {e}\n"),
    }
}
