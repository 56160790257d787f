//! Training comparison plots
//!
//! Renders the post-training charts as standalone SVG files: one bar
//! panel per metric and one predicted-vs-actual scatter panel per model
//! family. Plot failures are the trainer's problem to log; nothing here
//! touches the artifact.

use crate::error::Result;
use crate::training::FamilyEvaluation;
use std::fmt::Write as _;
use std::path::Path;

const PANEL_W: f64 = 280.0;
const PANEL_H: f64 = 260.0;
const MARGIN: f64 = 45.0;

/// Write `metrics_comparison.svg` and `predictions_vs_actual.svg` into
/// `dir`, creating it if needed.
pub fn write_comparison_plots(
    dir: &Path,
    evaluations: &[FamilyEvaluation],
    y_test: &[f64],
) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join("metrics_comparison.svg"),
        render_metrics_chart(evaluations),
    )?;
    std::fs::write(
        dir.join("predictions_vs_actual.svg"),
        render_scatter_chart(evaluations, y_test),
    )?;
    Ok(())
}

fn svg_header(width: f64, height: f64, title: &str) -> String {
    let mut svg = String::new();
    svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\">"
    );
    svg.push_str("  <style>\n");
    svg.push_str("    .label { font-family: monospace; font-size: 11px; fill: #374151; }\n");
    svg.push_str("    .title { font-family: monospace; font-size: 14px; font-weight: bold; fill: #111827; }\n");
    svg.push_str("    .axis { stroke: #9ca3af; stroke-width: 1; }\n");
    svg.push_str("  </style>\n");
    svg.push_str("  <rect width=\"100%\" height=\"100%\" fill=\"#f8f8f8\"/>\n");
    let _ = writeln!(
        svg,
        "  <text x=\"{:.0}\" y=\"22\" text-anchor=\"middle\" class=\"title\">{title}</text>",
        width / 2.0
    );
    svg
}

/// One bar panel per metric (rmse, mae, r2), one bar per family.
fn render_metrics_chart(evaluations: &[FamilyEvaluation]) -> String {
    let panels: [(&str, Box<dyn Fn(&FamilyEvaluation) -> f64>); 3] = [
        ("RMSE", Box::new(|e| e.metrics.rmse)),
        ("MAE", Box::new(|e| e.metrics.mae)),
        ("R2", Box::new(|e| e.metrics.r2)),
    ];

    let width = PANEL_W * panels.len() as f64;
    let height = PANEL_H + 60.0;
    let mut svg = svg_header(width, height, "Model comparison (test set)");

    for (panel_idx, (name, value_fn)) in panels.iter().enumerate() {
        let x0 = panel_idx as f64 * PANEL_W + MARGIN;
        let y0 = 40.0;
        let plot_h = PANEL_H - 40.0;
        let plot_w = PANEL_W - 2.0 * MARGIN;

        // R2 gets a fixed 0..1 axis; error metrics scale to their max
        let max_value = if *name == "R2" {
            1.0
        } else {
            evaluations
                .iter()
                .map(|e| value_fn(e))
                .fold(0.0f64, f64::max)
                .max(1e-9)
        };

        let _ = writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">{name}</text>",
            x0 + plot_w / 2.0,
            y0 - 5.0
        );
        let _ = writeln!(
            svg,
            "  <line x1=\"{x0:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" class=\"axis\"/>",
            y0 + plot_h,
            x0 + plot_w,
            y0 + plot_h
        );

        let n = evaluations.len().max(1) as f64;
        let bar_w = plot_w / n * 0.6;
        let slot_w = plot_w / n;

        for (i, eval) in evaluations.iter().enumerate() {
            let value = value_fn(eval);
            let frac = (value / max_value).clamp(0.0, 1.0);
            let bar_h = frac * plot_h;
            let bx = x0 + i as f64 * slot_w + (slot_w - bar_w) / 2.0;
            let by = y0 + plot_h - bar_h;

            let _ = writeln!(
                svg,
                "  <rect x=\"{bx:.1}\" y=\"{by:.1}\" width=\"{bar_w:.1}\" height=\"{bar_h:.1}\" fill=\"#14b8a6\"/>"
            );
            let _ = writeln!(
                svg,
                "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">{:.3}</text>",
                bx + bar_w / 2.0,
                by - 4.0,
                value
            );
            let _ = writeln!(
                svg,
                "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">{}</text>",
                bx + bar_w / 2.0,
                y0 + plot_h + 16.0,
                eval.family.as_str()
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}

/// One scatter panel per family: predicted vs actual with the identity
/// diagonal.
fn render_scatter_chart(evaluations: &[FamilyEvaluation], y_test: &[f64]) -> String {
    let width = PANEL_W * evaluations.len().max(1) as f64;
    let height = PANEL_H + 60.0;
    let mut svg = svg_header(width, height, "Predicted vs actual (test set)");

    let y_min = y_test.iter().copied().fold(f64::INFINITY, f64::min);
    let y_max = y_test.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if y_min.is_finite() && y_max.is_finite() && y_max > y_min {
        (y_min, y_max)
    } else {
        (0.0, 1.0)
    };
    let span = hi - lo;

    for (panel_idx, eval) in evaluations.iter().enumerate() {
        let x0 = panel_idx as f64 * PANEL_W + MARGIN;
        let y0 = 40.0;
        let plot_h = PANEL_H - 40.0;
        let plot_w = PANEL_W - 2.0 * MARGIN;

        let to_px = |actual: f64, predicted: f64| -> (f64, f64) {
            let fx = ((actual - lo) / span).clamp(0.0, 1.0);
            let fy = ((predicted - lo) / span).clamp(0.0, 1.0);
            (x0 + fx * plot_w, y0 + plot_h - fy * plot_h)
        };

        let _ = writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"label\">{}</text>",
            x0 + plot_w / 2.0,
            y0 - 5.0,
            eval.family.as_str()
        );
        let _ = writeln!(
            svg,
            "  <rect x=\"{x0:.1}\" y=\"{y0:.1}\" width=\"{plot_w:.1}\" height=\"{plot_h:.1}\" fill=\"none\" class=\"axis\"/>"
        );

        // Identity diagonal
        let (dx1, dy1) = to_px(lo, lo);
        let (dx2, dy2) = to_px(hi, hi);
        let _ = writeln!(
            svg,
            "  <line x1=\"{dx1:.1}\" y1=\"{dy1:.1}\" x2=\"{dx2:.1}\" y2=\"{dy2:.1}\" stroke=\"#dc2626\" stroke-dasharray=\"4 3\"/>"
        );

        for (actual, predicted) in y_test.iter().zip(eval.predictions.iter()) {
            let (px, py) = to_px(*actual, *predicted);
            let _ = writeln!(
                svg,
                "  <circle cx=\"{px:.1}\" cy=\"{py:.1}\" r=\"2.5\" fill=\"#14b8a6\" fill-opacity=\"0.5\"/>"
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}
