//! Plain-text chart rendering

use aibi_core::{ChartDatum, ChartSpec, MarkKind};

use crate::text::{abbreviation_scale, format_abbreviated, shorten_label};

const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 12;

pub fn render_chart(spec: &ChartSpec) -> String {
    let mut out = String::new();
    if let Some(title) = &spec.title {
        out.push_str(title);
        out.push('\n');
    }
    if spec.data.is_empty() {
        out.push_str("(no chart data)\n");
        return out;
    }

    match spec.mark {
        MarkKind::Circle => render_points(&spec.data, &mut out),
        _ => render_bars(&spec.data, &mut out),
    }

    match (&spec.x_title, &spec.y_title) {
        (Some(x), Some(y)) => out.push_str(&format!("x: {x}  y: {y}\n")),
        (Some(x), None) => out.push_str(&format!("x: {x}\n")),
        (None, Some(y)) => out.push_str(&format!("y: {y}\n")),
        (None, None) => {}
    }
    out
}

fn render_bars(data: &[ChartDatum], out: &mut String) {
    let max = data.iter().map(|d| d.value.abs()).fold(0.0, f64::max);
    let scale = abbreviation_scale(max);
    for datum in data {
        let width = if max > 0.0 {
            ((datum.value.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "{:>label_width$} | {:<bar_width$} {}\n",
            shorten_label(&datum.category, LABEL_WIDTH),
            "#".repeat(width),
            format_abbreviated(datum.value, scale),
            label_width = LABEL_WIDTH + 1,
            bar_width = BAR_WIDTH,
        ));
    }
}

fn render_points(data: &[ChartDatum], out: &mut String) {
    let scale = abbreviation_scale(
        data.iter()
            .flat_map(|d| [d.x_value, d.y_value])
            .flatten()
            .map(f64::abs)
            .fold(0.0, f64::max),
    );
    for datum in data {
        let (Some(x), Some(y)) = (datum.x_value, datum.y_value) else {
            continue;
        };
        out.push_str(&format!(
            "({}, {})",
            format_abbreviated(x, scale),
            format_abbreviated(y, scale)
        ));
        if let Some(size) = datum.size {
            out.push_str(&format!(" size {size}"));
        }
        if let Some(color) = &datum.color_category {
            out.push_str(&format!(" [{color}]"));
        }
        out.push('\n');
    }
}
