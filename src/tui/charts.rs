use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use super::state::UiState;
use crate::model::RISK_THRESHOLD;

/// Helper function to render metrics text (avg, med, p25, p75, elevated count)
fn render_metrics_text<'a>(
    metrics: (f64, f64, f64, f64),
    elevated: usize,
    total: usize,
    color: Color,
) -> Line<'a> {
    let (mean_val, median_val, p25_val, p75_val) = metrics;
    Line::from(vec![
        Span::styled("avg", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.2}", mean_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("med", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.2}", median_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("p25", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.2}", p25_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("p75", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {:.2}", p75_val), Style::default().fg(color)),
        Span::raw(" "),
        Span::styled("elevated", Style::default().fg(Color::Gray)),
        Span::styled(
            format!(" {}/{}", elevated, total),
            Style::default().fg(Color::Red),
        ),
    ])
}

/// Axis bounds for the score chart: steps on x, scores on y (always showing the threshold).
pub fn chart_bounds(points: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    let x_max = points.last().map(|(x, _)| *x).unwrap_or(0.0).max(1.0);
    let y_hi = points
        .iter()
        .map(|(_, y)| *y)
        .fold(1.0_f64, f64::max);
    let y_lo = points
        .iter()
        .map(|(_, y)| *y)
        .fold(0.0_f64, f64::min);
    ([0.0, x_max], [y_lo, y_hi * 1.05])
}

/// Points for a dashed horizontal line at the threshold: runs of three dots
/// separated by a two-dot gap, roughly one dot per terminal column.
pub fn threshold_dashes(x_min: f64, x_max: f64, columns: u16) -> Vec<(f64, f64)> {
    let n = usize::from(columns.max(2));
    let step = (x_max - x_min) / (n - 1) as f64;
    (0..n)
        .filter(|i| i % 5 < 3)
        .map(|i| (x_min + step * i as f64, RISK_THRESHOLD))
        .collect()
}

/// Render the risk-score line chart with the threshold line and metrics inside one bordered box.
pub fn draw_score_chart(f: &mut Frame, area: Rect, state: &UiState) {
    let title = Line::from(vec![
        Span::raw("Risk score ("),
        Span::styled(
            format!("{} samples", state.series.len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw(")"),
    ]);

    if state.series.is_empty() {
        let empty = Paragraph::new("No scores yet. Press f to fetch.")
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, area);
        return;
    }

    // Get inner area (accounting for borders)
    let inner = if area.width > 2 && area.height > 2 {
        Rect {
            x: area.x + 1,
            y: area.y + 1,
            width: area.width.saturating_sub(2),
            height: area.height.saturating_sub(2),
        }
    } else {
        area
    };

    // Split inner area into chart (top) and metrics (bottom)
    let chart_metrics = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)].as_ref())
        .split(inner);

    let points = state.series.points();
    let ([x_min, x_max], [y_min, y_max]) = chart_bounds(&points);
    let threshold = threshold_dashes(x_min, x_max, chart_metrics[0].width);

    let datasets = vec![
        Dataset::default()
            .name(format!("threshold {:.2}", RISK_THRESHOLD))
            .graph_type(GraphType::Scatter)
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::DIM))
            .data(&threshold),
        Dataset::default()
            .name("score")
            .graph_type(GraphType::Line)
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(Color::Green))
            .data(&points),
        // A single sample has no segment to draw; keep the dots visible.
        Dataset::default()
            .graph_type(GraphType::Scatter)
            .marker(symbols::Marker::Dot)
            .style(Style::default().fg(Color::Yellow))
            .data(&points),
    ];

    let x_axis = Axis::default()
        .title("Step")
        .style(Style::default().fg(Color::Gray))
        .bounds([x_min, x_max])
        .labels([format!("{:.0}", x_min), format!("{:.0}", x_max)]);
    let y_axis = Axis::default()
        .title("Score")
        .style(Style::default().fg(Color::Gray))
        .bounds([y_min, y_max])
        .labels([
            format!("{:.2}", y_min),
            format!("{:.2}", RISK_THRESHOLD),
            format!("{:.2}", y_max),
        ]);

    // Render chart in top area (without its own borders, we'll add them to the whole area)
    let chart = Chart::new(datasets).x_axis(x_axis).y_axis(y_axis);
    f.render_widget(chart, chart_metrics[0]);

    if let Some(metrics) = crate::metrics::compute_metrics(&state.series.values()) {
        let metrics_text = render_metrics_text(
            metrics,
            state.series.elevated_count(),
            state.series.len(),
            Color::Green,
        );
        f.render_widget(
            Paragraph::new(metrics_text).alignment(Alignment::Center),
            chart_metrics[1],
        );
    }

    // Render the border with title around the whole area
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(block, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_dashes_leave_gaps() {
        let dashes = threshold_dashes(0.0, 9.0, 10);
        let xs: Vec<f64> = dashes.iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 5.0, 6.0, 7.0]);
        assert!(dashes.iter().all(|(_, y)| *y == RISK_THRESHOLD));
    }

    #[test]
    fn test_chart_bounds_empty() {
        assert_eq!(chart_bounds(&[]), ([0.0, 1.0], [0.0, 1.05]));
    }

    #[test]
    fn test_chart_bounds_include_threshold_and_outliers() {
        let points = [(0.0, 0.2), (1.0, 1.6), (2.0, -0.4)];
        let ([x0, x1], [y0, y1]) = chart_bounds(&points);
        assert_eq!((x0, x1), (0.0, 2.0));
        assert_eq!(y0, -0.4);
        assert!((y1 - 1.68).abs() < 1e-9);
    }
}
