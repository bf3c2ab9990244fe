use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::model::RISK_THRESHOLD;

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("f", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Enter", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Space", Style::default().fg(Color::Magenta)),
            Span::raw("  Fetch latest score"),
        ]),
        key_line("x", 11, "Cancel running fetch"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        key_line("Esc", 9, "Back to dashboard"),
        Line::from(""),
        Line::from("Risk label:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("red", Style::default().fg(Color::Red)),
            Span::raw(format!("         score above {:.2}", RISK_THRESHOLD)),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("yellow", Style::default().fg(Color::Yellow)),
            Span::raw("      last fetch failed"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
