use crate::model::{FailurePolicy, LabelTone, Render, Series};
use ratatui::style::{Color, Modifier, Style};
use std::time::{Duration, Instant};

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub command_line: String,
    pub policy: FailurePolicy,

    // The series is owned here and threaded through process_fetch_completion.
    pub series: Series,

    pub label: String,
    pub tone: Option<LabelTone>,

    /// Attempt number and start time of the in-flight fetch.
    pub fetching: Option<(u64, Instant)>,
    pub last_fetch_took: Option<Duration>,
    pub attempts: u64,
    pub failures: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            info: String::new(),
            command_line: String::new(),
            policy: FailurePolicy::Skip,
            series: Series::new(),
            label: "Risk: ?".into(),
            tone: None,
            fetching: None,
            last_fetch_took: None,
            attempts: 0,
            failures: 0,
        }
    }
}

impl UiState {
    /// Take the series out, apply `f`, and store the result back with its render instruction.
    pub fn apply_render(&mut self, f: impl FnOnce(Series) -> (Series, Render)) -> Render {
        let series = std::mem::take(&mut self.series);
        let (series, render) = f(series);
        self.series = series;
        self.label = render.label.clone();
        self.tone = Some(render.tone);
        render
    }

    pub fn label_style(&self) -> Style {
        match self.tone {
            None => Style::default().fg(Color::Gray),
            Some(LabelTone::Normal) => Style::default().fg(Color::White),
            Some(LabelTone::Elevated) => Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
            Some(LabelTone::Error) => Style::default().fg(Color::Yellow),
        }
    }
}
