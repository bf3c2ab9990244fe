mod charts;
mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::model::{FetchEvent, LabelTone};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels keep the UI thread from ever waiting on the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<FetchEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res =
        orchestrator::run_controller(build_config(&args), args.fetch_on_launch, event_tx, cmd_rx)
            .await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<FetchEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let cfg = build_config(&args);
    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        command_line: cfg.command_line(),
        policy: cfg.on_failure,
        info: "Press f to fetch the latest score".into(),
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('f')) | (_, KeyCode::Enter) | (_, KeyCode::Char(' ')) => {
                        let _ = cmd_tx.send(UiCommand::Fetch);
                    }
                    (_, KeyCode::Char('x')) => {
                        let _ = cmd_tx.send(UiCommand::Cancel);
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 2;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 1;
                    }
                    (_, KeyCode::Esc) => {
                        state.tab = 0;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(state: &mut UiState, ev: FetchEvent) {
    match ev {
        FetchEvent::Started { attempt } => {
            state.attempts = attempt;
            state.fetching = Some((attempt, Instant::now()));
            state.info = format!("Fetching #{attempt}: {}", state.command_line);
        }
        FetchEvent::Completed { attempt, outcome } => {
            state.last_fetch_took = state
                .fetching
                .take()
                .filter(|(a, _)| *a == attempt)
                .map(|(_, started)| started.elapsed());
            if outcome.is_err() {
                state.failures += 1;
            }
            let policy = state.policy;
            let render = state.apply_render(|series| {
                orchestrator::process_fetch_completion(series, outcome, policy)
            });
            state.info = match render.point {
                Some(p) => format!("Fetch #{attempt} recorded step {}", p.step),
                None => format!("Fetch #{attempt} recorded nothing"),
            };
        }
        FetchEvent::Info(msg) => state.info = msg,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Dashboard"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("Doom Watch"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_dashboard(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3), // Fetch "button" + command
                Constraint::Min(8),    // Score chart with metrics
                Constraint::Length(3), // Risk label
                Constraint::Length(3), // Status row
            ]
            .as_ref(),
        )
        .split(area);

    let button = match state.fetching {
        Some((attempt, started)) => Line::from(vec![
            Span::styled(
                " Fetching… ",
                Style::default().fg(Color::Black).bg(Color::Yellow),
            ),
            Span::raw(format!(
                "  #{attempt} running for {:.1}s (x to cancel)",
                started.elapsed().as_secs_f64()
            )),
        ]),
        None => Line::from(vec![
            Span::styled(
                " [f] Update data ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(state.command_line.as_str(), Style::default().fg(Color::Gray)),
        ]),
    };
    f.render_widget(
        Paragraph::new(button).block(Block::default().borders(Borders::ALL).title("Fetch")),
        main[0],
    );

    charts::draw_score_chart(f, main[1], state);

    let label_title = match state.tone {
        Some(LabelTone::Elevated) => "Risk (elevated)",
        Some(LabelTone::Error) => "Risk (error)",
        _ => "Risk",
    };
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            state.label.as_str(),
            state.label_style(),
        )))
        .block(Block::default().borders(Borders::ALL).title(label_title)),
        main[2],
    );

    let mut status = vec![
        Span::styled("attempts ", Style::default().fg(Color::Gray)),
        Span::raw(state.attempts.to_string()),
        Span::styled("  failed ", Style::default().fg(Color::Gray)),
        Span::raw(state.failures.to_string()),
    ];
    if let Some(took) = state.last_fetch_took {
        status.push(Span::styled("  last ", Style::default().fg(Color::Gray)));
        status.push(Span::raw(format!("{:.1}s", took.as_secs_f64())));
    }
    status.push(Span::raw("  "));
    status.push(Span::raw(state.info.as_str()));
    f.render_widget(
        Paragraph::new(Line::from(status))
            .block(Block::default().borders(Borders::ALL).title("Status")),
        main[3],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::model::FailurePolicy;

    #[test]
    fn test_completed_event_updates_series_and_label() {
        let mut state = UiState::default();
        apply_event(&mut state, FetchEvent::Started { attempt: 1 });
        assert!(state.fetching.is_some());

        apply_event(
            &mut state,
            FetchEvent::Completed {
                attempt: 1,
                outcome: Ok(0.9),
            },
        );
        assert!(state.fetching.is_none());
        assert!(state.last_fetch_took.is_some());
        assert_eq!(state.series.len(), 1);
        assert_eq!(state.label, "Risk score: 0.90");
        assert_eq!(state.tone, Some(LabelTone::Elevated));
        assert_eq!(state.info, "Fetch #1 recorded step 0");
    }

    #[test]
    fn test_failed_event_counts_and_skips() {
        let mut state = UiState::default();
        apply_event(&mut state, FetchEvent::Started { attempt: 1 });
        apply_event(
            &mut state,
            FetchEvent::Completed {
                attempt: 1,
                outcome: Err(FetchError::NoOutputProduced),
            },
        );
        assert_eq!(state.failures, 1);
        assert!(state.series.is_empty());
        assert_eq!(state.tone, Some(LabelTone::Error));
        assert_eq!(state.info, "Fetch #1 recorded nothing");
    }

    #[test]
    fn test_record_zero_policy_in_ui() {
        let mut state = UiState {
            policy: FailurePolicy::RecordZero,
            ..Default::default()
        };
        apply_event(
            &mut state,
            FetchEvent::Completed {
                attempt: 1,
                outcome: Err(FetchError::NoOutputProduced),
            },
        );
        assert_eq!(state.series.len(), 1);
        assert_eq!(state.series.last().map(|s| s.value), Some(0.0));
        assert_eq!(state.tone, Some(LabelTone::Error));
    }
}
