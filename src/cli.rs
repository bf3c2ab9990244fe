use crate::error::FetchError;
use crate::fetcher::ScoreFetcher;
use crate::model::{FailurePolicy, FetchConfig, LabelTone, OutputFormat, ScoreSample, Series};
use crate::orchestrator::process_fetch_completion;
use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
///
/// Locks are taken per line so tracing output on stderr can interleave.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{}", msg);
                    let _ = out.flush();
                }
                OutputLine::Stderr(msg) => {
                    let mut err = std::io::stderr().lock();
                    let _ = writeln!(err, "{}", msg);
                    let _ = err.flush();
                }
            }
        }
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "doom-watch",
    version,
    about = "Chart risk scores produced by an external script"
)]
pub struct Cli {
    /// Program that produces the score (interpreter or executable)
    #[arg(long, env = "DOOM_WATCH_COMMAND", default_value = "python")]
    pub command: String,

    /// Argument passed to the program; repeat for several
    #[arg(long = "arg", allow_hyphen_values = true, default_values_t = vec!["bridge.py".to_string()])]
    pub args: Vec<String>,

    /// How to read the first line of the script's output
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto)]
    pub format: OutputFormat,

    /// Kill the script if it runs longer than this (0s disables)
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// What a failed fetch does to the series
    #[arg(long, value_enum, default_value_t = FailurePolicy::Skip)]
    pub on_failure: FailurePolicy,

    /// Fetch a score as soon as the TUI starts
    #[arg(long)]
    pub fetch_on_launch: bool,

    /// Fetch, print a JSON report and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Fetch, print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Number of fetches in --json/--text mode
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Pause between fetches in --json/--text mode
    #[arg(long, default_value = "0s")]
    pub interval: humantime::Duration,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Write logs to this file (the only log sink in TUI mode)
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
}

impl Cli {
    pub fn is_tui(&self) -> bool {
        cfg!(feature = "tui") && !self.json && !self.text
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_batch(args).await;
        }
    }

    run_batch(args).await
}

/// Build a `FetchConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> FetchConfig {
    let timeout = Duration::from(args.timeout);
    FetchConfig {
        program: args.command.clone(),
        args: args.args.clone(),
        format: args.format,
        timeout: (!timeout.is_zero()).then_some(timeout),
        on_failure: args.on_failure,
    }
}

#[derive(Debug, Serialize)]
struct FailureRecord {
    attempt: u64,
    error: String,
}

#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    generated_utc: String,
    config: &'a FetchConfig,
    samples: &'a [ScoreSample],
    failures: Vec<FailureRecord>,
    summary: crate::text_summary::SeriesSummary,
}

/// Resolve once `stop` flips to true. A closed channel never resolves.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|s| *s).await.is_err() {
        futures::future::pending::<()>().await;
    }
}

/// Run `--count` fetches back to back and print the result as text or JSON.
async fn run_batch(args: Cli) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();

    // One listener for the whole run; Ctrl-C stops both sleeps and fetches.
    let (stop_tx, stop_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let res = execute_batch(&args, &out_tx, stop_rx).await;
    signal_task.abort();

    drop(out_tx);
    let _ = out_handle.await;
    res
}

/// Batch body: fetch, report through `out`, and fail when any fetch failed.
async fn execute_batch(
    args: &Cli,
    out: &mpsc::UnboundedSender<OutputLine>,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let cfg = build_config(args);
    let policy = cfg.on_failure;
    let fetcher = ScoreFetcher::new(cfg.clone());
    let interval = Duration::from(args.interval);

    let mut series = Series::new();
    let mut failures = Vec::new();
    let mut interrupted = false;

    for attempt in 1..=u64::from(args.count) {
        if *stop.borrow() {
            interrupted = true;
            break;
        }
        if attempt > 1 && !interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop_requested(&mut stop) => {
                    interrupted = true;
                    break;
                }
            }
        }

        let outcome = tokio::select! {
            r = fetcher.fetch() => r,
            _ = stop_requested(&mut stop) => {
                interrupted = true;
                Err(FetchError::Cancelled)
            }
        };
        if let Err(e) = &outcome {
            failures.push(FailureRecord {
                attempt,
                error: e.to_string(),
            });
        }

        let (next, render) = process_fetch_completion(series, outcome, policy);
        series = next;
        if args.text {
            let marker = match render.tone {
                LabelTone::Normal => "",
                LabelTone::Elevated => " [ELEVATED]",
                LabelTone::Error => " [ERROR]",
            };
            let _ = out.send(OutputLine::Stderr(format!(
                "[{attempt}/{}] {}{marker}",
                args.count, render.label
            )));
        }
        if interrupted {
            break;
        }
    }

    let failed = failures.len();
    if args.json {
        let report = BatchReport {
            generated_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            config: &cfg,
            samples: series.samples(),
            summary: crate::text_summary::summarize(&series, failed),
            failures,
        };
        let json = serde_json::to_string_pretty(&report)?;
        let _ = out.send(OutputLine::Stdout(json));
    } else {
        let summary = crate::text_summary::build_text_summary(&series, failed);
        for line in summary.lines {
            let _ = out.send(OutputLine::Stdout(line));
        }
    }

    if interrupted {
        return Err(anyhow::anyhow!("interrupted"));
    }
    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{failed} of {} fetch(es) failed",
            args.count
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bridge_script() {
        let args = Cli::parse_from(["doom-watch"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.program, "python");
        assert_eq!(cfg.args, vec!["bridge.py".to_string()]);
        assert_eq!(cfg.format, OutputFormat::Auto);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.on_failure, FailurePolicy::Skip);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let args = Cli::parse_from(["doom-watch", "--timeout", "0s"]);
        assert_eq!(build_config(&args).timeout, None);
    }

    #[test]
    fn test_repeated_args_and_policy() {
        let args = Cli::parse_from([
            "doom-watch",
            "--command",
            "sh",
            "--arg",
            "-c",
            "--arg",
            "echo 0.5",
            "--on-failure",
            "record-zero",
            "--format",
            "plain",
        ]);
        let cfg = build_config(&args);
        assert_eq!(cfg.command_line(), "sh -c echo 0.5");
        assert_eq!(cfg.on_failure, FailurePolicy::RecordZero);
        assert_eq!(cfg.format, OutputFormat::Plain);
    }

    #[test]
    fn test_json_and_text_conflict() {
        assert!(Cli::try_parse_from(["doom-watch", "--json", "--text"]).is_err());
    }

    #[test]
    fn test_count_must_be_positive() {
        assert!(Cli::try_parse_from(["doom-watch", "--count", "0"]).is_err());
    }

    #[test]
    fn test_batch_modes_are_not_tui() {
        let args = Cli::parse_from(["doom-watch", "--text"]);
        assert!(!args.is_tui());
    }

    #[tokio::test]
    async fn test_output_writer_releases_stderr_between_lines() {
        let (tx, handle) = spawn_output_writer();
        tx.send(OutputLine::Stderr("first".into())).unwrap();
        let side_write = tokio::task::spawn_blocking(|| {
            let _ = writeln!(std::io::stderr().lock(), "written outside the writer");
        });
        tokio::time::timeout(Duration::from_secs(5), side_write)
            .await
            .expect("stderr stayed locked by the output writer")
            .unwrap();
        drop(tx);
        handle.await.unwrap();
    }

    #[cfg(unix)]
    mod batch {
        use super::*;

        fn batch_args(mode: &str, script: &str, extra: &[&str]) -> Cli {
            let mut argv = vec![
                "doom-watch",
                mode,
                "--command",
                "sh",
                "--arg",
                "-c",
                "--arg",
                script,
            ];
            argv.extend_from_slice(extra);
            Cli::parse_from(argv)
        }

        async fn run_collect(args: &Cli) -> (Result<()>, Vec<String>, Vec<String>) {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (_stop_tx, stop_rx) = watch::channel(false);
            let res = tokio::time::timeout(
                Duration::from_secs(20),
                execute_batch(args, &tx, stop_rx),
            )
            .await
            .expect("batch run did not finish");
            drop(tx);
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            while let Some(line) = rx.recv().await {
                match line {
                    OutputLine::Stdout(l) => stdout.push(l),
                    OutputLine::Stderr(l) => stderr.push(l),
                }
            }
            (res, stdout, stderr)
        }

        #[tokio::test]
        async fn test_text_batch_prints_attempts_and_summary() {
            let args = batch_args("--text", "echo '{score: 0.9, extra: 3}'", &["--count", "2"]);
            let (res, stdout, stderr) = run_collect(&args).await;
            assert!(res.is_ok());
            assert_eq!(
                stderr,
                vec![
                    "[1/2] Risk score: 0.90 [ELEVATED]",
                    "[2/2] Risk score: 0.90 [ELEVATED]",
                ]
            );
            assert_eq!(stdout[0], "Samples: 2 (failed fetches: 0)");
            assert!(stdout.contains(&"Elevated (> 0.75): 2 of 2".to_string()));
        }

        #[tokio::test]
        async fn test_json_batch_report_shape() {
            let args = batch_args("--json", "echo 0.5", &[]);
            let (res, stdout, stderr) = run_collect(&args).await;
            assert!(res.is_ok());
            assert!(stderr.is_empty());
            assert_eq!(stdout.len(), 1);
            let v: serde_json::Value = serde_json::from_str(&stdout[0]).unwrap();
            assert_eq!(v["samples"], serde_json::json!([{"step": 0, "value": 0.5}]));
            assert_eq!(v["failures"], serde_json::json!([]));
            assert_eq!(v["summary"]["samples"], 1);
            assert_eq!(v["config"]["program"], "sh");
        }

        #[tokio::test]
        async fn test_failed_fetch_is_an_error() {
            let args = batch_args("--json", "echo '{foo: 1}'", &[]);
            let (res, stdout, _) = run_collect(&args).await;
            let err = res.unwrap_err();
            assert_eq!(err.to_string(), "1 of 1 fetch(es) failed");
            let v: serde_json::Value = serde_json::from_str(&stdout[0]).unwrap();
            assert_eq!(v["samples"], serde_json::json!([]));
            assert_eq!(v["failures"][0]["attempt"], 1);
            assert_eq!(v["summary"]["failures"], 1);
        }

        #[tokio::test]
        async fn test_stop_during_interval_interrupts() {
            let args = batch_args(
                "--text",
                "echo 0.2",
                &["--count", "3", "--interval", "30s"],
            );
            let (tx, mut rx) = mpsc::unbounded_channel();
            let (stop_tx, stop_rx) = watch::channel(false);
            let run = tokio::spawn(async move { execute_batch(&args, &tx, stop_rx).await });

            // Wait for the first attempt, then stop while the batch sleeps.
            loop {
                match rx.recv().await {
                    Some(OutputLine::Stderr(l)) if l.starts_with("[1/3]") => break,
                    Some(_) => {}
                    None => panic!("batch ended before the first attempt"),
                }
            }
            stop_tx.send(true).unwrap();

            let res = tokio::time::timeout(Duration::from_secs(5), run)
                .await
                .expect("stop was not observed during the interval")
                .unwrap();
            assert_eq!(res.unwrap_err().to_string(), "interrupted");

            let mut later_attempts = 0;
            while let Ok(line) = rx.try_recv() {
                if let OutputLine::Stderr(l) = line {
                    if l.starts_with("[2/3]") || l.starts_with("[3/3]") {
                        later_attempts += 1;
                    }
                }
            }
            assert_eq!(later_attempts, 0);
        }
    }
}
