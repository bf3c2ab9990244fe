//! Fetch lifecycle controller.
//!
//! Owns fetch/cancel orchestration and emits events for presentation layers.
//! Fetches run on the async runtime so the UI thread never blocks on the script.

use crate::error::FetchError;
use crate::fetcher::ScoreFetcher;
use crate::model::{FetchConfig, FetchEvent, FetchOutcome};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control fetching.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Fetch,
    Cancel,
    Quit,
}

/// Internal handle for the in-flight fetch.
struct FetchCtx {
    attempt: u64,
    handle: Option<tokio::task::JoinHandle<FetchOutcome>>,
}

/// Spawn a fetch task and return its handle.
fn start_fetch(
    fetcher: &Arc<ScoreFetcher>,
    attempt: u64,
    event_tx: &UnboundedSender<FetchEvent>,
) -> FetchCtx {
    let fetcher = Arc::clone(fetcher);
    let handle = tokio::spawn(async move { fetcher.fetch().await });
    let _ = event_tx.send(FetchEvent::Started { attempt });
    tracing::debug!(attempt, "fetch started");
    FetchCtx {
        attempt,
        handle: Some(handle),
    }
}

/// Orchestrate fetches based on UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    cfg: FetchConfig,
    fetch_on_launch: bool,
    event_tx: UnboundedSender<FetchEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let fetcher = Arc::new(ScoreFetcher::new(cfg));
    let mut attempts = 0u64;
    let mut fetch_ctx = if fetch_on_launch {
        attempts += 1;
        Some(start_fetch(&fetcher, attempts, &event_tx))
    } else {
        None
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Fetch) => {
                        // One fetch at a time; a second request while busy is dropped.
                        if fetch_ctx.is_some() {
                            let _ = event_tx.send(FetchEvent::Info("Fetch already in progress".into()));
                        } else {
                            attempts += 1;
                            fetch_ctx = Some(start_fetch(&fetcher, attempts, &event_tx));
                        }
                    }
                    Some(UiCommand::Cancel) => {
                        if let Some(mut ctx) = fetch_ctx.take() {
                            if let Some(h) = ctx.handle.take() {
                                h.abort();
                            }
                            tracing::info!(attempt = ctx.attempt, "fetch cancelled");
                            let _ = event_tx.send(FetchEvent::Completed {
                                attempt: ctx.attempt,
                                outcome: Err(FetchError::Cancelled),
                            });
                        } else {
                            let _ = event_tx.send(FetchEvent::Info("Nothing to cancel".into()));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        if let Some(mut ctx) = fetch_ctx.take() {
                            if let Some(h) = ctx.handle.take() {
                                h.abort();
                            }
                        }
                        break Ok(());
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut fetch_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    let attempt = fetch_ctx.as_ref().map(|c| c.attempt).unwrap_or(attempts);
                    fetch_ctx = None;
                    let outcome = match join_res {
                        Ok(outcome) => outcome,
                        Err(e) if e.is_cancelled() => Err(FetchError::Cancelled),
                        Err(e) => {
                            let _ = event_tx.send(FetchEvent::Info(format!("Fetch task failed: {e}")));
                            continue;
                        }
                    };
                    let _ = event_tx.send(FetchEvent::Completed { attempt, outcome });
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::{FailurePolicy, OutputFormat};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn sh(script: &str) -> FetchConfig {
        FetchConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            format: OutputFormat::Auto,
            timeout: Some(Duration::from_secs(10)),
            on_failure: FailurePolicy::Skip,
        }
    }

    async fn next_completed(rx: &mut UnboundedReceiver<FetchEvent>) -> (u64, FetchOutcome) {
        loop {
            match tokio::time::timeout(Duration::from_secs(10), rx.recv()).await {
                Ok(Some(FetchEvent::Completed { attempt, outcome })) => return (attempt, outcome),
                Ok(Some(_)) => continue,
                other => panic!("no completion event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_on_launch_completes() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctl = tokio::spawn(run_controller(sh("echo 0.4"), true, event_tx, cmd_rx));

        let (attempt, outcome) = next_completed(&mut event_rx).await;
        assert_eq!(attempt, 1);
        assert_eq!(outcome, Ok(0.4));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_fetch_while_busy_is_rejected() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctl = tokio::spawn(run_controller(sh("sleep 1; echo 0.4"), false, event_tx, cmd_rx));

        cmd_tx.send(UiCommand::Fetch).unwrap();
        cmd_tx.send(UiCommand::Fetch).unwrap();

        let mut saw_busy = false;
        loop {
            match event_rx.recv().await {
                Some(FetchEvent::Info(msg)) if msg.contains("already in progress") => saw_busy = true,
                Some(FetchEvent::Completed { attempt, outcome }) => {
                    assert_eq!(attempt, 1);
                    assert_eq!(outcome, Ok(0.4));
                    break;
                }
                Some(_) => {}
                None => panic!("controller exited early"),
            }
        }
        assert!(saw_busy);

        drop(cmd_tx);
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_reports_cancelled() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctl = tokio::spawn(run_controller(sh("sleep 5; echo 0.4"), false, event_tx, cmd_rx));

        cmd_tx.send(UiCommand::Fetch).unwrap();
        cmd_tx.send(UiCommand::Cancel).unwrap();

        let (attempt, outcome) = next_completed(&mut event_rx).await;
        assert_eq!(attempt, 1);
        assert_eq!(outcome, Err(FetchError::Cancelled));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }
}
