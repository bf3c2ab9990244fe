mod parse;

pub use parse::parse_score;

use crate::error::FetchError;
use crate::model::FetchConfig;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Runs the scoring script and extracts its score.
pub struct ScoreFetcher {
    cfg: FetchConfig,
}

impl ScoreFetcher {
    pub fn new(cfg: FetchConfig) -> Self {
        Self { cfg }
    }

    /// Spawn the script, read the first stdout line and parse it.
    ///
    /// The child is killed if the configured timeout elapses or if this
    /// future is dropped before it completes.
    pub async fn fetch(&self) -> Result<f64, FetchError> {
        let mut child = Command::new(&self.cfg.program)
            .args(&self.cfg.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::ProcessStartFailure {
                program: self.cfg.program.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(command = %self.cfg.command_line(), pid = ?child.id(), "spawned score script");

        let stdout = child
            .stdout
            .take()
            .ok_or(FetchError::NoOutputProduced)?;

        let work = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            let n = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| FetchError::Read(e.to_string()))?;

            // Keep draining so a chatty script never blocks on a full pipe.
            tokio::io::copy(&mut reader, &mut tokio::io::sink())
                .await
                .map_err(|e| FetchError::Read(e.to_string()))?;

            let status = child
                .wait()
                .await
                .map_err(|e| FetchError::Read(e.to_string()))?;
            Ok::<_, FetchError>((n, buf, status))
        };

        let finished = match self.cfg.timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| limit),
            None => Ok(work.await),
        };
        let (n, buf, status) = match finished {
            Ok(res) => res?,
            Err(limit) => {
                let _ = child.start_kill();
                tracing::warn!(timeout = ?limit, "score script timed out");
                return Err(FetchError::Timeout(limit));
            }
        };

        if !status.success() {
            tracing::warn!(%status, "score script exited unsuccessfully");
        }
        if n == 0 {
            return Err(FetchError::NoOutputProduced);
        }

        let line = String::from_utf8_lossy(&buf);
        let score = parse_score(&line, self.cfg.format);
        match &score {
            Ok(v) => tracing::info!(score = v, "fetched score"),
            Err(e) => tracing::warn!(error = %e, line = %line.trim_end(), "could not extract score"),
        }
        score
    }
}
