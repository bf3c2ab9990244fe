use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scores strictly above this value classify as elevated.
pub const RISK_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub program: String,
    pub args: Vec<String>,
    pub format: OutputFormat,
    /// `None` lets the script run for as long as it likes.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub on_failure: FailurePolicy,
}

impl FetchConfig {
    /// Render the command line for status messages.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// How the first line of the script's stdout is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Try a bare number, then a JSON object, then a brace record.
    Auto,
    /// `{score: 0.42, other: 1}`
    Record,
    /// `{"score": 0.42, ...}`
    Json,
    /// `0.42`
    Plain,
}

/// What a failed fetch does to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record nothing; the failure only shows up in the label.
    Skip,
    /// Record a 0.0 sample but still flag the failure.
    RecordZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    pub step: u64,
    pub value: f64,
}

/// Append-only history of recorded scores. Samples can only be added through
/// [`crate::recorder::record`], which keeps steps gapless from zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    samples: Vec<ScoreSample>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[ScoreSample] {
        &self.samples
    }

    pub fn last(&self) -> Option<&ScoreSample> {
        self.samples.last()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// `(step, value)` pairs for chart datasets.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| (s.step as f64, s.value))
            .collect()
    }

    pub fn elevated_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| Classification::of(s.value) == Classification::Elevated)
            .count()
    }

    pub(crate) fn next_step(&self) -> u64 {
        self.samples.len() as u64
    }

    pub(crate) fn push(&mut self, sample: ScoreSample) {
        debug_assert_eq!(sample.step, self.next_step());
        self.samples.push(sample);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    Elevated,
}

impl Classification {
    pub fn of(value: f64) -> Self {
        if value > RISK_THRESHOLD {
            Classification::Elevated
        } else {
            Classification::Normal
        }
    }
}

/// Tagged result of a single fetch; a failure never looks like a 0.0 reading.
pub type FetchOutcome = Result<f64, FetchError>;

/// Events emitted by the controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Started { attempt: u64 },
    Completed { attempt: u64, outcome: FetchOutcome },
    Info(String),
}

/// Colour class of the risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelTone {
    Normal,
    Elevated,
    Error,
}

impl From<Classification> for LabelTone {
    fn from(c: Classification) -> Self {
        match c {
            Classification::Normal => LabelTone::Normal,
            Classification::Elevated => LabelTone::Elevated,
        }
    }
}

/// What the display should do after a fetch completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Render {
    /// Sample appended by this fetch, if any.
    pub point: Option<ScoreSample>,
    pub label: String,
    pub tone: LabelTone,
}
