//! Text summary builder for CLI output.
//!
//! This module computes series statistics and formats human-readable lines for text mode.

use crate::metrics;
use crate::model::{Series, RISK_THRESHOLD};
use serde::Serialize;

/// Aggregate statistics over a recorded series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SeriesSummary {
    pub samples: usize,
    pub failures: usize,
    pub elevated: usize,
    pub last: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
}

pub(crate) fn summarize(series: &Series, failures: usize) -> SeriesSummary {
    let values = series.values();
    let metrics = metrics::compute_metrics(&values);
    let bounds = metrics::min_max(&values);
    SeriesSummary {
        samples: series.len(),
        failures,
        elevated: series.elevated_count(),
        last: series.last().map(|s| s.value),
        min: bounds.map(|(lo, _)| lo),
        max: bounds.map(|(_, hi)| hi),
        mean: metrics.map(|m| m.0),
        median: metrics.map(|m| m.1),
        p25: metrics.map(|m| m.2),
        p75: metrics.map(|m| m.3),
    }
}

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from the series and the number of failed fetches.
pub(crate) fn build_text_summary(series: &Series, failures: usize) -> TextSummary {
    let s = summarize(series, failures);
    let mut lines = Vec::new();

    lines.push(format!(
        "Samples: {} (failed fetches: {})",
        s.samples, s.failures
    ));

    if let Some(last) = s.last {
        let flag = if last > RISK_THRESHOLD {
            " [ELEVATED]"
        } else {
            ""
        };
        lines.push(format!("Latest risk score: {:.2}{}", last, flag));
    }

    if let (Some(mean), Some(median), Some(p25), Some(p75)) = (s.mean, s.median, s.p25, s.p75) {
        lines.push(format!(
            "Score: avg {:.2} med {:.2} p25 {:.2} p75 {:.2}",
            mean, median, p25, p75
        ));
    }
    if let (Some(min), Some(max)) = (s.min, s.max) {
        lines.push(format!("Range: {:.2} .. {:.2}", min, max));
    }
    if s.samples > 0 {
        lines.push(format!(
            "Elevated (> {:.2}): {} of {}",
            RISK_THRESHOLD, s.elevated, s.samples
        ));
    }

    TextSummary { lines }
}
