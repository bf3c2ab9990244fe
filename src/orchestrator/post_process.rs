//! Post-fetch processing.
//!
//! Turns a fetch outcome into the updated series plus a render instruction for
//! whichever presentation layer is driving.

use crate::error::FetchError;
use crate::model::{FailurePolicy, FetchOutcome, LabelTone, Render, Series};
use crate::recorder;

/// Apply a completed fetch to `series`.
pub(crate) fn process_fetch_completion(
    series: Series,
    outcome: FetchOutcome,
    policy: FailurePolicy,
) -> (Series, Render) {
    match outcome {
        Ok(value) => {
            let (series, class) = recorder::record(series, value);
            let render = Render {
                point: series.last().copied(),
                label: format!("Risk score: {:.2}", value),
                tone: class.into(),
            };
            (series, render)
        }
        // A cancelled fetch never reached the script's answer; nothing to record.
        Err(e @ FetchError::Cancelled) => (series, failed_render(&e)),
        Err(e) => match policy {
            FailurePolicy::Skip => (series, failed_render(&e)),
            FailurePolicy::RecordZero => {
                let (series, _) = recorder::record(series, 0.0);
                let render = Render {
                    point: series.last().copied(),
                    label: format!("Risk score: 0.00 (fetch failed: {e})"),
                    tone: LabelTone::Error,
                };
                (series, render)
            }
        },
    }
}

fn failed_render(e: &FetchError) -> Render {
    Render {
        point: None,
        label: format!("Fetch failed: {e}"),
        tone: LabelTone::Error,
    }
}
