//! Append-only score history and threshold classification.

use crate::model::{Classification, ScoreSample, Series};

/// Append `value` as the next sample and classify it.
///
/// The new sample's step is the series length before the append, so steps stay
/// gapless from zero.
pub fn record(mut series: Series, value: f64) -> (Series, Classification) {
    let sample = ScoreSample {
        step: series.next_step(),
        value,
    };
    series.push(sample);
    (series, Classification::of(value))
}
