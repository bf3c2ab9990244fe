//! Application-level orchestration utilities.
//!
//! This module owns fetch lifecycle control (fetch/cancel/quit) and post-fetch processing
//! that folds an outcome into the series. UI/CLI layers call into this module to keep
//! responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::process_fetch_completion;
