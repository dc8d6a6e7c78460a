//! Domain models for the feature queue.
//!
//! # Core Concepts
//!
//! - [`Feature`]: A discrete unit of backlog work. Features are ordered by a sparse,
//!   real-valued `priority` and move through a small lifecycle ([`FeatureStatus`]).
//!   Only the external worker moves a feature into or out of `in_progress`.
//! - [`EngineConfig`]: Process-wide flags (paused, auto-approve, skip-on-error,
//!   notification target) stored as independent key/value pairs.
//! - [`LogEntry`]: Append-only messages written by the worker, displayed newest first.

mod engine;
mod feature;
mod log;

pub use engine::*;
pub use feature::*;
pub use log::*;
