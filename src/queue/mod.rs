//! The feature queue: derived views, lifecycle rules, priority arithmetic and
//! the engine control plane, plus [`FeatureQueue`], which runs them against a
//! [`crate::store::Store`].

pub mod control;
pub mod intake;
pub mod lifecycle;
pub mod priority;
mod service;
mod view;

pub use lifecycle::OperatorAction;
pub use service::FeatureQueue;
pub use view::{QueueSnapshot, QueueView, StatusCounts};
