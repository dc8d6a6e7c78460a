//! Feature queue: the ordered backlog an autonomous build worker consumes,
//! plus the controls an operator uses to steer it.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod observer;
pub mod queue;
pub mod store;
