//! Core engine — the login → fetch → export pipeline and its scheduler.

pub mod exporter;
pub mod poller;
pub mod scheduler;
