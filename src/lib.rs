//! Saldo Watch — bank balance poller and daily CSV exporter
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod bank;
pub mod engine;
pub mod prediction;
pub mod storage;
pub mod bridge;
