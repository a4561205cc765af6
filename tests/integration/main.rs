//! Integration tests against a mock banking API.

mod bank_client;
mod pipeline;
