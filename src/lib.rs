// ABOUTME: Library root for pirollout - exposes the rollout engine for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod health;
pub mod isolation;
pub mod output;
pub mod phase;
pub mod registry;
pub mod report;
pub mod rollout;
pub mod ssh;
pub mod types;
