// ABOUTME: Command module aggregator for the pirollout CLI.
// ABOUTME: Re-exports the rollout and phases command handlers.

mod context;
mod phases;
mod rollout;

pub use phases::phases;
pub use rollout::{Options, Request, rollout};
