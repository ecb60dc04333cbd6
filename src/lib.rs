// Paperwatch: daily research-paper watch for a Slack channel.
//
// This is the library root. Each module corresponds to one stage of the
// pipeline or one piece of shared plumbing.

pub mod config;
pub mod fetch;
pub mod filter;
pub mod history;
pub mod notify;
pub mod output;
pub mod papers;
pub mod pipeline;
pub mod status;
pub mod summarize;
