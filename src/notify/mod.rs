// Notification sinks: where summarized papers end up.
//
// Slack is the production sink. DryRunSink prints what would have been
// posted. Either way, a sink reports success or failure for the whole batch;
// per-message size limits are the sink's own business.

pub mod slack;

use anyhow::Result;
use async_trait::async_trait;

use crate::output::terminal;
use crate::summarize::SummarizedPaper;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `items`. With no items, post a "nothing new" message only if
    /// `send_if_empty` is set.
    async fn send(&self, items: &[SummarizedPaper<'_>], send_if_empty: bool) -> Result<()>;
}

/// Prints to stdout instead of posting anywhere.
pub struct DryRunSink;

#[async_trait]
impl NotificationSink for DryRunSink {
    async fn send(&self, items: &[SummarizedPaper<'_>], send_if_empty: bool) -> Result<()> {
        terminal::display_dry_run(items, send_if_empty);
        Ok(())
    }
}

pub use slack::SlackNotifier;
