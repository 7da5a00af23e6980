pub mod telegram;

use anyhow::Result;

use crate::alert::FormattedAlert;

/// Delivery side of the dispatch gate. Implementations must tolerate
/// transient channel failures themselves; callers log-and-skip on `Err`.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &FormattedAlert) -> Result<()>;
    /// Channel name for diagnostics.
    fn name(&self) -> &'static str;
}
