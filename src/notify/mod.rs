pub mod discord;

use crate::enrich::Enrichment;
use crate::feed::PlayEvent;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Network trouble, timeout, rate limit or a 5xx. Worth another attempt.
    #[error("transient notify failure: {0:#}")]
    Transient(anyhow::Error),
    /// The sink refused the message itself (bad payload, too long, 4xx).
    /// Retrying cannot help.
    #[error("permanent notify failure: {0}")]
    Permanent(String),
}

impl NotifyError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, NotifyError::Permanent(_))
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        play: &PlayEvent,
        enrichment: Option<&Enrichment>,
    ) -> Result<(), NotifyError>;
    fn name(&self) -> &'static str;
}
