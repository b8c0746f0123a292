use async_trait::async_trait;
use tracing::info;

use forge_types::models::{Influencer, Post};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Worth trying again later (rate limit, timeout, platform outage).
    #[error("retryable publish error: {0}")]
    Retryable(String),

    /// Will never succeed as submitted.
    #[error("fatal publish error: {0}")]
    Fatal(String),
}

/// Pushes a post to the influencer's social platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, post: &Post, influencer: &Influencer) -> Result<(), PublishError>;
}

/// Stand-in until real platform integrations exist: logs and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, post: &Post, influencer: &Influencer) -> Result<(), PublishError> {
        info!(
            post_id = %post.id,
            platform = %influencer.platform,
            account_id = %influencer.account_id,
            "Publishing post ({} bytes)",
            post.content.len()
        );
        Ok(())
    }
}
