use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use forge_db::{Store, StoreError};
use forge_types::models::{Influencer, Post, PostStatus};

use crate::publisher::{PublishError, Publisher};

/// What to do with a post whose publish call failed.
///
/// Posts that end up `failed` are never picked up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Every publish error fails the post.
    #[default]
    MarkFailed,
    /// Retryable errors leave the post scheduled so the next tick tries
    /// again; fatal errors still fail it.
    RetryNextTick,
}

/// Outcome counts for one dispatcher tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub published: usize,
    pub failed: usize,
    /// Left scheduled after a retryable publish error.
    pub deferred: usize,
    /// Left untouched because of a lookup or store problem.
    pub skipped: usize,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        *self == TickReport::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Background loop that publishes due posts.
///
/// A single task drives every tick, so ticks never overlap. Cancellation is
/// only observed between ticks.
pub struct PostDispatcher {
    store: Arc<dyn Store>,
    publisher: Arc<dyn Publisher>,
    interval: Duration,
    failure_policy: FailurePolicy,
}

impl PostDispatcher {
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn Publisher>, interval: Duration) -> Self {
        Self {
            store,
            publisher,
            interval,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub async fn run(self, shutdown: CancellationToken) {
        // First tick one full interval after start.
        let mut interval = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Post dispatcher started (interval {}s, {:?})",
            self.interval.as_secs_f64(),
            self.failure_policy
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Post dispatcher stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.tick(Utc::now()).await {
                Ok(report) if !report.is_empty() => info!(
                    "Dispatch tick: {} published, {} failed, {} deferred, {} skipped",
                    report.published, report.failed, report.deferred, report.skipped
                ),
                Ok(_) => debug!("Dispatch tick: nothing due"),
                Err(e) => warn!("Dispatch tick error: {}", e),
            }
        }
    }

    /// Publish every scheduled post due at `now`. Per-post problems are
    /// logged and counted; only failing to list due posts is an error.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, DispatchError> {
        let due = self.with_store(move |s| s.due_posts(now)).await?;
        let mut report = TickReport::default();

        for post in due {
            self.dispatch(post, &mut report).await;
        }

        Ok(report)
    }

    async fn dispatch(&self, post: Post, report: &mut TickReport) {
        let influencer_id = post.influencer_id.clone();
        let influencer = match self.with_store(move |s| s.get_influencer(&influencer_id)).await {
            Ok(Some(influencer)) => influencer,
            Ok(None) => {
                warn!(
                    "Post {}: influencer {} not found, retrying next tick",
                    post.id, post.influencer_id
                );
                report.skipped += 1;
                return;
            }
            Err(e) => {
                warn!("Post {}: influencer lookup failed, retrying next tick: {}", post.id, e);
                report.skipped += 1;
                return;
            }
        };

        let next = match self.publisher.publish(&post, &influencer).await {
            Ok(()) => PostStatus::Posted,
            Err(PublishError::Retryable(reason))
                if self.failure_policy == FailurePolicy::RetryNextTick =>
            {
                warn!("Post {}: publish deferred: {}", post.id, reason);
                report.deferred += 1;
                return;
            }
            Err(e) => {
                warn!("Post {} for {}: {}", post.id, influencer.name, e);
                PostStatus::Failed
            }
        };

        self.settle(&post, &influencer, next, report).await;
    }

    async fn settle(
        &self,
        post: &Post,
        influencer: &Influencer,
        next: PostStatus,
        report: &mut TickReport,
    ) {
        let id = post.id.clone();
        let moved = self
            .with_store(move |s| s.transition_post(&id, PostStatus::Scheduled, next))
            .await;

        match (moved, next) {
            (Ok(true), PostStatus::Posted) => {
                info!("Published post {} for influencer {}", post.id, influencer.name);
                report.published += 1;
            }
            (Ok(true), _) => report.failed += 1,
            (Ok(false), _) => {
                warn!("Post {} changed status concurrently; leaving it as is", post.id);
                report.skipped += 1;
            }
            (Err(e), _) => {
                warn!("Post {}: could not record status {}: {}", post.id, next, e);
                report.skipped += 1;
            }
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || f(store.as_ref())).await??)
    }
}
