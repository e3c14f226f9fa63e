//! Post-commit relationship cleanup.
//!
//! A committed membership deletion leaves a [`PendingCleanup`] row behind.
//! Draining it deletes every relationship the departed user holds inside the
//! organization, then marks the row complete. Deletes are idempotent, so a
//! drain interrupted halfway can simply run again.

use std::sync::Arc;

use iam_events::{EventBus, LifecycleEvent};
use tracing::{info, instrument, warn, Span};

use crate::error::IamResult;
use crate::graph::{GraphError, RelationshipGraph};
use crate::retry::{with_retry_if, RetryConfig};
use crate::store::{PendingCleanup, Store};

/// Outcome of draining every open cleanup marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Markers completed
    pub drained: usize,
    /// Markers left open after a failure
    pub failed: usize,
    /// Relationships deleted across all drained markers
    pub relationships_deleted: usize,
}

/// Drains [`PendingCleanup`] markers against the relationship graph.
#[derive(Clone)]
pub struct RelationshipCleaner {
    store: Arc<dyn Store>,
    graph: Arc<dyn RelationshipGraph>,
    events: Arc<dyn EventBus>,
    retry: RetryConfig,
    span: Span,
}

impl RelationshipCleaner {
    /// Create a cleaner.
    pub fn new(
        store: Arc<dyn Store>,
        graph: Arc<dyn RelationshipGraph>,
        events: Arc<dyn EventBus>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            graph,
            events,
            retry,
            span: Span::none(),
        }
    }

    /// Parent every cleanup span to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Delete the organization-scoped relationships owed by `cleanup` and
    /// mark it complete.
    ///
    /// Returns the number of relationships deleted. On error the marker
    /// stays open.
    #[instrument(
        parent = &self.span,
        skip(self, cleanup),
        fields(cleanup_id = %cleanup.id, user_id = %cleanup.user_id, organization_id = %cleanup.organization_id)
    )]
    pub async fn drain(&self, cleanup: &PendingCleanup) -> IamResult<usize> {
        let relationships = with_retry_if(
            &self.retry,
            || self.graph.get_all_relationships(cleanup.user_id),
            GraphError::is_transient,
        )
        .await?;

        let mut deleted = 0;
        for relationship in &relationships {
            let scoped = with_retry_if(
                &self.retry,
                || {
                    self.graph
                        .should_delete_on_departure(relationship, cleanup.organization_id)
                },
                GraphError::is_transient,
            )
            .await?;
            if !scoped {
                continue;
            }

            with_retry_if(
                &self.retry,
                || self.graph.delete_relationship(relationship),
                GraphError::is_transient,
            )
            .await?;
            deleted += 1;
        }

        self.store.complete_cleanup(cleanup.id).await?;
        info!(deleted = deleted, "Relationship cleanup completed");

        let event = LifecycleEvent::RelationshipsRevoked {
            organization_id: cleanup.organization_id,
            user_id: cleanup.user_id,
            count: deleted,
        };
        if let Err(e) = self.events.publish(event.to_event()).await {
            warn!(error = %e, "Failed to publish relationships revoked event");
        }

        Ok(deleted)
    }

    /// Drain every open marker, oldest first.
    ///
    /// A failing marker is logged and left open; the rest still run.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn drain_pending(&self) -> IamResult<CleanupReport> {
        let pending = self.store.pending_cleanups().await?;
        let mut report = CleanupReport::default();

        for cleanup in &pending {
            match self.drain(cleanup).await {
                Ok(deleted) => {
                    report.drained += 1;
                    report.relationships_deleted += deleted;
                }
                Err(e) => {
                    warn!(cleanup_id = %cleanup.id, error = %e, "Cleanup left pending");
                    report.failed += 1;
                }
            }
        }

        info!(
            drained = report.drained,
            failed = report.failed,
            "Drained pending cleanups"
        );
        Ok(report)
    }
}
