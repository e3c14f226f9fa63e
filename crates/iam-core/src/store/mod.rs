//! Transactional store port.
//!
//! The lifecycle manager needs a relational store that can run a unit of
//! work: the first read of a row inside a transaction locks it until the
//! transaction commits or rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use iam_org::{
    Membership, Organization, OrganizationStatusHistory, PersonalAccessToken, Status,
    TokenStatus, User,
};

use crate::error::{IamError, IamResult};

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint or concurrent-write conflict.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Database connection error.
    #[error("database connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Transaction error.
    #[error("transaction error: {message}")]
    TransactionError { message: String },
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Outbox marker for graph cleanup owed after a committed membership
/// deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCleanup {
    /// Marker ID
    pub id: Uuid,
    /// User who left the organization
    pub user_id: Uuid,
    /// Organization the user left
    pub organization_id: Uuid,
    /// When the deletion committed
    pub created_at: DateTime<Utc>,
    /// When the graph cleanup was confirmed
    pub completed_at: Option<DateTime<Utc>>,
}

impl PendingCleanup {
    /// Create an open marker.
    pub fn new(organization_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            organization_id,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the cleanup has been confirmed.
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Abstract relational store.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Begin a unit of work.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Read an organization outside any transaction.
    async fn get_organization(&self, organization_id: Uuid) -> StoreResult<Option<Organization>>;

    /// All membership rows of a pair, oldest first.
    async fn membership_history(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<Membership>>;

    /// All status history rows of an organization, oldest first.
    async fn organization_history(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<OrganizationStatusHistory>>;

    /// Tokens of a user within an organization.
    async fn tokens(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<PersonalAccessToken>>;

    /// Cleanup markers not yet completed, oldest first.
    async fn pending_cleanups(&self) -> StoreResult<Vec<PendingCleanup>>;

    /// Mark a cleanup as completed. Completing twice is not an error.
    async fn complete_cleanup(&self, cleanup_id: Uuid) -> StoreResult<()>;
}

/// A unit of work against the store.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    // Organizations

    /// Load an organization, locking its row.
    async fn load_organization(&mut self, organization_id: Uuid)
        -> StoreResult<Option<Organization>>;

    /// Insert a new organization.
    async fn insert_organization(&mut self, organization: &Organization) -> StoreResult<()>;

    /// Set an organization's status and modification fields.
    async fn update_organization_status(
        &mut self,
        organization_id: Uuid,
        status: Status,
        actor: Uuid,
    ) -> StoreResult<()>;

    /// Append an organization status history row.
    async fn insert_org_status_history(
        &mut self,
        row: &OrganizationStatusHistory,
    ) -> StoreResult<()>;

    // Users

    /// Load a user profile.
    async fn load_user(&mut self, user_id: Uuid) -> StoreResult<Option<User>>;

    /// Insert a user profile.
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;

    // Memberships

    /// Load the current membership row of a pair, locking it.
    async fn load_current_membership(
        &mut self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Option<Membership>>;

    /// All current membership rows of an organization, locking them.
    async fn list_current_memberships(
        &mut self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Membership>>;

    /// Persist changes to an existing membership row.
    async fn save_membership(&mut self, row: &Membership) -> StoreResult<()>;

    /// Insert a membership row.
    async fn insert_membership(&mut self, row: &Membership) -> StoreResult<()>;

    // Tokens

    /// Insert a personal access token.
    async fn insert_token(&mut self, token: &PersonalAccessToken) -> StoreResult<()>;

    /// Move every token of the pair in status `from` to status `to`.
    ///
    /// Returns the number of tokens changed.
    async fn bulk_update_token_status(
        &mut self,
        user_id: Uuid,
        organization_id: Uuid,
        from: TokenStatus,
        to: TokenStatus,
    ) -> StoreResult<u64>;

    // Outbox

    /// Record graph cleanup owed once this transaction commits.
    async fn insert_pending_cleanup(&mut self, row: &PendingCleanup) -> StoreResult<()>;

    // Completion

    /// Commit all writes.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard all writes.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Commit `tx` if `result` succeeded and the caller has not cancelled;
/// otherwise roll it back.
pub async fn complete_transaction<T>(
    tx: Box<dyn StoreTransaction>,
    result: IamResult<T>,
    cancel: &CancellationToken,
) -> IamResult<T> {
    match result {
        Ok(_) if cancel.is_cancelled() => {
            tracing::info!("Cancelled before commit, rolling back");
            rollback_quietly(tx).await;
            Err(IamError::Cancelled)
        }
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            rollback_quietly(tx).await;
            Err(err)
        }
    }
}

async fn rollback_quietly(tx: Box<dyn StoreTransaction>) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "Rollback failed");
    }
}
