//! Relationship graph port.
//!
//! Role grants and the containment hierarchy live in an external
//! Zanzibar-style service. Its calls are not transactional with the store.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use iam_rbac::{Relationship, ResourceRef, Role};

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryGraph;

/// Relationship graph errors.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The resource is unknown to the graph.
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// The service could not be reached or timed out.
    #[error("relationship graph unavailable: {message}")]
    Unavailable { message: String },

    /// The service refused the request.
    #[error("relationship graph rejected request: {message}")]
    Rejected { message: String },
}

impl GraphError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::Unavailable { .. })
    }
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Abstract relationship graph.
#[async_trait]
pub trait RelationshipGraph: Send + Sync + 'static {
    /// Every relationship whose subject is `user_id`.
    async fn get_all_relationships(&self, user_id: Uuid) -> GraphResult<Vec<Relationship>>;

    /// Relationships on `resource` with relation `role`.
    async fn get_resource_relationships(
        &self,
        resource: ResourceRef,
        role: Role,
    ) -> GraphResult<Vec<Relationship>>;

    /// Workspace containing a project.
    async fn get_parent_workspace(&self, project_id: Uuid) -> GraphResult<Uuid>;

    /// Organization containing a workspace.
    async fn get_parent_organization(&self, workspace_id: Uuid) -> GraphResult<Uuid>;

    /// Whether `relationship` is scoped to `organization_id` and must go when
    /// its subject leaves that organization.
    async fn should_delete_on_departure(
        &self,
        relationship: &Relationship,
        organization_id: Uuid,
    ) -> GraphResult<bool>;

    /// Create a relationship. Creating an existing one is not an error.
    async fn create_relationship(&self, relationship: &Relationship) -> GraphResult<()>;

    /// Delete a relationship. Deleting a missing one is not an error.
    async fn delete_relationship(&self, relationship: &Relationship) -> GraphResult<()>;
}
