//! In-memory relationship graph for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use iam_rbac::{Relationship, ResourceKind, ResourceRef, Role};

use super::{GraphError, GraphResult, RelationshipGraph};

/// In-memory implementation of [`RelationshipGraph`].
///
/// Besides relationships it records the containment hierarchy and counts
/// calls so tests can assert on graph traffic.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    relationships: RwLock<HashSet<Relationship>>,
    /// project -> workspace
    project_parents: RwLock<HashMap<Uuid, Uuid>>,
    /// workspace -> organization
    workspace_parents: RwLock<HashMap<Uuid, Uuid>>,
    relationship_reads: AtomicUsize,
    ancestry_calls: AtomicUsize,
    failing_deletes: AtomicUsize,
    failing_reads: AtomicUsize,
}

impl MemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workspace under an organization.
    pub async fn add_workspace(&self, workspace_id: Uuid, organization_id: Uuid) {
        self.workspace_parents
            .write()
            .await
            .insert(workspace_id, organization_id);
    }

    /// Register a project under a workspace.
    pub async fn add_project(&self, project_id: Uuid, workspace_id: Uuid) {
        self.project_parents
            .write()
            .await
            .insert(project_id, workspace_id);
    }

    /// Insert a relationship directly.
    pub async fn grant(&self, user_id: Uuid, role: Role, resource_id: Uuid) {
        self.relationships
            .write()
            .await
            .insert(Relationship::new(user_id, role, resource_id));
    }

    /// Whether a relationship exists.
    pub async fn has(&self, user_id: Uuid, role: Role, resource_id: Uuid) -> bool {
        self.relationships
            .read()
            .await
            .contains(&Relationship::new(user_id, role, resource_id))
    }

    /// Number of relationships stored.
    pub async fn len(&self) -> usize {
        self.relationships.read().await.len()
    }

    /// Whether no relationships are stored.
    pub async fn is_empty(&self) -> bool {
        self.relationships.read().await.is_empty()
    }

    /// Number of ancestry calls served.
    pub fn ancestry_calls(&self) -> usize {
        self.ancestry_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_all_relationships` calls served.
    pub fn relationship_reads(&self) -> usize {
        self.relationship_reads.load(Ordering::SeqCst)
    }

    /// Make the next `n` deletes fail as unavailable.
    pub fn fail_next_deletes(&self, n: usize) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` relationship listings fail as unavailable.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn organization_of(&self, resource: ResourceRef) -> Option<Uuid> {
        let workspace = match resource.kind {
            ResourceKind::Organization => return Some(resource.id),
            ResourceKind::Workspace => resource.id,
            ResourceKind::Project => *self.project_parents.read().await.get(&resource.id)?,
        };
        self.workspace_parents.read().await.get(&workspace).copied()
    }
}

#[async_trait]
impl RelationshipGraph for MemoryGraph {
    async fn get_all_relationships(&self, user_id: Uuid) -> GraphResult<Vec<Relationship>> {
        self.relationship_reads.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_reads) {
            return Err(GraphError::Unavailable {
                message: "injected read failure".to_string(),
            });
        }
        Ok(self
            .relationships
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .copied()
            .collect())
    }

    async fn get_resource_relationships(
        &self,
        resource: ResourceRef,
        role: Role,
    ) -> GraphResult<Vec<Relationship>> {
        Ok(self
            .relationships
            .read()
            .await
            .iter()
            .filter(|r| r.role == role && r.resource() == resource)
            .copied()
            .collect())
    }

    async fn get_parent_workspace(&self, project_id: Uuid) -> GraphResult<Uuid> {
        self.ancestry_calls.fetch_add(1, Ordering::SeqCst);
        self.project_parents
            .read()
            .await
            .get(&project_id)
            .copied()
            .ok_or_else(|| GraphError::NotFound {
                resource: ResourceRef::project(project_id).to_string(),
            })
    }

    async fn get_parent_organization(&self, workspace_id: Uuid) -> GraphResult<Uuid> {
        self.ancestry_calls.fetch_add(1, Ordering::SeqCst);
        self.workspace_parents
            .read()
            .await
            .get(&workspace_id)
            .copied()
            .ok_or_else(|| GraphError::NotFound {
                resource: ResourceRef::workspace(workspace_id).to_string(),
            })
    }

    async fn should_delete_on_departure(
        &self,
        relationship: &Relationship,
        organization_id: Uuid,
    ) -> GraphResult<bool> {
        Ok(self.organization_of(relationship.resource()).await == Some(organization_id))
    }

    async fn create_relationship(&self, relationship: &Relationship) -> GraphResult<()> {
        self.relationships.write().await.insert(*relationship);
        Ok(())
    }

    async fn delete_relationship(&self, relationship: &Relationship) -> GraphResult<()> {
        if Self::take_failure(&self.failing_deletes) {
            return Err(GraphError::Unavailable {
                message: "injected delete failure".to_string(),
            });
        }
        self.relationships.write().await.remove(relationship);
        Ok(())
    }
}
