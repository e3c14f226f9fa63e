//! Role grants and revocations.

use std::sync::Arc;

use iam_rbac::{Relationship, ResourceKind, ResourceRef, Role, RoleGrant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, Span};
use uuid::Uuid;

use crate::error::{IamError, IamResult};
use crate::graph::RelationshipGraph;
use crate::guard::LastAdminGuard;
use crate::store::Store;
use crate::visibility::RoleVisibilityFilter;

/// Grants, revokes and lists roles on organizations, workspaces and
/// projects.
#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn Store>,
    graph: Arc<dyn RelationshipGraph>,
    guard: LastAdminGuard,
    filter: RoleVisibilityFilter,
    span: Span,
}

impl RoleService {
    /// Create a role service.
    pub fn new(store: Arc<dyn Store>, graph: Arc<dyn RelationshipGraph>) -> Self {
        Self {
            guard: LastAdminGuard::new(graph.clone()),
            filter: RoleVisibilityFilter::new(graph.clone()),
            store,
            graph,
            span: Span::none(),
        }
    }

    /// Parent every role span to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.filter = self.filter.with_span(span.clone());
        self.span = span;
        self
    }

    /// Grant `role` on `resource` to `user_id`.
    ///
    /// The owning organization must exist and must not be deleted.
    #[instrument(
        parent = &self.span,
        skip(self, cancel),
        fields(role = %role, resource = %resource, user_id = %user_id)
    )]
    pub async fn grant_role(
        &self,
        role: Role,
        resource: ResourceRef,
        user_id: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<Relationship> {
        check_role_matches(role, resource)?;

        let organization_id = self.owning_organization(resource).await?;
        let organization = self
            .store
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| IamError::NotFound(format!("organization {}", organization_id)))?;
        if organization.is_deleted() {
            return Err(IamError::FailedPrecondition(format!(
                "organization {} is deleted",
                organization_id
            )));
        }
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        let relationship = Relationship::new(user_id, role, resource.id);
        self.graph.create_relationship(&relationship).await?;
        info!("Role granted");
        Ok(relationship)
    }

    /// Revoke `role` on `resource` from `user_id`.
    ///
    /// Revoking an administrative role runs the last-administrator guard
    /// against the owning organization's status. Revoking a role the user
    /// does not hold succeeds.
    #[instrument(
        parent = &self.span,
        skip(self, cancel),
        fields(role = %role, resource = %resource, user_id = %user_id)
    )]
    pub async fn revoke_role(
        &self,
        role: Role,
        resource: ResourceRef,
        user_id: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<()> {
        check_role_matches(role, resource)?;

        if role == resource.kind.admin_role() {
            let organization_id = self.owning_organization(resource).await?;
            let organization = self
                .store
                .get_organization(organization_id)
                .await?
                .ok_or_else(|| {
                    IamError::NotFound(format!("organization {}", organization_id))
                })?;
            self.guard
                .check_removal_allowed(resource, user_id, organization.status)
                .await?;
        }
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        self.graph
            .delete_relationship(&Relationship::new(user_id, role, resource.id))
            .await?;
        info!("Role revoked");
        Ok(())
    }

    /// Role grants among `candidates` that `caller_id` may see.
    pub async fn visible_roles(
        &self,
        caller_id: Uuid,
        candidates: Vec<RoleGrant>,
    ) -> IamResult<Vec<RoleGrant>> {
        self.filter.filter(caller_id, candidates).await
    }

    async fn owning_organization(&self, resource: ResourceRef) -> IamResult<Uuid> {
        let workspace = match resource.kind {
            ResourceKind::Organization => return Ok(resource.id),
            ResourceKind::Workspace => resource.id,
            ResourceKind::Project => self.graph.get_parent_workspace(resource.id).await?,
        };
        Ok(self.graph.get_parent_organization(workspace).await?)
    }
}

fn check_role_matches(role: Role, resource: ResourceRef) -> IamResult<()> {
    if role.resource_kind() != resource.kind {
        return Err(IamError::InvalidArgument(format!(
            "role {} does not apply to {}",
            role, resource.kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::graph::MemoryGraph;
    use crate::store::MemoryStore;
    use iam_org::{Organization, Status};

    async fn setup(status: Status) -> (RoleService, Arc<MemoryGraph>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let graph = Arc::new(MemoryGraph::new());
        let owner = Uuid::now_v7();
        let mut org = Organization::new("Acme", owner);
        org.apply_status(status, owner);
        let (org_id, ws) = (org.id, Uuid::now_v7());
        store.insert_organization(org).await;
        graph.add_workspace(ws, org_id).await;
        graph.grant(owner, Role::WorkspaceAdmin, ws).await;
        (RoleService::new(store, graph.clone()), graph, ws, owner)
    }

    #[tokio::test]
    async fn test_grant_and_revoke_contributor() {
        let (service, graph, ws, _) = setup(Status::Active).await;
        let cancel = CancellationToken::new();
        let user = Uuid::now_v7();

        service
            .grant_role(Role::WorkspaceContributor, ResourceRef::workspace(ws), user, &cancel)
            .await
            .unwrap();
        assert!(graph.has(user, Role::WorkspaceContributor, ws).await);

        service
            .revoke_role(Role::WorkspaceContributor, ResourceRef::workspace(ws), user, &cancel)
            .await
            .unwrap();
        assert!(!graph.has(user, Role::WorkspaceContributor, ws).await);
    }

    #[tokio::test]
    async fn test_role_must_match_resource_kind() {
        let (service, _, ws, user) = setup(Status::Active).await;
        let err = service
            .grant_role(
                Role::ProjectManager,
                ResourceRef::workspace(ws),
                user,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_last_workspace_admin_is_protected_in_active_org() {
        let (service, graph, ws, owner) = setup(Status::Active).await;
        let cancel = CancellationToken::new();

        let err = service
            .revoke_role(Role::WorkspaceAdmin, ResourceRef::workspace(ws), owner, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(graph.has(owner, Role::WorkspaceAdmin, ws).await);
    }

    #[tokio::test]
    async fn test_last_workspace_admin_may_leave_registered_org() {
        let (service, graph, ws, owner) = setup(Status::Registered).await;

        service
            .revoke_role(
                Role::WorkspaceAdmin,
                ResourceRef::workspace(ws),
                owner,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!graph.has(owner, Role::WorkspaceAdmin, ws).await);
    }

    #[tokio::test]
    async fn test_grant_in_deleted_org_fails() {
        let (service, _, ws, _) = setup(Status::Deleted).await;
        let err = service
            .grant_role(
                Role::WorkspaceContributor,
                ResourceRef::workspace(ws),
                Uuid::now_v7(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }
}
