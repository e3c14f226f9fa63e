//! Hierarchical role visibility.
//!
//! A caller sees a role grant when they hold any role on the same resource.
//! Project grants are also visible to the administrator of the containing
//! workspace or organization. Unknown resource types are never visible.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use iam_rbac::{ResourceKind, ResourceRef, Role, RoleGrant};
use tracing::{debug, instrument, Span};
use uuid::Uuid;

use crate::error::IamResult;
use crate::graph::{GraphError, GraphResult, RelationshipGraph};

/// Resolved containers of a project. `None` means the graph has no parent.
#[derive(Debug, Clone, Copy, Default)]
struct Ancestry {
    workspace: Option<Uuid>,
    organization: Option<Uuid>,
}

/// Roles held by the caller, indexed for lookups.
struct Held {
    roles: HashSet<(Role, Uuid)>,
    any_workspace_admin: bool,
    any_organization_admin: bool,
}

impl Held {
    fn new(relationships: impl IntoIterator<Item = (Role, Uuid)>) -> Self {
        let roles: HashSet<(Role, Uuid)> = relationships.into_iter().collect();
        let any_workspace_admin = roles.iter().any(|(r, _)| *r == Role::WorkspaceAdmin);
        let any_organization_admin = roles.iter().any(|(r, _)| *r == Role::OrganizationAdmin);
        Self {
            roles,
            any_workspace_admin,
            any_organization_admin,
        }
    }

    fn has(&self, role: Role, resource_id: Uuid) -> bool {
        self.roles.contains(&(role, resource_id))
    }

    /// Any role of the resource's kind on exactly this resource.
    fn has_any_on(&self, resource: ResourceRef) -> bool {
        Role::ALL
            .iter()
            .filter(|role| role.resource_kind() == resource.kind)
            .any(|role| self.has(*role, resource.id))
    }
}

/// Filters role grants down to those a caller may see.
#[derive(Clone)]
pub struct RoleVisibilityFilter {
    graph: Arc<dyn RelationshipGraph>,
    span: Span,
}

impl RoleVisibilityFilter {
    /// Create a filter over `graph`.
    pub fn new(graph: Arc<dyn RelationshipGraph>) -> Self {
        Self {
            graph,
            span: Span::none(),
        }
    }

    /// Parent every filter span to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Keep the candidates visible to `caller_id`, preserving order and
    /// duplicates.
    ///
    /// The caller's relationships are fetched once. Project ancestry is
    /// resolved at most once per distinct project, and only when the caller
    /// holds an administrator role that could inherit visibility.
    #[instrument(
        parent = &self.span,
        skip(self, candidates),
        fields(caller_id = %caller_id, candidates = candidates.len())
    )]
    pub async fn filter(
        &self,
        caller_id: Uuid,
        candidates: Vec<RoleGrant>,
    ) -> IamResult<Vec<RoleGrant>> {
        let relationships = self.graph.get_all_relationships(caller_id).await?;
        if relationships.is_empty() {
            debug!("Caller holds no relationships");
            return Ok(Vec::new());
        }
        let held = Held::new(relationships.iter().map(|r| (r.role, r.resource_id)));

        let mut ancestry: HashMap<Uuid, Ancestry> = HashMap::new();
        let mut visible = Vec::with_capacity(candidates.len());

        for grant in candidates {
            let Some(resource) = grant.resource() else {
                debug!(resource_type = %grant.resource_type, "Unknown resource type, hidden");
                continue;
            };

            let allowed = match resource.kind {
                ResourceKind::Organization | ResourceKind::Workspace => held.has_any_on(resource),
                ResourceKind::Project => {
                    held.has_any_on(resource)
                        || self
                            .inherits_project(&held, resource.id, &mut ancestry)
                            .await?
                }
            };

            if allowed {
                visible.push(grant);
            }
        }

        debug!(visible = visible.len(), "Filtered role grants");
        Ok(visible)
    }

    async fn inherits_project(
        &self,
        held: &Held,
        project_id: Uuid,
        memo: &mut HashMap<Uuid, Ancestry>,
    ) -> IamResult<bool> {
        if !held.any_workspace_admin && !held.any_organization_admin {
            return Ok(false);
        }

        let ancestry = match memo.get(&project_id) {
            Some(ancestry) => *ancestry,
            None => {
                let resolved = self.resolve_ancestry(held, project_id).await?;
                memo.insert(project_id, resolved);
                resolved
            }
        };

        let via_workspace = ancestry
            .workspace
            .is_some_and(|ws| held.has(Role::WorkspaceAdmin, ws));
        let via_organization = ancestry
            .organization
            .is_some_and(|org| held.has(Role::OrganizationAdmin, org));
        Ok(via_workspace || via_organization)
    }

    async fn resolve_ancestry(&self, held: &Held, project_id: Uuid) -> IamResult<Ancestry> {
        let workspace = missing_as_none(self.graph.get_parent_workspace(project_id).await)?;
        let organization = match workspace {
            Some(ws) if held.any_organization_admin => {
                missing_as_none(self.graph.get_parent_organization(ws).await)?
            }
            _ => None,
        };
        Ok(Ancestry {
            workspace,
            organization,
        })
    }
}

/// A missing parent hides the grant instead of failing the whole filter.
fn missing_as_none(result: GraphResult<Uuid>) -> IamResult<Option<Uuid>> {
    match result {
        Ok(id) => Ok(Some(id)),
        Err(GraphError::NotFound { resource }) => {
            debug!(resource = %resource, "Ancestry unresolved");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    fn project_grant(project: Uuid) -> RoleGrant {
        RoleGrant::new(Uuid::now_v7(), "project_contributor", "project", project)
    }

    #[tokio::test]
    async fn test_direct_roles_on_same_resource() {
        let graph = Arc::new(MemoryGraph::new());
        let (caller, org, ws) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        graph.grant(caller, Role::OrganizationContributor, org).await;
        graph.grant(caller, Role::WorkspaceAdmin, ws).await;
        let filter = RoleVisibilityFilter::new(graph);

        let candidates = vec![
            RoleGrant::new(Uuid::now_v7(), "organization_admin", "organization", org),
            RoleGrant::new(Uuid::now_v7(), "workspace_contributor", "workspace", ws),
            RoleGrant::new(Uuid::now_v7(), "workspace_admin", "workspace", Uuid::now_v7()),
        ];
        let visible = filter.filter(caller, candidates.clone()).await.unwrap();
        assert_eq!(visible, candidates[..2].to_vec());
    }

    #[tokio::test]
    async fn test_unknown_resource_type_is_hidden() {
        let graph = Arc::new(MemoryGraph::new());
        let (caller, id) = (Uuid::now_v7(), Uuid::now_v7());
        graph.grant(caller, Role::OrganizationAdmin, id).await;
        let filter = RoleVisibilityFilter::new(graph);

        let dataset = RoleGrant::new(Uuid::now_v7(), "dataset_admin", "dataset", id);
        assert!(filter.filter(caller, vec![dataset]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_workspace_admin_inherits_project_without_org_lookup() {
        let graph = Arc::new(MemoryGraph::new());
        let (caller, org, ws, project) =
            (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        graph.add_workspace(ws, org).await;
        graph.add_project(project, ws).await;
        graph.grant(caller, Role::WorkspaceAdmin, ws).await;
        let filter = RoleVisibilityFilter::new(graph.clone());

        let visible = filter
            .filter(caller, vec![project_grant(project)])
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(graph.ancestry_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_ancestry_failure_propagates() {
        struct Flaky;

        #[async_trait::async_trait]
        impl RelationshipGraph for Flaky {
            async fn get_all_relationships(
                &self,
                user_id: Uuid,
            ) -> GraphResult<Vec<iam_rbac::Relationship>> {
                Ok(vec![iam_rbac::Relationship::new(
                    user_id,
                    Role::OrganizationAdmin,
                    Uuid::nil(),
                )])
            }
            async fn get_resource_relationships(
                &self,
                _resource: ResourceRef,
                _role: Role,
            ) -> GraphResult<Vec<iam_rbac::Relationship>> {
                Ok(Vec::new())
            }
            async fn get_parent_workspace(&self, _project_id: Uuid) -> GraphResult<Uuid> {
                Err(GraphError::Unavailable {
                    message: "timeout".to_string(),
                })
            }
            async fn get_parent_organization(&self, _workspace_id: Uuid) -> GraphResult<Uuid> {
                Ok(Uuid::nil())
            }
            async fn should_delete_on_departure(
                &self,
                _relationship: &iam_rbac::Relationship,
                _organization_id: Uuid,
            ) -> GraphResult<bool> {
                Ok(false)
            }
            async fn create_relationship(
                &self,
                _relationship: &iam_rbac::Relationship,
            ) -> GraphResult<()> {
                Ok(())
            }
            async fn delete_relationship(
                &self,
                _relationship: &iam_rbac::Relationship,
            ) -> GraphResult<()> {
                Ok(())
            }
        }

        let filter = RoleVisibilityFilter::new(Arc::new(Flaky));
        let err = filter
            .filter(Uuid::now_v7(), vec![project_grant(Uuid::now_v7())])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
