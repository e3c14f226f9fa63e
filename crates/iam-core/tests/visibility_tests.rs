//! Tests for hierarchical role visibility.

use std::sync::Arc;

use iam_core::{MemoryGraph, MemoryStore, RoleService, RoleVisibilityFilter};
use iam_rbac::{Role, RoleGrant};
use uuid::Uuid;

/// Organization with two workspaces, each holding projects.
struct Tree {
    org: Uuid,
    ws: Uuid,
    other_ws: Uuid,
    project: Uuid,
    other_project: Uuid,
}

async fn tree(graph: &MemoryGraph) -> Tree {
    let tree = Tree {
        org: Uuid::now_v7(),
        ws: Uuid::now_v7(),
        other_ws: Uuid::now_v7(),
        project: Uuid::now_v7(),
        other_project: Uuid::now_v7(),
    };
    graph.add_workspace(tree.ws, tree.org).await;
    graph.add_workspace(tree.other_ws, tree.org).await;
    graph.add_project(tree.project, tree.ws).await;
    graph.add_project(tree.other_project, tree.other_ws).await;
    tree
}

fn grant(role: &str, resource_type: &str, resource_id: Uuid) -> RoleGrant {
    RoleGrant::new(Uuid::now_v7(), role, resource_type, resource_id)
}

#[tokio::test]
async fn test_org_admin_sees_project_grants_through_ancestry() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;
    let caller = Uuid::now_v7();
    graph.grant(caller, Role::OrganizationAdmin, t.org).await;

    let orphan = Uuid::now_v7();
    let candidates = vec![
        grant("project_manager", "project", t.project),
        grant("project_contributor", "project", orphan),
        grant("project_contributor", "project", t.other_project),
    ];

    let visible = RoleVisibilityFilter::new(graph)
        .filter(caller, candidates.clone())
        .await
        .unwrap();
    assert_eq!(visible, vec![candidates[0].clone(), candidates[2].clone()]);
}

#[tokio::test]
async fn test_workspace_admin_only_sees_own_projects() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;
    let caller = Uuid::now_v7();
    graph.grant(caller, Role::WorkspaceAdmin, t.ws).await;

    let candidates = vec![
        grant("project_contributor", "project", t.project),
        grant("project_contributor", "project", t.other_project),
        grant("organization_admin", "organization", t.org),
    ];

    let visible = RoleVisibilityFilter::new(graph)
        .filter(caller, candidates.clone())
        .await
        .unwrap();
    assert_eq!(visible, vec![candidates[0].clone()]);
}

#[tokio::test]
async fn test_ancestry_is_resolved_once_per_project() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;
    let caller = Uuid::now_v7();
    graph.grant(caller, Role::OrganizationAdmin, t.org).await;

    let mut candidates = Vec::new();
    for _ in 0..5 {
        candidates.push(grant("project_manager", "project", t.project));
        candidates.push(grant("project_contributor", "project", t.other_project));
    }

    let visible = RoleVisibilityFilter::new(graph.clone())
        .filter(caller, candidates)
        .await
        .unwrap();
    assert_eq!(visible.len(), 10);
    assert!(graph.ancestry_calls() <= 2 * 2);
    assert_eq!(graph.relationship_reads(), 1);
}

#[tokio::test]
async fn test_duplicates_and_order_are_preserved() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;
    let caller = Uuid::now_v7();
    graph.grant(caller, Role::WorkspaceContributor, t.ws).await;
    graph.grant(caller, Role::ProjectContributor, t.project).await;

    let ws_grant = grant("workspace_admin", "workspace", t.ws);
    let project_grant = grant("project_manager", "project", t.project);
    let candidates = vec![
        project_grant.clone(),
        ws_grant.clone(),
        project_grant.clone(),
        grant("dataset_admin", "dataset", t.ws),
        ws_grant.clone(),
    ];

    let visible = RoleVisibilityFilter::new(graph.clone())
        .filter(caller, candidates)
        .await
        .unwrap();
    assert_eq!(
        visible,
        vec![project_grant.clone(), ws_grant.clone(), project_grant, ws_grant]
    );
    assert_eq!(graph.ancestry_calls(), 0);
}

#[tokio::test]
async fn test_caller_without_relationships_sees_nothing() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;

    let visible = RoleVisibilityFilter::new(graph.clone())
        .filter(
            Uuid::now_v7(),
            vec![
                grant("organization_admin", "organization", t.org),
                grant("project_manager", "project", t.project),
            ],
        )
        .await
        .unwrap();
    assert!(visible.is_empty());
    assert_eq!(graph.ancestry_calls(), 0);
}

#[tokio::test]
async fn test_unknown_resource_types_fail_closed() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;
    let caller = Uuid::now_v7();
    for role in Role::ALL {
        graph.grant(caller, role, t.org).await;
    }

    let visible = RoleVisibilityFilter::new(graph)
        .filter(
            caller,
            vec![
                grant("dataset_admin", "dataset", t.org),
                grant("admin", "", t.org),
            ],
        )
        .await
        .unwrap();
    assert!(visible.is_empty());
}

#[tokio::test]
async fn test_role_service_delegates_to_filter() {
    let graph = Arc::new(MemoryGraph::new());
    let t = tree(&graph).await;
    let caller = Uuid::now_v7();
    graph.grant(caller, Role::OrganizationAdmin, t.org).await;
    let service = RoleService::new(Arc::new(MemoryStore::new()), graph);

    let candidates = vec![
        grant("workspace_admin", "workspace", t.ws),
        grant("project_manager", "project", t.project),
    ];
    let visible = service.visible_roles(caller, candidates.clone()).await.unwrap();
    assert_eq!(visible, vec![candidates[1].clone()]);
}
