//! # Roles
//!
//! Every role is a `(resource kind, tier)` pair. The set is closed so that
//! visibility and administration rules can be matched exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resources::ResourceKind;

/// Privilege tier of a role within its resource kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoleTier {
    /// Full control of an organization or workspace.
    Admin,
    /// Full control of a project.
    Manager,
    /// Can contribute content.
    Contributor,
}

impl RoleTier {
    /// Get the string representation of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTier::Admin => "admin",
            RoleTier::Manager => "manager",
            RoleTier::Contributor => "contributor",
        }
    }
}

/// A role the relationship graph can grant.
///
/// The serialized form is the graph relation name, e.g. `workspace_admin`.
///
/// # Example
///
/// ```
/// use iam_rbac::{ResourceKind, Role, RoleTier};
///
/// let role = Role::from_parts(ResourceKind::Workspace, RoleTier::Admin).unwrap();
/// assert_eq!(role, Role::WorkspaceAdmin);
/// assert_eq!(Role::parse("workspace_admin"), Some(role));
/// assert!(Role::from_parts(ResourceKind::Project, RoleTier::Admin).is_none());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administers an organization.
    OrganizationAdmin,
    /// Contributes within an organization.
    OrganizationContributor,
    /// Administers a workspace.
    WorkspaceAdmin,
    /// Contributes within a workspace.
    WorkspaceContributor,
    /// Manages a project.
    ProjectManager,
    /// Contributes within a project.
    ProjectContributor,
}

impl Role {
    /// Every role.
    pub const ALL: [Role; 6] = [
        Role::OrganizationAdmin,
        Role::OrganizationContributor,
        Role::WorkspaceAdmin,
        Role::WorkspaceContributor,
        Role::ProjectManager,
        Role::ProjectContributor,
    ];

    /// The kind of resource this role is granted on.
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            Role::OrganizationAdmin | Role::OrganizationContributor => ResourceKind::Organization,
            Role::WorkspaceAdmin | Role::WorkspaceContributor => ResourceKind::Workspace,
            Role::ProjectManager | Role::ProjectContributor => ResourceKind::Project,
        }
    }

    /// The tier of this role.
    pub fn tier(&self) -> RoleTier {
        match self {
            Role::OrganizationAdmin | Role::WorkspaceAdmin => RoleTier::Admin,
            Role::ProjectManager => RoleTier::Manager,
            Role::OrganizationContributor
            | Role::WorkspaceContributor
            | Role::ProjectContributor => RoleTier::Contributor,
        }
    }

    /// Build a role from its parts, if the pair exists.
    pub fn from_parts(kind: ResourceKind, tier: RoleTier) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|r| r.resource_kind() == kind && r.tier() == tier)
    }

    /// Relation name in the graph.
    pub fn relation(&self) -> &'static str {
        match self {
            Role::OrganizationAdmin => "organization_admin",
            Role::OrganizationContributor => "organization_contributor",
            Role::WorkspaceAdmin => "workspace_admin",
            Role::WorkspaceContributor => "workspace_contributor",
            Role::ProjectManager => "project_manager",
            Role::ProjectContributor => "project_contributor",
        }
    }

    /// Parse a role from its relation name.
    pub fn parse(s: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.relation() == s)
    }

    /// Whether this role administers its resource.
    pub fn is_admin(&self) -> bool {
        *self == self.resource_kind().admin_role()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_names_are_kind_and_tier() {
        for role in Role::ALL {
            assert_eq!(
                role.relation(),
                format!("{}_{}", role.resource_kind().as_str(), role.tier().as_str())
            );
            assert_eq!(Role::parse(role.relation()), Some(role));
            assert_eq!(
                Role::from_parts(role.resource_kind(), role.tier()),
                Some(role)
            );
        }
    }

    #[test]
    fn test_missing_pairs() {
        assert!(Role::from_parts(ResourceKind::Organization, RoleTier::Manager).is_none());
        assert!(Role::from_parts(ResourceKind::Project, RoleTier::Admin).is_none());
        assert_eq!(Role::parse("project_admin"), None);
    }

    #[test]
    fn test_admin_roles() {
        let admins: Vec<Role> = Role::ALL.into_iter().filter(Role::is_admin).collect();
        assert_eq!(
            admins,
            vec![Role::OrganizationAdmin, Role::WorkspaceAdmin, Role::ProjectManager]
        );
    }

    #[test]
    fn test_serde_uses_relation_name() {
        let json = serde_json::to_string(&Role::ProjectContributor).unwrap();
        assert_eq!(json, "\"project_contributor\"");
    }
}
