//! # Resource Types
//!
//! The containment hierarchy: projects belong to workspaces, workspaces
//! belong to organizations.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::roles::Role;

/// Level of the containment hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Top-level tenant.
    Organization,
    /// Grouping of projects within an organization.
    Workspace,
    /// Leaf resource within a workspace.
    Project,
}

impl ResourceKind {
    /// Get the string representation of the resource kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Organization => "organization",
            ResourceKind::Workspace => "workspace",
            ResourceKind::Project => "project",
        }
    }

    /// Parse a resource kind from its string representation.
    ///
    /// Unknown kinds return `None`; callers treat them as unmodeled.
    ///
    /// # Example
    ///
    /// ```
    /// use iam_rbac::ResourceKind;
    ///
    /// assert_eq!(ResourceKind::parse("Workspace"), Some(ResourceKind::Workspace));
    /// assert_eq!(ResourceKind::parse("dataset"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "organization" => Some(ResourceKind::Organization),
            "workspace" => Some(ResourceKind::Workspace),
            "project" => Some(ResourceKind::Project),
            _ => None,
        }
    }

    /// The kind directly above this one, if any.
    pub fn parent(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::Organization => None,
            ResourceKind::Workspace => Some(ResourceKind::Organization),
            ResourceKind::Project => Some(ResourceKind::Workspace),
        }
    }

    /// The role that administers resources of this kind.
    ///
    /// Projects have no admin tier; their managers administer them.
    pub fn admin_role(&self) -> Role {
        match self {
            ResourceKind::Organization => Role::OrganizationAdmin,
            ResourceKind::Workspace => Role::WorkspaceAdmin,
            ResourceKind::Project => Role::ProjectManager,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete resource in the hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource ID.
    pub id: Uuid,
}

impl ResourceRef {
    /// Reference an organization.
    pub fn organization(id: Uuid) -> Self {
        Self {
            kind: ResourceKind::Organization,
            id,
        }
    }

    /// Reference a workspace.
    pub fn workspace(id: Uuid) -> Self {
        Self {
            kind: ResourceKind::Workspace,
            id,
        }
    }

    /// Reference a project.
    pub fn project(id: Uuid) -> Self {
        Self {
            kind: ResourceKind::Project,
            id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_round_trip() {
        for kind in [
            ResourceKind::Organization,
            ResourceKind::Workspace,
            ResourceKind::Project,
        ] {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::parse("team"), None);
    }

    #[test]
    fn test_hierarchy_parents() {
        assert_eq!(ResourceKind::Project.parent(), Some(ResourceKind::Workspace));
        assert_eq!(
            ResourceKind::Workspace.parent(),
            Some(ResourceKind::Organization)
        );
        assert_eq!(ResourceKind::Organization.parent(), None);
    }

    #[test]
    fn test_admin_roles_match_kind() {
        for kind in [
            ResourceKind::Organization,
            ResourceKind::Workspace,
            ResourceKind::Project,
        ] {
            assert_eq!(kind.admin_role().resource_kind(), kind);
        }
    }

    #[test]
    fn test_resource_ref_display() {
        let id = Uuid::nil();
        assert_eq!(
            ResourceRef::workspace(id).to_string(),
            "workspace:00000000-0000-0000-0000-000000000000"
        );
    }
}
