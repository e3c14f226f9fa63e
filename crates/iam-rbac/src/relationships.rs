//! # Relationships
//!
//! Facts held by the external relationship graph, and the candidate role
//! grants submitted to visibility filtering.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::{ResourceKind, ResourceRef};
use crate::roles::Role;

/// A `(user, role, resource)` fact in the relationship graph.
///
/// The resource kind is implied by the role, so a relationship can never
/// pair a role with the wrong kind of resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Relationship {
    /// Subject user.
    pub user_id: Uuid,
    /// Granted role.
    pub role: Role,
    /// ID of the resource the role is granted on.
    pub resource_id: Uuid,
}

impl Relationship {
    /// Create a relationship.
    pub fn new(user_id: Uuid, role: Role, resource_id: Uuid) -> Self {
        Self {
            user_id,
            role,
            resource_id,
        }
    }

    /// The resource the role is granted on.
    pub fn resource(&self) -> ResourceRef {
        ResourceRef {
            kind: self.role.resource_kind(),
            id: self.resource_id,
        }
    }
}

/// A role grant as submitted by a caller for visibility filtering.
///
/// Grants arrive from outside the core and may name resource types or roles
/// the platform does not model; those are kept as strings and never match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoleGrant {
    /// Subject user.
    pub user_id: Uuid,
    /// Role name as given.
    pub role: String,
    /// Resource type as given.
    pub resource_type: String,
    /// Resource ID.
    pub resource_id: Uuid,
}

impl RoleGrant {
    /// Create a grant from raw parts.
    pub fn new(
        user_id: Uuid,
        role: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Uuid,
    ) -> Self {
        Self {
            user_id,
            role: role.into(),
            resource_type: resource_type.into(),
            resource_id,
        }
    }

    /// The referenced resource, if its type is modeled.
    pub fn resource(&self) -> Option<ResourceRef> {
        ResourceKind::parse(&self.resource_type).map(|kind| ResourceRef {
            kind,
            id: self.resource_id,
        })
    }
}

impl From<Relationship> for RoleGrant {
    fn from(rel: Relationship) -> Self {
        Self {
            user_id: rel.user_id,
            role: rel.role.relation().to_string(),
            resource_type: rel.role.resource_kind().as_str().to_string(),
            resource_id: rel.resource_id,
        }
    }
}
