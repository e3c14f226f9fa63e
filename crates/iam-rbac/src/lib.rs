//! # Tenant RBAC vocabulary
//!
//! This crate provides the closed role vocabulary used to talk to the
//! external relationship graph.
//!
//! ## Overview
//!
//! The iam-rbac crate handles:
//! - **Resources**: The three levels of the containment hierarchy
//! - **Roles**: Every `(resource kind, tier)` pair the platform grants
//! - **Relationships**: Subject–role–resource facts held by the graph
//! - **Role grants**: Candidate facts submitted for visibility filtering
//!
//! ## Architecture
//!
//! ```text
//! Organization ─┐ organization_admin | organization_contributor
//!   Workspace  ─┤ workspace_admin    | workspace_contributor
//!     Project  ─┘ project_manager    | project_contributor
//! ```
//!
//! Role names never appear as free strings inside the core: a relationship
//! carries a [`Role`], and the relation name is derived from it.
//!
//! ## Usage
//!
//! ```rust
//! use iam_rbac::{Relationship, ResourceKind, Role};
//! use uuid::Uuid;
//!
//! let user = Uuid::now_v7();
//! let project = Uuid::now_v7();
//! let rel = Relationship::new(user, Role::ProjectManager, project);
//!
//! assert_eq!(rel.resource().kind, ResourceKind::Project);
//! assert_eq!(rel.role.relation(), "project_manager");
//! assert_eq!(ResourceKind::Project.admin_role(), Role::ProjectManager);
//! ```

pub mod relationships;
pub mod resources;
pub mod roles;

// Re-export main types for convenience
pub use relationships::{Relationship, RoleGrant};
pub use resources::{ResourceKind, ResourceRef};
pub use roles::{Role, RoleTier};
