//! Organization domain models
//!
//! This module provides the Organization entity, the top-level tenant, and
//! its append-only status history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::Status;

/// An organization represents a tenant in the multi-tenant system.
///
/// Organizations own workspaces, which own projects. The status of an
/// organization is governed by the organization transition table; every
/// change is recorded as an [`OrganizationStatusHistory`] row.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use iam_org::{Organization, Status};
///
/// let creator = Uuid::now_v7();
/// let org = Organization::new("Acme Corp", creator);
/// assert_eq!(org.name, "Acme Corp");
/// assert_eq!(org.status, Status::Registered);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier for the organization
    pub id: Uuid,

    /// Human-readable name
    pub name: String,

    /// Current lifecycle status
    pub status: Status,

    /// User who registered the organization
    pub created_by: Uuid,

    /// When the organization was registered
    pub created_at: DateTime<Utc>,

    /// User who last changed the organization
    pub modified_by: Option<Uuid>,

    /// When the organization was last changed
    pub modified_at: Option<DateTime<Utc>>,
}

impl Organization {
    /// Creates a new organization in the registered status.
    ///
    /// # Arguments
    ///
    /// * `name` - The organization name
    /// * `created_by` - The user registering the organization
    pub fn new(name: impl Into<String>, created_by: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            status: Status::Registered,
            created_by,
            created_at: Utc::now(),
            modified_by: None,
            modified_at: None,
        }
    }

    /// Apply a status change and stamp the modification fields.
    ///
    /// This does not check legality; callers run the transition table first.
    pub fn apply_status(&mut self, status: Status, actor: Uuid) {
        self.status = status;
        self.modified_by = Some(actor);
        self.modified_at = Some(Utc::now());
    }

    /// Whether the organization has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.status == Status::Deleted
    }
}

/// One row of an organization's status history.
///
/// Rows are written once per successful status change and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationStatusHistory {
    /// Row ID
    pub id: Uuid,

    /// Organization ID
    pub organization_id: Uuid,

    /// Status entered
    pub status: Status,

    /// Who made the change
    pub created_by: Uuid,

    /// When the change was made
    pub created_at: DateTime<Utc>,
}

impl OrganizationStatusHistory {
    /// Record that `organization_id` entered `status`.
    pub fn new(organization_id: Uuid, status: Status, created_by: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            organization_id,
            status,
            created_by,
            created_at: Utc::now(),
        }
    }
}
