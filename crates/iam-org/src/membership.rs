//! Membership domain models
//!
//! A membership row records a user's status within one organization. Rows
//! are never deleted: a status change retires the current row and appends a
//! successor, so the rows for a `(user, organization)` pair form its history
//! and exactly one of them (at most) is flagged `current`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::Status;

/// Membership status row linking a user to an organization.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use iam_org::{Membership, Status};
///
/// let org_id = Uuid::now_v7();
/// let user_id = Uuid::now_v7();
/// let mut row = Membership::new(org_id, user_id, Status::Active, user_id);
/// assert!(row.current);
///
/// let next = row.succeed(Status::Suspended, user_id);
/// assert!(!row.current);
/// assert!(next.current);
/// assert_eq!(next.status, Status::Suspended);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    /// Row ID
    pub id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Organization ID
    pub organization_id: Uuid,

    /// Membership status
    pub status: Status,

    /// Whether this row is the authoritative state for the pair
    pub current: bool,

    /// Who wrote this row
    pub created_by: Uuid,

    /// When this row was written
    pub created_at: DateTime<Utc>,
}

impl Membership {
    /// Creates the first, current row for a `(user, organization)` pair.
    ///
    /// # Arguments
    ///
    /// * `organization_id` - The organization ID
    /// * `user_id` - The user ID
    /// * `status` - Initial membership status
    /// * `created_by` - Who created the membership
    pub fn new(organization_id: Uuid, user_id: Uuid, status: Status, created_by: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            organization_id,
            status,
            current: true,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// Retire this row and return its current successor with `status`.
    pub fn succeed(&mut self, status: Status, actor: Uuid) -> Membership {
        self.current = false;
        Membership::new(self.organization_id, self.user_id, status, actor)
    }

    /// Whether this row grants access.
    pub fn is_active(&self) -> bool {
        self.current && self.status == Status::Active
    }
}
