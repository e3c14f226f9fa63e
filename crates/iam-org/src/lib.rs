//! # Tenant Organization Model
//!
//! This crate provides the relational data model of the tenant IAM core:
//! organizations, their status history, users, per-organization memberships
//! and personal access tokens, together with the transition tables that
//! govern every status change.
//!
//! ## Overview
//!
//! The iam-org crate handles:
//! - **Status**: The shared `RGS / ACT / SSP / REQ / DEL` alphabet
//! - **Transitions**: A data-driven state machine engine shared by the
//!   organization and membership domains
//! - **Organizations**: Top-level tenants plus append-only status history
//! - **Memberships**: Per-organization user status rows with a single
//!   `current` row per `(user, organization)`
//! - **Tokens**: Personal access tokens scoped to a membership
//!
//! ## Architecture
//!
//! ```text
//! Organization ── OrganizationStatusHistory (append-only)
//!   └─ Membership (user, org)            current = true  ← authoritative
//!        ├─ Membership (history)         current = false
//!        └─ PersonalAccessToken (ACT | DEL)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use iam_org::{Membership, Status, TransitionTable};
//! use uuid::Uuid;
//!
//! let table = TransitionTable::membership();
//! let org_id = Uuid::now_v7();
//! let user_id = Uuid::now_v7();
//!
//! let membership = Membership::new(org_id, user_id, Status::Active, user_id);
//! assert!(table.transition(membership.status, Status::Suspended).is_ok());
//! assert!(table.transition(Status::Suspended, Status::Registered).is_err());
//! ```

pub mod membership;
pub mod organization;
pub mod status;
pub mod token;
pub mod transitions;
pub mod user;

// Re-export main types for convenience
pub use membership::Membership;
pub use organization::{Organization, OrganizationStatusHistory};
pub use status::{Status, TokenStatus};
pub use token::{IssuedToken, PersonalAccessToken, TokenError};
pub use transitions::{IllegalTransition, TableError, TransitionTable};
pub use user::User;
