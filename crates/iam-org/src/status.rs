//! Status alphabet
//!
//! Organizations and memberships share one five-state alphabet. Personal
//! access tokens use a reduced two-state alphabet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an organization or a membership.
///
/// Statuses are persisted and exchanged using their three-letter codes.
///
/// # Examples
///
/// ```
/// use iam_org::Status;
///
/// assert_eq!(Status::parse("ACT"), Some(Status::Active));
/// assert_eq!(Status::parse("suspended"), Some(Status::Suspended));
/// assert_eq!(Status::Deleted.code(), "DEL");
/// assert!(Status::Deleted.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// Registered but not yet onboarded
    #[serde(rename = "RGS")]
    Registered,

    /// Fully active
    #[serde(rename = "ACT")]
    Active,

    /// Suspended by an administrator
    #[serde(rename = "SSP")]
    Suspended,

    /// Access has been requested and awaits approval
    #[serde(rename = "REQ")]
    AccessRequested,

    /// Deleted (terminal)
    #[serde(rename = "DEL")]
    Deleted,
}

impl Status {
    /// Every status, in code order.
    pub const ALL: [Status; 5] = [
        Status::Registered,
        Status::Active,
        Status::Suspended,
        Status::AccessRequested,
        Status::Deleted,
    ];

    /// Get the three-letter code used on the wire and in storage.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Registered => "RGS",
            Self::Active => "ACT",
            Self::Suspended => "SSP",
            Self::AccessRequested => "REQ",
            Self::Deleted => "DEL",
        }
    }

    /// Parse a status from its code or its long name (case-insensitive).
    ///
    /// # Returns
    ///
    /// `Some(Status)` if valid, `None` otherwise
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rgs" | "registered" => Some(Self::Registered),
            "act" | "active" => Some(Self::Active),
            "ssp" | "suspended" => Some(Self::Suspended),
            "req" | "access_requested" => Some(Self::AccessRequested),
            "del" | "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether no status other than itself can follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Whether the owner has completed onboarding.
    ///
    /// Registered and access-requested organizations never finished
    /// provisioning; every other status has.
    pub fn is_provisioned(&self) -> bool {
        !matches!(self, Self::Registered | Self::AccessRequested)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Status of a personal access token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TokenStatus {
    /// Usable until it expires
    #[serde(rename = "ACT")]
    Active,

    /// Revoked
    #[serde(rename = "DEL")]
    Deleted,
}

impl TokenStatus {
    /// Get the three-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Active => "ACT",
            Self::Deleted => "DEL",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
