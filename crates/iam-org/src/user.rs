//! User profile model
//!
//! Users are not state-machine governed; their status is tracked per
//! organization by [`crate::Membership`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user profile.
///
/// # Examples
///
/// ```
/// use iam_org::User;
///
/// let mut user = User::new("Ada Lovelace", "ada@example.com").with_country("GB");
/// user.record_login();
/// assert!(user.first_login_at.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address
    pub email: String,

    /// Identifier at the external identity provider
    pub external_id: Option<String>,

    /// ISO 3166 country code
    pub country: Option<String>,

    /// First successful login
    pub first_login_at: Option<DateTime<Utc>>,

    /// Most recent successful login
    pub last_login_at: Option<DateTime<Utc>>,

    /// Whether the terms of service were accepted
    #[serde(default)]
    pub accepted_terms: bool,

    /// Whether the user opted in to product communication
    #[serde(default)]
    pub marketing_consent: bool,

    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user profile with no logins and no consents.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            email: email.into(),
            external_id: None,
            country: None,
            first_login_at: None,
            last_login_at: None,
            accepted_terms: false,
            marketing_consent: false,
            created_at: Utc::now(),
        }
    }

    /// Set the external identity provider ID.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Set the country code.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Record a successful login.
    pub fn record_login(&mut self) {
        let now = Utc::now();
        self.first_login_at.get_or_insert(now);
        self.last_login_at = Some(now);
    }
}
