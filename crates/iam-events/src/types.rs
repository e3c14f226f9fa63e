//! Event types for lifecycle notifications
//!
//! This module defines the event envelope and the lifecycle events the core
//! publishes after a successful commit.

use chrono::{DateTime, Utc};
use iam_org::Status;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing, tracing, and processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "membership.status_changed"), also the topic
    pub event_type: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Organization context
    pub org_id: Option<Uuid>,

    /// User the event is about
    pub user_id: Option<Uuid>,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `payload` - The event payload
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            org_id: None,
            user_id: None,
            correlation_id: None,
            version: 1,
            payload,
        }
    }

    /// Set organization context.
    pub fn with_org(mut self, org_id: Uuid) -> Self {
        self.org_id = Some(org_id);
        self
    }

    /// Set user context.
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Get the topic for this event.
    pub fn topic(&self) -> &str {
        &self.event_type
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Lifecycle events published by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A new organization was registered
    OrganizationRegistered {
        organization_id: Uuid,
        name: String,
        actor_id: Uuid,
    },

    /// An organization changed status
    OrganizationStatusChanged {
        organization_id: Uuid,
        from: Status,
        to: Status,
        actor_id: Uuid,
    },

    /// A membership changed status
    MembershipStatusChanged {
        organization_id: Uuid,
        user_id: Uuid,
        from: Status,
        to: Status,
        actor_id: Uuid,
    },

    /// Relationships scoped to an organization were removed after a user left it
    RelationshipsRevoked {
        organization_id: Uuid,
        user_id: Uuid,
        count: usize,
    },
}

impl LifecycleEvent {
    /// Event type string for this variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OrganizationRegistered { .. } => "organization.registered",
            Self::OrganizationStatusChanged { .. } => "organization.status_changed",
            Self::MembershipStatusChanged { .. } => "membership.status_changed",
            Self::RelationshipsRevoked { .. } => "membership.relationships_revoked",
        }
    }

    /// Convert to a generic event envelope.
    pub fn to_event(&self) -> Event {
        let payload = serde_json::to_value(self).unwrap_or_default();
        let event = Event::new(self.event_type(), payload);
        match self {
            Self::OrganizationRegistered {
                organization_id, ..
            }
            | Self::OrganizationStatusChanged {
                organization_id, ..
            } => event.with_org(*organization_id),
            Self::MembershipStatusChanged {
                organization_id,
                user_id,
                ..
            }
            | Self::RelationshipsRevoked {
                organization_id,
                user_id,
                ..
            } => event.with_org(*organization_id).with_user(*user_id),
        }
    }
}
