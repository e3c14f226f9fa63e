//! # Tenant IAM Events
//!
//! This crate provides the lifecycle event stream of the tenant IAM core.
//! Every committed status change is published here; delivery to external
//! brokers is left to an [`EventBus`] implementation outside this crate.
//!
//! ## Event Types
//!
//! - `organization.registered`
//! - `organization.status_changed`
//! - `membership.status_changed`
//! - `membership.relationships_revoked`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iam_events::{EventBus, LifecycleEvent, MemoryEventBus};
//! use iam_org::Status;
//! use uuid::Uuid;
//!
//! async fn publish_example() {
//!     let bus = MemoryEventBus::new();
//!     let mut sub = bus.subscribe("membership.*").await.unwrap();
//!
//!     let event = LifecycleEvent::MembershipStatusChanged {
//!         organization_id: Uuid::now_v7(),
//!         user_id: Uuid::now_v7(),
//!         from: Status::Active,
//!         to: Status::Suspended,
//!         actor_id: Uuid::now_v7(),
//!     };
//!     bus.publish(event.to_event()).await.unwrap();
//!
//!     let received = sub.recv().await.unwrap();
//!     assert_eq!(received.event_type, "membership.status_changed");
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are dot-separated event types:
//! - `membership.status_changed` - Specific event
//! - `membership.*` - Any membership event
//! - `#` - All events

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, MemoryEventBus, Subscription};
pub use types::{Event, LifecycleEvent};
