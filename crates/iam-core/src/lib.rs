//! # Tenant IAM Core
//!
//! Status lifecycle and role visibility for multi-tenant identity and
//! access management.
//!
//! ## Components
//!
//! - [`StatusLifecycleManager`] - Organization and membership status changes,
//!   run as single store units of work
//! - [`RoleVisibilityFilter`] - Which role grants a caller may see
//! - [`RoleService`] - Role grants and revocations guarded by
//!   [`LastAdminGuard`]
//! - [`RelationshipCleaner`] - Post-commit removal of a departed member's
//!   relationships
//!
//! The core talks to two ports: a transactional [`Store`] and an external
//! [`RelationshipGraph`]. In-memory implementations of both ship behind the
//! default `memory` feature.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use iam_core::{IamConfig, MemoryGraph, MemoryStore, StatusLifecycleManager};
//! use iam_events::MemoryEventBus;
//! use iam_org::{Status, User};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn suspend_example() -> iam_core::IamResult<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let owner = User::new("Ada", "ada@example.com");
//!     store.insert_user(owner.clone()).await;
//!
//!     let manager = StatusLifecycleManager::new(
//!         store,
//!         Arc::new(MemoryGraph::new()),
//!         Arc::new(MemoryEventBus::new()),
//!         &IamConfig::from_env().unwrap_or_default(),
//!     );
//!
//!     let cancel = CancellationToken::new();
//!     let org = manager.register_organization("Acme", owner.id, &cancel).await?;
//!     manager
//!         .change_organization_status(org.id, Status::Active, owner.id, &cancel)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cleanup;
pub mod config;
pub mod error;
pub mod graph;
pub mod guard;
pub mod lifecycle;
pub mod retry;
pub mod roles;
pub mod store;
pub mod visibility;

// Re-export main types
pub use cleanup::{CleanupReport, RelationshipCleaner};
pub use config::{CleanupRetryConfig, ConfigError, IamConfig, MAX_TOKEN_TTL_DAYS};
pub use error::{ErrorKind, IamError, IamResult};
pub use graph::{GraphError, GraphResult, RelationshipGraph};
pub use guard::LastAdminGuard;
pub use lifecycle::{parse_status, StatusLifecycleManager};
pub use retry::RetryConfig;
pub use roles::RoleService;
pub use store::{
    complete_transaction, PendingCleanup, Store, StoreError, StoreResult, StoreTransaction,
};
pub use visibility::RoleVisibilityFilter;

#[cfg(feature = "memory")]
pub use graph::MemoryGraph;
#[cfg(feature = "memory")]
pub use store::MemoryStore;
