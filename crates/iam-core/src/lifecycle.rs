//! Status lifecycle management.
//!
//! Every status change runs as one store unit of work: load with lock, FSM
//! check, guard, row flip, new current row. Graph deletions owed by a
//! membership deletion are recorded as [`PendingCleanup`] rows in the same
//! unit of work and drained only after it commits.

use std::sync::Arc;

use chrono::Duration;
use iam_events::{EventBus, LifecycleEvent};
use iam_org::{
    IssuedToken, Membership, Organization, OrganizationStatusHistory, PersonalAccessToken,
    Status, TokenStatus, TransitionTable,
};
use iam_rbac::{Relationship, ResourceRef, Role};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::cleanup::{CleanupReport, RelationshipCleaner};
use crate::config::{IamConfig, MAX_TOKEN_TTL_DAYS};
use crate::error::{IamError, IamResult};
use crate::graph::{GraphError, RelationshipGraph};
use crate::guard::LastAdminGuard;
use crate::retry::{with_retry_if, RetryConfig};
use crate::store::{complete_transaction, PendingCleanup, Store, StoreTransaction};

/// Parse a status code such as `"ACT"` or a long name such as `"active"`.
pub fn parse_status(code: &str) -> IamResult<Status> {
    Status::parse(code).ok_or_else(|| IamError::InvalidArgument(format!("unknown status: {}", code)))
}

/// Whether the last-administrator guard applies to a membership deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardPolicy {
    Enforce,
    /// The organization itself is being deleted.
    Skip,
}

/// One applied membership transition, reported after commit.
#[derive(Debug)]
struct MembershipChange {
    previous: Status,
    membership: Membership,
    cleanup: Option<PendingCleanup>,
}

#[derive(Debug)]
struct OrganizationChange {
    previous: Status,
    organization: Organization,
    memberships: Vec<MembershipChange>,
}

/// Organization and membership status lifecycle.
#[derive(Clone)]
pub struct StatusLifecycleManager {
    store: Arc<dyn Store>,
    graph: Arc<dyn RelationshipGraph>,
    events: Arc<dyn EventBus>,
    membership_fsm: TransitionTable,
    organization_fsm: TransitionTable,
    guard: LastAdminGuard,
    cleaner: RelationshipCleaner,
    retry: RetryConfig,
    token_ttl: Duration,
    span: Span,
}

impl StatusLifecycleManager {
    /// Create a manager over the given ports.
    pub fn new(
        store: Arc<dyn Store>,
        graph: Arc<dyn RelationshipGraph>,
        events: Arc<dyn EventBus>,
        config: &IamConfig,
    ) -> Self {
        let retry = config.retry_config();
        Self {
            guard: LastAdminGuard::new(graph.clone()),
            cleaner: RelationshipCleaner::new(
                store.clone(),
                graph.clone(),
                events.clone(),
                retry.clone(),
            ),
            store,
            graph,
            events,
            membership_fsm: TransitionTable::membership(),
            organization_fsm: config.organization_transitions.clone(),
            retry,
            token_ttl: config.token_ttl(),
            span: Span::none(),
        }
    }

    /// Parent every lifecycle span to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.cleaner = self.cleaner.with_span(span.clone());
        self.span = span;
        self
    }

    /// Move an organization to `requested`.
    ///
    /// Deleting an organization deletes every current membership in the same
    /// unit of work. Relationship cleanup for those members runs after
    /// commit.
    #[instrument(
        parent = &self.span,
        skip(self, cancel),
        fields(organization_id = %organization_id, requested = %requested, actor = %actor)
    )]
    pub async fn change_organization_status(
        &self,
        organization_id: Uuid,
        requested: Status,
        actor: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<Organization> {
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let result = self
            .organization_status_in(tx.as_mut(), organization_id, requested, actor, cancel)
            .await;
        let change = complete_transaction(tx, result, cancel).await?;

        info!(
            from = %change.previous,
            cascaded = change.memberships.len(),
            "Organization status changed"
        );

        for membership in &change.memberships {
            self.publish_membership_change(membership, actor).await;
        }
        self.publish(LifecycleEvent::OrganizationStatusChanged {
            organization_id,
            from: change.previous,
            to: requested,
            actor_id: actor,
        })
        .await;

        let cleanups: Vec<PendingCleanup> = change
            .memberships
            .iter()
            .filter_map(|m| m.cleanup.clone())
            .collect();
        self.drain_after_commit(&cleanups, cancel).await;

        Ok(change.organization)
    }

    async fn organization_status_in(
        &self,
        tx: &mut dyn StoreTransaction,
        organization_id: Uuid,
        requested: Status,
        actor: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<OrganizationChange> {
        let mut organization = tx
            .load_organization(organization_id)
            .await?
            .ok_or_else(|| IamError::NotFound(format!("organization {}", organization_id)))?;
        let previous = organization.status;
        self.organization_fsm.transition(previous, requested)?;

        let mut memberships = Vec::new();
        if requested == Status::Deleted {
            let members = tx.list_current_memberships(organization_id).await?;
            for current in members {
                if cancel.is_cancelled() {
                    return Err(IamError::Cancelled);
                }
                let change = self
                    .apply_membership_transition(
                        tx,
                        current,
                        Status::Deleted,
                        actor,
                        GuardPolicy::Skip,
                    )
                    .await?;
                memberships.push(change);
            }
        }

        tx.update_organization_status(organization_id, requested, actor)
            .await?;
        tx.insert_org_status_history(&OrganizationStatusHistory::new(
            organization_id,
            requested,
            actor,
        ))
        .await?;
        organization.apply_status(requested, actor);

        Ok(OrganizationChange {
            previous,
            organization,
            memberships,
        })
    }

    /// Move a user's membership in an organization to `requested`.
    ///
    /// Returns the new current membership row.
    #[instrument(
        parent = &self.span,
        skip(self, cancel),
        fields(
            organization_id = %organization_id,
            user_id = %user_id,
            requested = %requested,
            actor = %actor
        )
    )]
    pub async fn change_user_status(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        requested: Status,
        actor: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<Membership> {
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let result = self
            .membership_status_in(tx.as_mut(), organization_id, user_id, requested, actor)
            .await;
        let change = complete_transaction(tx, result, cancel).await?;

        info!(from = %change.previous, "Membership status changed");
        self.publish_membership_change(&change, actor).await;
        if let Some(cleanup) = &change.cleanup {
            self.drain_after_commit(std::slice::from_ref(cleanup), cancel)
                .await;
        }

        Ok(change.membership)
    }

    async fn membership_status_in(
        &self,
        tx: &mut dyn StoreTransaction,
        organization_id: Uuid,
        user_id: Uuid,
        requested: Status,
        actor: Uuid,
    ) -> IamResult<MembershipChange> {
        let current = tx
            .load_current_membership(user_id, organization_id)
            .await?
            .ok_or_else(|| {
                IamError::NotFound(format!(
                    "membership of user {} in organization {}",
                    user_id, organization_id
                ))
            })?;
        self.apply_membership_transition(tx, current, requested, actor, GuardPolicy::Enforce)
            .await
    }

    async fn apply_membership_transition(
        &self,
        tx: &mut dyn StoreTransaction,
        mut current: Membership,
        requested: Status,
        actor: Uuid,
        policy: GuardPolicy,
    ) -> IamResult<MembershipChange> {
        let previous = current.status;
        self.membership_fsm.transition(previous, requested)?;

        let deleting = requested == Status::Deleted;
        if deleting && policy == GuardPolicy::Enforce {
            let organization = tx
                .load_organization(current.organization_id)
                .await?
                .ok_or_else(|| {
                    IamError::NotFound(format!("organization {}", current.organization_id))
                })?;
            self.guard
                .check_removal_allowed(
                    ResourceRef::organization(organization.id),
                    current.user_id,
                    organization.status,
                )
                .await?;
        }

        let next = current.succeed(requested, actor);
        tx.save_membership(&current).await?;

        let mut cleanup = None;
        if deleting {
            let revoked = tx
                .bulk_update_token_status(
                    current.user_id,
                    current.organization_id,
                    TokenStatus::Active,
                    TokenStatus::Deleted,
                )
                .await?;
            debug!(user_id = %current.user_id, revoked = revoked, "Revoked personal access tokens");

            let marker = PendingCleanup::new(current.organization_id, current.user_id);
            tx.insert_pending_cleanup(&marker).await?;
            cleanup = Some(marker);
        }

        tx.insert_membership(&next).await?;

        Ok(MembershipChange {
            previous,
            membership: next,
            cleanup,
        })
    }

    /// Register a new organization owned by `actor`.
    ///
    /// The organization starts in RGS with `actor` as its active member and
    /// administrator.
    #[instrument(parent = &self.span, skip(self, cancel), fields(actor = %actor))]
    pub async fn register_organization(
        &self,
        name: &str,
        actor: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<Organization> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IamError::InvalidArgument(
                "organization name must not be empty".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        let organization = Organization::new(name, actor);
        let mut tx = self.store.begin().await?;
        let result = self.register_in(tx.as_mut(), &organization, actor).await;
        complete_transaction(tx, result, cancel).await?;

        let admin = Relationship::new(actor, Role::OrganizationAdmin, organization.id);
        with_retry_if(
            &self.retry,
            || self.graph.create_relationship(&admin),
            GraphError::is_transient,
        )
        .await?;

        info!(organization_id = %organization.id, "Organization registered");
        self.publish(LifecycleEvent::OrganizationRegistered {
            organization_id: organization.id,
            name: organization.name.clone(),
            actor_id: actor,
        })
        .await;

        Ok(organization)
    }

    async fn register_in(
        &self,
        tx: &mut dyn StoreTransaction,
        organization: &Organization,
        actor: Uuid,
    ) -> IamResult<()> {
        if tx.load_user(actor).await?.is_none() {
            return Err(IamError::NotFound(format!("user {}", actor)));
        }
        tx.insert_organization(organization).await?;
        tx.insert_org_status_history(&OrganizationStatusHistory::new(
            organization.id,
            organization.status,
            actor,
        ))
        .await?;
        tx.insert_membership(&Membership::new(
            organization.id,
            actor,
            Status::Active,
            actor,
        ))
        .await?;
        Ok(())
    }

    /// Add a user to an organization.
    ///
    /// The initial status must be RGS, REQ or ACT.
    #[instrument(
        parent = &self.span,
        skip(self, cancel),
        fields(organization_id = %organization_id, user_id = %user_id, status = %status)
    )]
    pub async fn add_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        status: Status,
        actor: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<Membership> {
        if !matches!(
            status,
            Status::Registered | Status::AccessRequested | Status::Active
        ) {
            return Err(IamError::InvalidArgument(format!(
                "a membership cannot start in {}",
                status
            )));
        }
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let result = self
            .add_membership_in(tx.as_mut(), organization_id, user_id, status, actor)
            .await;
        let membership = complete_transaction(tx, result, cancel).await?;

        info!(membership_id = %membership.id, "Membership added");
        Ok(membership)
    }

    async fn add_membership_in(
        &self,
        tx: &mut dyn StoreTransaction,
        organization_id: Uuid,
        user_id: Uuid,
        status: Status,
        actor: Uuid,
    ) -> IamResult<Membership> {
        let organization = tx
            .load_organization(organization_id)
            .await?
            .ok_or_else(|| IamError::NotFound(format!("organization {}", organization_id)))?;
        if organization.is_deleted() {
            return Err(IamError::FailedPrecondition(format!(
                "organization {} is deleted",
                organization_id
            )));
        }
        if tx.load_user(user_id).await?.is_none() {
            return Err(IamError::NotFound(format!("user {}", user_id)));
        }
        if tx
            .load_current_membership(user_id, organization_id)
            .await?
            .is_some()
        {
            return Err(IamError::Conflict(format!(
                "user {} is already a member of organization {}",
                user_id, organization_id
            )));
        }

        let membership = Membership::new(organization_id, user_id, status, actor);
        tx.insert_membership(&membership).await?;
        Ok(membership)
    }

    /// Issue a personal access token for an active member.
    ///
    /// The plaintext secret is only available in the returned value. Without
    /// `ttl` the configured lifetime applies. Lifetimes beyond
    /// `MAX_TOKEN_TTL_DAYS` are rejected.
    #[instrument(
        parent = &self.span,
        skip(self, name, cancel),
        fields(organization_id = %organization_id, user_id = %user_id)
    )]
    pub async fn issue_token(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        name: &str,
        ttl: Option<Duration>,
        actor: Uuid,
        cancel: &CancellationToken,
    ) -> IamResult<IssuedToken> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IamError::InvalidArgument(
                "token name must not be empty".to_string(),
            ));
        }
        let ttl = ttl.unwrap_or(self.token_ttl);
        if ttl <= Duration::zero() || ttl > Duration::days(MAX_TOKEN_TTL_DAYS) {
            return Err(IamError::InvalidArgument(format!(
                "token lifetime must be positive and at most {} days",
                MAX_TOKEN_TTL_DAYS
            )));
        }
        if cancel.is_cancelled() {
            return Err(IamError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let result = self
            .issue_token_in(tx.as_mut(), organization_id, user_id, name, ttl, actor)
            .await;
        let issued = complete_transaction(tx, result, cancel).await?;

        info!(token_id = %issued.token.id, partial = %issued.token.partial, "Token issued");
        Ok(issued)
    }

    async fn issue_token_in(
        &self,
        tx: &mut dyn StoreTransaction,
        organization_id: Uuid,
        user_id: Uuid,
        name: &str,
        ttl: Duration,
        actor: Uuid,
    ) -> IamResult<IssuedToken> {
        let membership = tx
            .load_current_membership(user_id, organization_id)
            .await?
            .ok_or_else(|| {
                IamError::NotFound(format!(
                    "membership of user {} in organization {}",
                    user_id, organization_id
                ))
            })?;
        if !membership.is_active() {
            return Err(IamError::FailedPrecondition(format!(
                "tokens require an active membership, found {}",
                membership.status
            )));
        }

        let issued = PersonalAccessToken::issue(organization_id, user_id, name, ttl, actor)?;
        tx.insert_token(&issued.token).await?;
        Ok(issued)
    }

    /// Every membership row of a user in an organization, oldest first.
    pub async fn membership_history(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> IamResult<Vec<Membership>> {
        Ok(self
            .store
            .membership_history(organization_id, user_id)
            .await?)
    }

    /// Every status history row of an organization, oldest first.
    pub async fn organization_history(
        &self,
        organization_id: Uuid,
    ) -> IamResult<Vec<OrganizationStatusHistory>> {
        Ok(self.store.organization_history(organization_id).await?)
    }

    /// Re-drive relationship cleanups left open by earlier failures.
    pub async fn drain_pending_cleanups(&self) -> IamResult<CleanupReport> {
        self.cleaner.drain_pending().await
    }

    async fn drain_after_commit(&self, cleanups: &[PendingCleanup], cancel: &CancellationToken) {
        if cleanups.is_empty() {
            return;
        }
        if cancel.is_cancelled() {
            info!(
                pending = cleanups.len(),
                "Cancelled after commit, relationship cleanup left pending"
            );
            return;
        }
        for cleanup in cleanups {
            if let Err(e) = self.cleaner.drain(cleanup).await {
                warn!(
                    cleanup_id = %cleanup.id,
                    error = %e,
                    "Relationship cleanup failed, left pending"
                );
            }
        }
    }

    async fn publish_membership_change(&self, change: &MembershipChange, actor: Uuid) {
        self.publish(LifecycleEvent::MembershipStatusChanged {
            organization_id: change.membership.organization_id,
            user_id: change.membership.user_id,
            from: change.previous,
            to: change.membership.status,
            actor_id: actor,
        })
        .await;
    }

    async fn publish(&self, event: LifecycleEvent) {
        if let Err(e) = self.events.publish(event.to_event()).await {
            warn!(event_type = event.event_type(), error = %e, "Failed to publish event");
        }
    }
}
