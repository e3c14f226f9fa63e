//! In-memory store implementation for testing and single-process use.
//!
//! A transaction takes the store lock when it begins and works on a copy of
//! the state; commit swaps the copy in. Concurrent transactions are
//! therefore fully serialized, which is stricter than the row-level locking
//! a relational backend provides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use iam_org::{
    Membership, Organization, OrganizationStatusHistory, PersonalAccessToken, Status,
    TokenStatus, User,
};

use super::{PendingCleanup, Store, StoreError, StoreResult, StoreTransaction};

#[derive(Debug, Default, Clone)]
struct State {
    organizations: HashMap<Uuid, Organization>,
    org_history: Vec<OrganizationStatusHistory>,
    users: HashMap<Uuid, User>,
    memberships: Vec<Membership>,
    tokens: Vec<PersonalAccessToken>,
    cleanups: Vec<PendingCleanup>,
}

#[derive(Debug, Default)]
struct FailPoints {
    next_commit: AtomicBool,
    token_revocation_for: Mutex<Option<Uuid>>,
}

/// In-memory implementation of [`Store`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail: Arc<FailPoints>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with a transaction error.
    pub fn fail_next_commit(&self) {
        self.fail.next_commit.store(true, Ordering::SeqCst);
    }

    /// Make token revocation for `user_id` fail with a query error.
    pub async fn fail_token_revocation_for(&self, user_id: Uuid) {
        *self.fail.token_revocation_for.lock().await = Some(user_id);
    }

    /// Seed a user directly.
    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Seed an organization directly, without history.
    pub async fn insert_organization(&self, organization: Organization) {
        self.state
            .lock()
            .await
            .organizations
            .insert(organization.id, organization);
    }

    /// Seed a membership row directly.
    pub async fn insert_membership(&self, row: Membership) {
        self.state.lock().await.memberships.push(row);
    }

    /// Seed a token directly.
    pub async fn insert_token(&self, token: PersonalAccessToken) {
        self.state.lock().await.tokens.push(token);
    }

    /// Current rows of a pair. More than one means the invariant broke.
    pub async fn current_memberships(&self, organization_id: Uuid, user_id: Uuid) -> Vec<Membership> {
        self.state
            .lock()
            .await
            .memberships
            .iter()
            .filter(|m| m.current && m.organization_id == organization_id && m.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            fail: self.fail.clone(),
        }))
    }

    async fn get_organization(&self, organization_id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(self
            .state
            .lock()
            .await
            .organizations
            .get(&organization_id)
            .cloned())
    }

    async fn membership_history(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<Membership>> {
        let mut rows: Vec<Membership> = self
            .state
            .lock()
            .await
            .memberships
            .iter()
            .filter(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn organization_history(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<OrganizationStatusHistory>> {
        let mut rows: Vec<OrganizationStatusHistory> = self
            .state
            .lock()
            .await
            .org_history
            .iter()
            .filter(|h| h.organization_id == organization_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn tokens(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<PersonalAccessToken>> {
        Ok(self
            .state
            .lock()
            .await
            .tokens
            .iter()
            .filter(|t| t.organization_id == organization_id && t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn pending_cleanups(&self) -> StoreResult<Vec<PendingCleanup>> {
        Ok(self
            .state
            .lock()
            .await
            .cleanups
            .iter()
            .filter(|c| !c.is_completed())
            .cloned()
            .collect())
    }

    async fn complete_cleanup(&self, cleanup_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let row = state
            .cleanups
            .iter_mut()
            .find(|c| c.id == cleanup_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "pending cleanup",
                id: cleanup_id.to_string(),
            })?;
        row.completed_at.get_or_insert_with(Utc::now);
        Ok(())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    fail: Arc<FailPoints>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn load_organization(
        &mut self,
        organization_id: Uuid,
    ) -> StoreResult<Option<Organization>> {
        Ok(self.working.organizations.get(&organization_id).cloned())
    }

    async fn insert_organization(&mut self, organization: &Organization) -> StoreResult<()> {
        if self.working.organizations.contains_key(&organization.id) {
            return Err(StoreError::Conflict {
                message: format!("organization {} already exists", organization.id),
            });
        }
        self.working
            .organizations
            .insert(organization.id, organization.clone());
        Ok(())
    }

    async fn update_organization_status(
        &mut self,
        organization_id: Uuid,
        status: Status,
        actor: Uuid,
    ) -> StoreResult<()> {
        let org = self
            .working
            .organizations
            .get_mut(&organization_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "organization",
                id: organization_id.to_string(),
            })?;
        org.apply_status(status, actor);
        Ok(())
    }

    async fn insert_org_status_history(
        &mut self,
        row: &OrganizationStatusHistory,
    ) -> StoreResult<()> {
        self.working.org_history.push(row.clone());
        Ok(())
    }

    async fn load_user(&mut self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        if self.working.users.contains_key(&user.id) {
            return Err(StoreError::Conflict {
                message: format!("user {} already exists", user.id),
            });
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn load_current_membership(
        &mut self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        Ok(self
            .working
            .memberships
            .iter()
            .find(|m| m.current && m.user_id == user_id && m.organization_id == organization_id)
            .cloned())
    }

    async fn list_current_memberships(
        &mut self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Membership>> {
        Ok(self
            .working
            .memberships
            .iter()
            .filter(|m| m.current && m.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn save_membership(&mut self, row: &Membership) -> StoreResult<()> {
        let existing = self
            .working
            .memberships
            .iter_mut()
            .find(|m| m.id == row.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "membership",
                id: row.id.to_string(),
            })?;
        *existing = row.clone();
        Ok(())
    }

    async fn insert_membership(&mut self, row: &Membership) -> StoreResult<()> {
        // Unique partial index on (user_id, organization_id) WHERE current.
        if row.current
            && self.working.memberships.iter().any(|m| {
                m.current && m.user_id == row.user_id && m.organization_id == row.organization_id
            })
        {
            return Err(StoreError::Conflict {
                message: format!(
                    "user {} already has a current membership in organization {}",
                    row.user_id, row.organization_id
                ),
            });
        }
        self.working.memberships.push(row.clone());
        Ok(())
    }

    async fn insert_token(&mut self, token: &PersonalAccessToken) -> StoreResult<()> {
        self.working.tokens.push(token.clone());
        Ok(())
    }

    async fn bulk_update_token_status(
        &mut self,
        user_id: Uuid,
        organization_id: Uuid,
        from: TokenStatus,
        to: TokenStatus,
    ) -> StoreResult<u64> {
        if *self.fail.token_revocation_for.lock().await == Some(user_id) {
            return Err(StoreError::QueryError {
                message: format!("injected failure revoking tokens of {}", user_id),
            });
        }

        let mut changed = 0;
        for token in self.working.tokens.iter_mut().filter(|t| {
            t.user_id == user_id && t.organization_id == organization_id && t.status == from
        }) {
            token.status = to;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_pending_cleanup(&mut self, row: &PendingCleanup) -> StoreResult<()> {
        self.working.cleanups.push(row.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction {
            mut guard,
            working,
            fail,
        } = *self;
        if fail.next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::TransactionError {
                message: "injected commit failure".to_string(),
            });
        }
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryStore::new();
        let actor = Uuid::now_v7();
        let org = Organization::new("Acme", actor);

        let mut tx = store.begin().await.unwrap();
        tx.insert_organization(&org).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_organization(org.id).await.unwrap(), Some(org));
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let store = MemoryStore::new();
        let actor = Uuid::now_v7();
        let org = Organization::new("Acme", actor);

        let mut tx = store.begin().await.unwrap();
        tx.insert_organization(&org).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.get_organization(org.id).await.unwrap().is_none());

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_organization(&org).await.unwrap();
        }
        assert!(store.get_organization(org.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_discards_writes() {
        let store = MemoryStore::new();
        let org = Organization::new("Acme", Uuid::now_v7());
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        tx.insert_organization(&org).await.unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(StoreError::TransactionError { .. })
        ));
        assert!(store.get_organization(org.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_current_membership_is_rejected() {
        let store = MemoryStore::new();
        let org_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();

        let mut tx = store.begin().await.unwrap();
        tx.insert_membership(&Membership::new(org_id, user_id, Status::Active, user_id))
            .await
            .unwrap();
        let second = tx
            .insert_membership(&Membership::new(org_id, user_id, Status::Registered, user_id))
            .await;
        assert!(matches!(second, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_bulk_token_update_only_touches_matching_tokens() {
        let store = MemoryStore::new();
        let org_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let other = Uuid::now_v7();
        let ttl = chrono::Duration::days(1);

        store
            .insert_token(PersonalAccessToken::issue(org_id, user_id, "a", ttl, user_id).unwrap().token)
            .await;
        store
            .insert_token(PersonalAccessToken::issue(org_id, other, "b", ttl, other).unwrap().token)
            .await;

        let mut tx = store.begin().await.unwrap();
        let changed = tx
            .bulk_update_token_status(user_id, org_id, TokenStatus::Active, TokenStatus::Deleted)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(changed, 1);
        assert_eq!(
            store.tokens(org_id, other).await.unwrap()[0].status,
            TokenStatus::Active
        );
        assert_eq!(
            store.tokens(org_id, user_id).await.unwrap()[0].status,
            TokenStatus::Deleted
        );
    }
}
