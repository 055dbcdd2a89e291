//! In-Memory Store
//!
//! Process-local [`AccountStore`] used for tests and database-less
//! development. Transactions are serialized: `begin` takes the store lock and
//! works on a copy of the state, `commit` writes the copy back, anything else
//! throws it away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::store::{AccountStore, Conflicts, StoreError, StoreResult, StoreTx};
use crate::models::{
    Account, NewPendingRegistration, PendingRegistration, RegistrationType, UserCredential,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    credentials: HashMap<Uuid, UserCredential>,
    pending: HashMap<Uuid, PendingRegistration>,
}

fn same_nickname(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl MemoryState {
    fn nickname_taken_by_credential(&self, nickname: &str) -> bool {
        self.credentials
            .values()
            .any(|c| same_nickname(&c.nickname, nickname))
    }

    fn email_taken_by_credential(&self, email: &str) -> bool {
        self.credentials.values().any(|c| c.email == email)
    }
}

/// In-memory account store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_credential_insert: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    #[cfg(test)]
    pub async fn credential_count(&self) -> usize {
        self.state.lock().await.credentials.len()
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    #[cfg(test)]
    pub async fn credential_for(&self, account_id: Uuid) -> Option<UserCredential> {
        self.state
            .lock()
            .await
            .credentials
            .get(&account_id)
            .cloned()
    }

    #[cfg(test)]
    pub async fn pending_for(&self, nickname: &str) -> Option<PendingRegistration> {
        self.state
            .lock()
            .await
            .pending
            .values()
            .find(|p| same_nickname(&p.nickname, nickname))
            .cloned()
    }

    #[cfg(test)]
    /// Insert an account and its credential directly, outside any transaction
    pub async fn seed_credential(&self, credential: UserCredential) {
        let mut state = self.state.lock().await;
        state.accounts.insert(
            credential.account_id,
            Account {
                account_id: credential.account_id,
                registration_type: RegistrationType::EmailPassword,
                created_at: Utc::now(),
            },
        );
        state.credentials.insert(credential.account_id, credential);
    }

    /// Overwrite the confirmation code of a pending registration
    #[cfg(test)]
    pub async fn set_pending_code(&self, nickname: &str, code: &str) {
        let mut state = self.state.lock().await;
        for pending in state.pending.values_mut() {
            if same_nickname(&pending.nickname, nickname) {
                pending.confirmation_code = code.to_string();
            }
        }
    }

    /// Move the creation time of a pending registration into the past
    #[cfg(test)]
    pub async fn age_pending(&self, nickname: &str, by: chrono::Duration) {
        let mut state = self.state.lock().await;
        for pending in state.pending.values_mut() {
            if same_nickname(&pending.nickname, nickname) {
                pending.created_at -= by;
            }
        }
    }

    /// Make the next credential insert fail with a backend error
    #[cfg(test)]
    pub fn fail_next_credential_insert(&self) {
        self.fail_credential_insert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_credential_insert: self.fail_credential_insert.clone(),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_credential_insert: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn account_conflicts(&mut self, nickname: &str, email: &str) -> StoreResult<Conflicts> {
        Ok(Conflicts {
            nickname: self.working.nickname_taken_by_credential(nickname),
            email: self.working.email_taken_by_credential(email),
        })
    }

    async fn purge_pending(
        &mut self,
        nickname: &str,
        email: &str,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let before = self.working.pending.len();
        self.working.pending.retain(|_, p| {
            let same_pair = same_nickname(&p.nickname, nickname) && p.email == email;
            !(same_pair || p.created_at < stale_before)
        });
        Ok((before - self.working.pending.len()) as u64)
    }

    async fn pending_conflicts(&mut self, nickname: &str, email: &str) -> StoreResult<Conflicts> {
        let pending = self.working.pending.values();
        let mut conflicts = Conflicts::default();
        for p in pending {
            conflicts.nickname |= same_nickname(&p.nickname, nickname);
            conflicts.email |= p.email == email;
        }
        Ok(conflicts)
    }

    async fn insert_pending(&mut self, pending: &NewPendingRegistration) -> StoreResult<Uuid> {
        let conflicts = self
            .pending_conflicts(&pending.nickname, &pending.email)
            .await?;
        if let Some(field) = conflicts.field() {
            return Err(StoreError::Conflict { field });
        }

        let id = Uuid::new_v4();
        self.working.pending.insert(
            id,
            PendingRegistration {
                id,
                nickname: pending.nickname.clone(),
                email: pending.email.clone(),
                password_hash: pending.password.hash.clone(),
                password_salt: pending.password.salt.clone(),
                confirmation_code: pending.confirmation_code.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn find_pending(
        &mut self,
        nickname: &str,
        email: &str,
        code: &str,
        created_after: DateTime<Utc>,
    ) -> StoreResult<Option<PendingRegistration>> {
        Ok(self
            .working
            .pending
            .values()
            .find(|p| {
                same_nickname(&p.nickname, nickname)
                    && p.email == email
                    && p.confirmation_code == code
                    && p.created_at > created_after
            })
            .cloned())
    }

    async fn delete_pending(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.working.pending.remove(&id).is_some())
    }

    async fn insert_account(&mut self, registration_type: RegistrationType) -> StoreResult<Uuid> {
        let account_id = Uuid::new_v4();
        self.working.accounts.insert(
            account_id,
            Account {
                account_id,
                registration_type,
                created_at: Utc::now(),
            },
        );
        Ok(account_id)
    }

    async fn insert_credential(&mut self, credential: &UserCredential) -> StoreResult<()> {
        if self.fail_credential_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected credential insert failure".to_string()));
        }

        if !self.working.accounts.contains_key(&credential.account_id) {
            return Err(StoreError::Backend(format!(
                "account {} does not exist",
                credential.account_id
            )));
        }
        if self.working.credentials.contains_key(&credential.account_id) {
            return Err(StoreError::Conflict {
                field: "account_id",
            });
        }
        if self.working.nickname_taken_by_credential(&credential.nickname) {
            return Err(StoreError::Conflict { field: "nickname" });
        }
        if self.working.email_taken_by_credential(&credential.email) {
            return Err(StoreError::Conflict { field: "email" });
        }

        self.working
            .credentials
            .insert(credential.account_id, credential.clone());
        Ok(())
    }

    async fn find_credential_by_login(
        &mut self,
        login: &str,
    ) -> StoreResult<Option<UserCredential>> {
        Ok(self
            .working
            .credentials
            .values()
            .find(|c| c.email == login || same_nickname(&c.nickname, login))
            .cloned())
    }

    async fn find_credential_by_account(
        &mut self,
        account_id: Uuid,
    ) -> StoreResult<Option<UserCredential>> {
        Ok(self.working.credentials.get(&account_id).cloned())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
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
    use crate::utils::security::HashedPassword;

    fn new_pending(nickname: &str, email: &str, code: &str) -> NewPendingRegistration {
        NewPendingRegistration {
            nickname: nickname.to_string(),
            email: email.to_string(),
            password: HashedPassword {
                hash: "h".to_string(),
                salt: "s".to_string(),
            },
            confirmation_code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(RegistrationType::EmailPassword)
                .await
                .unwrap();
            tx.rollback().await.unwrap();
        }
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(RegistrationType::EmailPassword)
                .await
                .unwrap();
            // dropped without commit
        }

        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_pending_uniqueness_per_field() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        tx.insert_pending(&new_pending("alice", "alice@example.com", "111111"))
            .await
            .unwrap();

        let err = tx
            .insert_pending(&new_pending("ALICE", "other@example.com", "222222"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "nickname" }));

        let err = tx
            .insert_pending(&new_pending("bobby", "alice@example.com", "222222"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email" }));
    }

    #[tokio::test]
    async fn test_purge_removes_pair_and_stale_rows() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_pending(&new_pending("alice", "alice@example.com", "111111"))
            .await
            .unwrap();
        tx.insert_pending(&new_pending("bobby", "bobby@example.com", "222222"))
            .await
            .unwrap();
        tx.insert_pending(&new_pending("carol", "carol@example.com", "333333"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        store.age_pending("bobby", chrono::Duration::hours(2)).await;

        let mut tx = store.begin().await.unwrap();
        let removed = tx
            .purge_pending(
                "alice",
                "alice@example.com",
                Utc::now() - chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.pending_count().await, 1);
        assert!(store.pending_for("carol").await.is_some());
    }

    #[tokio::test]
    async fn test_find_pending_requires_every_field() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_pending(&new_pending("alice", "alice@example.com", "048213"))
            .await
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        assert!(tx
            .find_pending("alice", "alice@example.com", "048213", cutoff)
            .await
            .unwrap()
            .is_some());
        assert!(tx
            .find_pending("alice", "alice@example.com", "48213", cutoff)
            .await
            .unwrap()
            .is_none());
        assert!(tx
            .find_pending("alice", "bob@example.com", "048213", cutoff)
            .await
            .unwrap()
            .is_none());
        assert!(tx
            .find_pending("alice", "alice@example.com", "048213", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_credential_lookup_by_login() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .seed_credential(UserCredential {
                account_id: id,
                email: "alice@example.com".to_string(),
                nickname: "Alice".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .await;

        let mut tx = store.begin().await.unwrap();
        for login in ["alice@example.com", "alice", "ALICE"] {
            let found = tx.find_credential_by_login(login).await.unwrap();
            assert_eq!(found.map(|c| c.account_id), Some(id));
        }
        assert!(tx
            .find_credential_by_login("bob@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_credential_requires_account() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx
            .insert_credential(&UserCredential {
                account_id: Uuid::new_v4(),
                email: "alice@example.com".to_string(),
                nickname: "alice".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
