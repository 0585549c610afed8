//! User store collaborator contract.
//!
//! Persistence is external to this crate: the provider only assumes atomic
//! single-record reads and writes. `MemoryUserStore` is an in-process
//! implementation used by tests and embedders without a database.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::User;

/// Query paging, passed through to the store opaquely. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// External user persistence.
///
/// `save` is an upsert and must be atomic per record.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: u32) -> Result<Option<User>, anyhow::Error>;

    /// Look up by any login identity (name, email or phone) within a
    /// namespace.
    async fn find_by_identity(
        &self,
        identity: &str,
        namespace: &str,
    ) -> Result<Option<User>, anyhow::Error>;

    /// Upsert a user record. Returns false when nothing was written.
    async fn save(&self, user: &User) -> Result<bool, anyhow::Error>;

    /// Delete the given users, returning how many existed.
    async fn delete(&self, user_ids: &[u32]) -> Result<u32, anyhow::Error>;

    async fn list(&self, namespace: &str, paging: Paging) -> Result<Vec<User>, anyhow::Error>;
}

/// In-process store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<u32, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: u32) -> Result<Option<User>, anyhow::Error> {
        Ok(self.users.get(&user_id).map(|user| user.clone()))
    }

    async fn find_by_identity(
        &self,
        identity: &str,
        namespace: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        Ok(self
            .users
            .iter()
            .find(|user| user.namespace == namespace && user.matches_identity(identity))
            .map(|user| user.clone()))
    }

    async fn save(&self, user: &User) -> Result<bool, anyhow::Error> {
        self.users.insert(user.user_id, user.clone());
        Ok(true)
    }

    async fn delete(&self, user_ids: &[u32]) -> Result<u32, anyhow::Error> {
        let mut deleted = 0;
        for user_id in user_ids {
            if self.users.remove(user_id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn list(&self, namespace: &str, paging: Paging) -> Result<Vec<User>, anyhow::Error> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|user| user.namespace == namespace)
            .map(|user| user.clone())
            .collect();
        users.sort_by_key(|user| user.user_id);

        let page = paging.page.max(1);
        let skip = (page - 1) as usize * paging.page_size as usize;
        Ok(users
            .into_iter()
            .skip(skip)
            .take(paging.page_size as usize)
            .collect())
    }
}
