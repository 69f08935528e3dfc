use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CredentialStore, InsertOutcome, InsertPolicy, User};

/// In-process credential store. Users are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    // keyed by name
    users: RwLock<HashMap<String, User>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn count_users(&self) -> Result<i64> {
        let users = self.users.read().await;
        Ok(i64::try_from(users.len()).unwrap_or(i64::MAX))
    }

    async fn count_by_name(&self, name: &str) -> Result<i64> {
        let users = self.users.read().await;
        Ok(i64::from(users.contains_key(name)))
    }

    async fn insert(&self, user: &User, policy: InsertPolicy) -> Result<InsertOutcome> {
        let mut users = self.users.write().await;
        if policy == InsertPolicy::BootstrapOnly && !users.is_empty() {
            return Ok(InsertOutcome::Closed);
        }
        if users.contains_key(&user.name) {
            return Ok(InsertOutcome::Conflict);
        }
        users.insert(user.name.clone(), user.clone());
        Ok(InsertOutcome::Created)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(name).cloned())
    }

    async fn update_password(&self, id: &str, password_digest: &str) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.values_mut().find(|user| user.id == id) {
            Some(user) => {
                user.password_digest = password_digest.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
