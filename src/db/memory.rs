//! In-memory user store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{NewUser, StoreError, User, UserStore};

/// HashMap-backed store keyed by email. The uniqueness check and the write
/// happen under one lock, matching the atomicity the DynamoDB conditional
/// put provides.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_by_notification(&self, flag: &str) -> Result<Vec<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .filter(|user| user.notification == flag)
            .cloned()
            .collect())
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&new_user.email) {
            return Err(StoreError::DuplicateEmail(new_user.email));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_user.name,
            email: new_user.email.clone(),
            password: new_user.password,
            role: new_user.role,
            notification: new_user.notification,
            created_at: chrono::Utc::now(),
        };
        users.insert(new_user.email, user.clone());
        Ok(user)
    }
}
