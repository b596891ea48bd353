//! In-memory user repository for tests.

use super::models::{Page, User, UserFilter, UserStatus};
use super::repo::UserRepository;
use crate::auth::{Role, unix_now};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

fn role_allowed(user: &User, roles: Option<&[Role]>) -> bool {
    roles.is_none_or(|roles| roles.contains(&user.role))
}

impl MemoryUserRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store `user` as is and hand it back.
    pub(crate) async fn insert(&self, user: User) -> User {
        self.users.write().await.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Ok(false);
        }
        users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn get_user_by_email(&self, email: &str, roles: Option<&[Role]>) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email) && role_allowed(user, roles))
            .cloned())
    }

    async fn get_user_by_id(&self, id: Uuid, roles: Option<&[Role]>) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .get(&id)
            .filter(|user| role_allowed(user, roles))
            .cloned())
    }

    async fn list_users_by_role(&self, role: Role, filter: &UserFilter) -> Result<Page<User>> {
        let users = self.users.read().await;
        let name = filter.full_name_pattern().map(str::to_lowercase);
        let mut matching: Vec<User> = users
            .values()
            .filter(|user| user.role == role)
            .filter(|user| filter.status.is_none_or(|status| user.status == status))
            .filter(|user| {
                name.as_deref()
                    .is_none_or(|name| user.full_name.to_lowercase().contains(name))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(filter.per_page() as usize)
            .collect();
        Ok(Page::new(data, filter, total))
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.status = status;
            user.updated_at = Some(unix_now());
        }
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Ok(false);
        }
        if let Some(stored) = users.get_mut(&user.id) {
            stored.full_name.clone_from(&user.full_name);
            stored.email.clone_from(&user.email);
            stored.updated_at = Some(unix_now());
        }
        Ok(true)
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        self.users.write().await.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
