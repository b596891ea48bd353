//! User registration, profile and admin management.

use super::models::{
    CreateUserRequest, Page, UpdateUserRequest, User, UserFilter, UserResponse, UserStatus,
    normalize_email, valid_email, valid_full_name,
};
use super::repo::UserRepository;
use crate::auth::{AuthError, Role, Session, SessionService, unix_now};
use crate::cache::{self, CacheError, CacheStore};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("invalid {0}")]
    InvalidField(&'static str),
    #[error("email already exists")]
    EmailAlreadyExists,
    #[error("you cannot block yourself")]
    CannotBlockYourself,
    #[error("you cannot unblock yourself")]
    CannotUnblockYourself,
    #[error("you cannot delete yourself")]
    CannotDeleteYourself,
    #[error("use /v1/users/me for your own account")]
    SameIdProvided,
    #[error("user is already blocked")]
    AlreadyBlocked,
    #[error("user is already active")]
    AlreadyUnblocked,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    cache: Arc<dyn CacheStore>,
    sessions: Arc<SessionService>,
    profile_ttl: Duration,
}

impl UserService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        cache: Arc<dyn CacheStore>,
        sessions: Arc<SessionService>,
        profile_ttl: Duration,
    ) -> Self {
        Self {
            users,
            cache,
            sessions,
            profile_ttl,
        }
    }

    /// Register a user with `role`.
    ///
    /// # Errors
    /// Returns [`UserError::InvalidField`] for a bad name or email and
    /// [`UserError::EmailAlreadyExists`] when the email is taken by any user.
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        role: Role,
    ) -> Result<UserResponse, UserError> {
        if !valid_full_name(&request.full_name) {
            return Err(UserError::InvalidField("full_name"));
        }
        let email = normalize_email(&request.email);
        if !valid_email(&email) {
            return Err(UserError::InvalidField("email"));
        }

        if self.users.get_user_by_email(&email, None).await?.is_some() {
            return Err(UserError::EmailAlreadyExists);
        }

        let user = User::new(request.full_name.trim(), email, role);
        if !self.users.create_user(&user).await? {
            // Lost a race with a concurrent registration.
            return Err(UserError::EmailAlreadyExists);
        }

        info!(user_id = %user.id, role = %role, "user created");
        Ok(UserResponse::from(&user))
    }

    /// Profile of the session owner, read through the `user:{id}` cache.
    ///
    /// # Errors
    /// Returns [`UserError::NotFound`] if the user no longer exists.
    pub async fn get_profile(&self, session: &Session) -> Result<UserResponse, UserError> {
        let key = cache::user_key(session.user_id);
        match cache::get_json::<UserResponse>(self.cache.as_ref(), &key).await {
            Ok(profile) => return Ok(profile),
            Err(CacheError::Miss) => {}
            Err(err) => warn!(user_id = %session.user_id, "ignoring unreadable cached profile: {err}"),
        }

        let user = self
            .users
            .get_user_by_id(session.user_id, None)
            .await?
            .ok_or(UserError::NotFound)?;
        let profile = UserResponse::from(&user);

        cache::set_json(self.cache.as_ref(), &key, &profile, self.profile_ttl)
            .await
            .context("failed to cache user profile")?;

        Ok(profile)
    }

    /// # Errors
    /// Returns an internal error if the repository fails.
    pub async fn list_admins(&self, filter: &UserFilter) -> Result<Page<UserResponse>, UserError> {
        let page = self.users.list_users_by_role(Role::Admin, filter).await?;
        Ok(page.map(|user| UserResponse::from(&user)))
    }

    /// # Errors
    /// Returns [`UserError::SameIdProvided`] for the caller's own id and
    /// [`UserError::NotFound`] when no admin has `admin_id`.
    pub async fn get_admin(
        &self,
        caller: &Session,
        admin_id: Uuid,
    ) -> Result<UserResponse, UserError> {
        if caller.user_id == admin_id {
            return Err(UserError::SameIdProvided);
        }
        let admin = self.find_admin(admin_id).await?;
        Ok(UserResponse::from(&admin))
    }

    /// Block an admin and revoke all of their sessions.
    ///
    /// # Errors
    /// Returns [`UserError::CannotBlockYourself`], [`UserError::NotFound`] or
    /// [`UserError::AlreadyBlocked`].
    pub async fn block_admin(&self, caller: &Session, admin_id: Uuid) -> Result<(), UserError> {
        if caller.user_id == admin_id {
            return Err(UserError::CannotBlockYourself);
        }
        let admin = self.find_admin(admin_id).await?;
        if admin.status == UserStatus::Blocked {
            return Err(UserError::AlreadyBlocked);
        }

        self.users
            .update_status(admin_id, UserStatus::Blocked)
            .await?;
        self.forget_profile(admin_id).await;
        self.revoke_sessions(admin_id).await?;

        info!(%admin_id, blocked_by = %caller.user_id, "admin blocked");
        Ok(())
    }

    /// # Errors
    /// Returns [`UserError::CannotUnblockYourself`], [`UserError::NotFound`] or
    /// [`UserError::AlreadyUnblocked`].
    pub async fn unblock_admin(&self, caller: &Session, admin_id: Uuid) -> Result<(), UserError> {
        if caller.user_id == admin_id {
            return Err(UserError::CannotUnblockYourself);
        }
        let admin = self.find_admin(admin_id).await?;
        if admin.status == UserStatus::Active {
            return Err(UserError::AlreadyUnblocked);
        }

        self.users.update_status(admin_id, UserStatus::Active).await?;
        self.forget_profile(admin_id).await;

        info!(%admin_id, unblocked_by = %caller.user_id, "admin unblocked");
        Ok(())
    }

    /// Change an admin's name or email.
    ///
    /// # Errors
    /// Returns [`UserError::SameIdProvided`] for the caller's own id,
    /// [`UserError::NotFound`] when no admin has `admin_id`,
    /// [`UserError::InvalidField`] for a bad name or email and
    /// [`UserError::EmailAlreadyExists`] when the new email belongs to another user.
    pub async fn update_admin(
        &self,
        caller: &Session,
        admin_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, UserError> {
        if caller.user_id == admin_id {
            return Err(UserError::SameIdProvided);
        }
        let mut admin = self.find_admin(admin_id).await?;

        if let Some(full_name) = request.full_name {
            if !valid_full_name(&full_name) {
                return Err(UserError::InvalidField("full_name"));
            }
            admin.full_name = full_name.trim().to_string();
        }
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            if !valid_email(&email) {
                return Err(UserError::InvalidField("email"));
            }
            if email != admin.email {
                if self.users.get_user_by_email(&email, None).await?.is_some() {
                    return Err(UserError::EmailAlreadyExists);
                }
                admin.email = email;
            }
        }

        admin.updated_at = Some(unix_now());
        if !self.users.update_user(&admin).await? {
            return Err(UserError::EmailAlreadyExists);
        }
        self.forget_profile(admin_id).await;

        info!(%admin_id, updated_by = %caller.user_id, "admin updated");
        Ok(UserResponse::from(&admin))
    }

    /// Delete an admin and revoke all of their sessions.
    ///
    /// # Errors
    /// Returns [`UserError::CannotDeleteYourself`] or [`UserError::NotFound`].
    pub async fn delete_admin(&self, caller: &Session, admin_id: Uuid) -> Result<(), UserError> {
        if caller.user_id == admin_id {
            return Err(UserError::CannotDeleteYourself);
        }
        self.find_admin(admin_id).await?;

        self.users.delete_user(admin_id).await?;
        self.forget_profile(admin_id).await;
        self.revoke_sessions(admin_id).await?;

        info!(%admin_id, deleted_by = %caller.user_id, "admin deleted");
        Ok(())
    }

    /// Create the owner account if no user holds `email` yet.
    ///
    /// # Errors
    /// Returns an error if the email belongs to a non-owner or the insert fails.
    pub async fn ensure_owner(&self, full_name: &str, email: &str) -> Result<(), UserError> {
        let email = normalize_email(email);
        match self.users.get_user_by_email(&email, None).await? {
            Some(user) if user.role == Role::Owner => Ok(()),
            Some(_) => Err(UserError::EmailAlreadyExists),
            None => {
                self.create_user(
                    CreateUserRequest {
                        full_name: full_name.to_string(),
                        email,
                    },
                    Role::Owner,
                )
                .await?;
                Ok(())
            }
        }
    }

    async fn find_admin(&self, admin_id: Uuid) -> Result<User, UserError> {
        self.users
            .get_user_by_id(admin_id, Some(&[Role::Admin]))
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn forget_profile(&self, user_id: Uuid) {
        if let Err(err) = self.cache.delete(&cache::user_key(user_id)).await {
            warn!(%user_id, "failed to drop cached profile: {err}");
        }
    }

    async fn revoke_sessions(&self, user_id: Uuid) -> Result<(), UserError> {
        match self.sessions.delete_all_sessions(user_id).await {
            Ok(()) | Err(AuthError::SessionNotFound) => Ok(()),
            Err(err) => Err(UserError::Internal(
                anyhow::Error::new(err).context("failed to revoke sessions"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::users::memory::MemoryUserRepository;

    struct Harness {
        service: UserService,
        users: Arc<MemoryUserRepository>,
        cache: Arc<MemoryCache>,
        sessions: Arc<SessionService>,
    }

    fn harness() -> Harness {
        let cache = Arc::new(MemoryCache::new());
        let users = Arc::new(MemoryUserRepository::new());
        let sessions = Arc::new(SessionService::new(cache.clone(), Duration::from_secs(3600)));
        let service = UserService::new(
            users.clone(),
            cache.clone(),
            sessions.clone(),
            Duration::from_secs(600),
        );
        Harness {
            service,
            users,
            cache,
            sessions,
        }
    }

    fn request(full_name: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            full_name: full_name.to_string(),
            email: email.to_string(),
        }
    }

    async fn owner_session(h: &Harness) -> anyhow::Result<Session> {
        let owner = h
            .users
            .insert(User::new("Olga Owner", "olga@bookwise.test", Role::Owner))
            .await;
        Ok(h.sessions.create_session(owner.id, Role::Owner).await?)
    }

    #[tokio::test]
    async fn create_user_normalizes_email() -> anyhow::Result<()> {
        let h = harness();
        let created = h
            .service
            .create_user(request(" Ana Reader ", " Ana@BookWise.Test "), Role::Member)
            .await?;
        assert_eq!(created.full_name, "Ana Reader");
        assert_eq!(created.email, "ana@bookwise.test");
        assert_eq!(created.role, Role::Member);
        assert_eq!(created.status, UserStatus::Active);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_across_roles() -> anyhow::Result<()> {
        let h = harness();
        h.service
            .create_user(request("Ana", "ana@bookwise.test"), Role::Member)
            .await?;
        let result = h
            .service
            .create_user(request("Ana Admin", "ANA@bookwise.test"), Role::Admin)
            .await;
        assert!(matches!(result, Err(UserError::EmailAlreadyExists)));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let h = harness();
        assert!(matches!(
            h.service
                .create_user(request("", "ana@bookwise.test"), Role::Member)
                .await,
            Err(UserError::InvalidField("full_name"))
        ));
        assert!(matches!(
            h.service
                .create_user(request("Ana", "not-an-email"), Role::Member)
                .await,
            Err(UserError::InvalidField("email"))
        ));
    }

    #[tokio::test]
    async fn profile_is_served_from_cache_after_first_read() -> anyhow::Result<()> {
        let h = harness();
        let user = h
            .users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        let session = h.sessions.create_session(user.id, Role::Member).await?;

        let first = h.service.get_profile(&session).await?;
        assert_eq!(first.id, user.id);
        let cached: UserResponse = cache::get_json(h.cache.as_ref(), &cache::user_key(user.id)).await?;
        assert_eq!(cached, first);

        // The database row is gone but the cached profile still answers.
        h.users.delete_user(user.id).await?;
        assert_eq!(h.service.get_profile(&session).await?, first);

        h.cache.delete(&cache::user_key(user.id)).await?;
        assert!(matches!(
            h.service.get_profile(&session).await,
            Err(UserError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn get_admin_rejects_own_id_and_non_admins() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let member = h
            .users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;

        assert!(matches!(
            h.service.get_admin(&caller, caller.user_id).await,
            Err(UserError::SameIdProvided)
        ));
        assert!(matches!(
            h.service.get_admin(&caller, member.id).await,
            Err(UserError::NotFound)
        ));
        assert_eq!(h.service.get_admin(&caller, admin.id).await?.id, admin.id);
        Ok(())
    }

    #[tokio::test]
    async fn blocking_an_admin_revokes_every_session() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;
        let laptop = h.sessions.create_session(admin.id, Role::Admin).await?;
        let phone = h.sessions.create_session(admin.id, Role::Admin).await?;

        h.service.block_admin(&caller, admin.id).await?;

        for session in [&laptop, &phone] {
            assert!(matches!(
                h.sessions.get_session_by_token(&session.token).await,
                Err(AuthError::SessionNotFound)
            ));
        }
        assert!(matches!(
            h.cache.set_members(&cache::user_sessions_key(admin.id)).await,
            Err(CacheError::Miss)
        ));
        let stored = h.users.get_user_by_id(admin.id, None).await?;
        assert_eq!(stored.map(|user| user.status), Some(UserStatus::Blocked));

        assert!(matches!(
            h.service.block_admin(&caller, admin.id).await,
            Err(UserError::AlreadyBlocked)
        ));
        // The caller's own session is untouched.
        assert!(h.sessions.get_session_by_token(&caller.token).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn blocking_an_admin_without_sessions_succeeds() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;
        h.service.block_admin(&caller, admin.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn self_targeting_is_rejected() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        assert!(matches!(
            h.service.block_admin(&caller, caller.user_id).await,
            Err(UserError::CannotBlockYourself)
        ));
        assert!(matches!(
            h.service.unblock_admin(&caller, caller.user_id).await,
            Err(UserError::CannotUnblockYourself)
        ));
        assert!(matches!(
            h.service.delete_admin(&caller, caller.user_id).await,
            Err(UserError::CannotDeleteYourself)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unblock_restores_access() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;

        assert!(matches!(
            h.service.unblock_admin(&caller, admin.id).await,
            Err(UserError::AlreadyUnblocked)
        ));
        h.service.block_admin(&caller, admin.id).await?;
        h.service.unblock_admin(&caller, admin.id).await?;

        let stored = h.users.get_user_by_id(admin.id, None).await?;
        assert_eq!(stored.map(|user| user.status), Some(UserStatus::Active));
        Ok(())
    }

    #[tokio::test]
    async fn deleting_an_admin_removes_user_and_sessions() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;
        let session = h.sessions.create_session(admin.id, Role::Admin).await?;

        h.service.delete_admin(&caller, admin.id).await?;

        assert!(h.users.get_user_by_id(admin.id, None).await?.is_none());
        assert!(matches!(
            h.sessions.get_session_by_token(&session.token).await,
            Err(AuthError::SessionNotFound)
        ));
        assert!(matches!(
            h.service.delete_admin(&caller, admin.id).await,
            Err(UserError::NotFound)
        ));
        Ok(())
    }

    fn update(full_name: Option<&str>, email: Option<&str>) -> UpdateUserRequest {
        UpdateUserRequest {
            full_name: full_name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn update_admin_changes_name_and_email() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;
        let admin_session = h.sessions.create_session(admin.id, Role::Admin).await?;
        h.service.get_profile(&admin_session).await?;

        let updated = h
            .service
            .update_admin(
                &caller,
                admin.id,
                update(Some(" Ada Lovelace "), Some(" ADA.L@bookwise.test ")),
            )
            .await?;
        assert_eq!(updated.full_name, "Ada Lovelace");
        assert_eq!(updated.email, "ada.l@bookwise.test");

        let stored = h.users.get_user_by_id(admin.id, None).await?;
        assert_eq!(
            stored.as_ref().map(|user| user.email.as_str()),
            Some("ada.l@bookwise.test")
        );
        assert!(stored.and_then(|user| user.updated_at).is_some());
        // The stale cached profile was dropped.
        assert!(matches!(
            h.cache.get(&cache::user_key(admin.id)).await,
            Err(CacheError::Miss)
        ));
        assert_eq!(
            h.service.get_profile(&admin_session).await?.full_name,
            "Ada Lovelace"
        );
        Ok(())
    }

    #[tokio::test]
    async fn update_admin_keeps_absent_fields() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;

        let updated = h
            .service
            .update_admin(&caller, admin.id, update(None, Some("ADA@bookwise.test")))
            .await?;
        assert_eq!(updated.full_name, "Ada Admin");
        assert_eq!(updated.email, "ada@bookwise.test");
        Ok(())
    }

    #[tokio::test]
    async fn update_admin_rejects_own_id_and_non_admins() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let member = h
            .users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;

        assert!(matches!(
            h.service
                .update_admin(&caller, caller.user_id, update(Some("Olga"), None))
                .await,
            Err(UserError::SameIdProvided)
        ));
        assert!(matches!(
            h.service
                .update_admin(&caller, member.id, update(Some("Ana"), None))
                .await,
            Err(UserError::NotFound)
        ));
        let unchanged = h.users.get_user_by_id(member.id, None).await?;
        assert_eq!(unchanged.map(|user| user.full_name), Some("Ana Reader".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn update_admin_rejects_taken_or_invalid_email() -> anyhow::Result<()> {
        let h = harness();
        let caller = owner_session(&h).await?;
        let admin = h
            .users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;
        h.users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;

        assert!(matches!(
            h.service
                .update_admin(&caller, admin.id, update(None, Some("Ana@BookWise.test")))
                .await,
            Err(UserError::EmailAlreadyExists)
        ));
        assert!(matches!(
            h.service
                .update_admin(&caller, admin.id, update(None, Some("ada@")))
                .await,
            Err(UserError::InvalidField("email"))
        ));
        assert!(matches!(
            h.service
                .update_admin(&caller, admin.id, update(Some("  "), None))
                .await,
            Err(UserError::InvalidField("full_name"))
        ));
        let stored = h.users.get_user_by_id(admin.id, None).await?;
        assert_eq!(stored.map(|user| user.email), Some("ada@bookwise.test".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn list_admins_filters_and_paginates() -> anyhow::Result<()> {
        let h = harness();
        for index in 0..5 {
            let mut admin = User::new(
                format!("Admin {index}"),
                format!("admin{index}@bookwise.test"),
                Role::Admin,
            );
            if index % 2 == 0 {
                admin.status = UserStatus::Blocked;
            }
            h.users.insert(admin).await;
        }
        h.users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;

        let page = h
            .service
            .list_admins(&UserFilter {
                page: Some(1),
                per_page: Some(2),
                ..UserFilter::default()
            })
            .await?;
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 2);
        assert!(page.data.iter().all(|user| user.role == Role::Admin));

        let blocked = h
            .service
            .list_admins(&UserFilter {
                status: Some(UserStatus::Blocked),
                ..UserFilter::default()
            })
            .await?;
        assert_eq!(blocked.total, 3);

        let named = h
            .service
            .list_admins(&UserFilter {
                full_name: Some("admin 3".to_string()),
                ..UserFilter::default()
            })
            .await?;
        assert_eq!(named.total, 1);
        assert_eq!(named.data[0].full_name, "Admin 3");
        Ok(())
    }

    #[tokio::test]
    async fn ensure_owner_is_idempotent() -> anyhow::Result<()> {
        let h = harness();
        h.service.ensure_owner("Olga Owner", "olga@bookwise.test").await?;
        h.service.ensure_owner("Olga Owner", "OLGA@bookwise.test").await?;

        let owner = h
            .users
            .get_user_by_email("olga@bookwise.test", Some(&[Role::Owner]))
            .await?;
        assert!(owner.is_some());

        h.users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        assert!(matches!(
            h.service.ensure_owner("Ana", "ana@bookwise.test").await,
            Err(UserError::EmailAlreadyExists)
        ));
        Ok(())
    }
}
