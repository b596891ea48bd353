//! Magic-link sign-in.

use super::{AuthConfig, AuthError, Role, Session, SessionService};
use crate::api::email::EmailTask;
use crate::cache::{self, CacheError, CacheStore};
use crate::queue::{MessageQueue, SEND_EMAIL_QUEUE};
use crate::users::{UserRepository, UserStatus};
use anyhow::{Context, anyhow};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

pub const SIGN_IN_TEMPLATE: &str = "sign_in_magic_link";
const SIGN_IN_SUBJECT: &str = "Your Bookwise sign-in link";

pub struct AuthService {
    config: Arc<AuthConfig>,
    cache: Arc<dyn CacheStore>,
    queue: Arc<dyn MessageQueue>,
    sessions: Arc<SessionService>,
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: Arc<AuthConfig>,
        cache: Arc<dyn CacheStore>,
        queue: Arc<dyn MessageQueue>,
        sessions: Arc<SessionService>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            config,
            cache,
            queue,
            sessions,
            users,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    /// Mail a one-time sign-in link to `email`.
    ///
    /// Only users holding one of `allowed_roles` can sign in through the calling
    /// endpoint; anyone else is reported as not found.
    ///
    /// # Errors
    /// Returns [`AuthError::UserNotFound`], [`AuthError::UserBlocked`], or an
    /// internal error when the code cannot be stored or the email cannot be queued.
    pub async fn sign_in(&self, email: &str, allowed_roles: &[Role]) -> Result<(), AuthError> {
        let user = self
            .users
            .get_user_by_email(email, Some(allowed_roles))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.status == UserStatus::Blocked {
            return Err(AuthError::UserBlocked);
        }

        let code = Uuid::now_v7();
        let redirect = if allowed_roles.contains(&Role::Admin) {
            self.config.redirect_admin_url()
        } else {
            self.config.redirect_member_url()
        };
        let link = magic_link_url(self.config.api_base_url(), code, redirect)?;

        self.cache
            .set(
                &cache::magic_link_key(code),
                &user.id.to_string(),
                self.config.magic_link_ttl(),
            )
            .await
            .context("failed to store magic link")?;

        let task = EmailTask {
            to: vec![user.email.clone()],
            subject: SIGN_IN_SUBJECT.to_string(),
            template: SIGN_IN_TEMPLATE.to_string(),
            params: json!({
                "name": user.full_name,
                "magic_link": link.as_str(),
            }),
        };
        let message = serde_json::to_vec(&task).context("failed to encode email task")?;
        self.queue
            .publish(SEND_EMAIL_QUEUE, message)
            .await
            .context("failed to publish email task")?;

        info!(user_id = %user.id, role = %user.role, "magic link issued");
        Ok(())
    }

    /// Redeem a magic-link code and open a session. A code works once.
    ///
    /// # Errors
    /// Returns [`AuthError::MagicLinkNotFound`] for unknown, used or expired codes and
    /// [`AuthError::UserNotFound`] when the user was removed in the meantime.
    pub async fn verify_magic_link(&self, code: Uuid) -> Result<Session, AuthError> {
        let stored = match self.cache.take(&cache::magic_link_key(code)).await {
            Ok(value) => value,
            Err(CacheError::Miss) => return Err(AuthError::MagicLinkNotFound),
            Err(err) => return Err(anyhow!(err).context("failed to read magic link").into()),
        };
        let user_id = Uuid::parse_str(&stored)
            .with_context(|| format!("corrupt magic link payload: {stored}"))?;

        let user = self
            .users
            .get_user_by_id(user_id, None)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.status == UserStatus::Blocked {
            return Err(AuthError::UserBlocked);
        }

        let session = self.sessions.create_session(user.id, user.role).await?;
        debug!(user_id = %user.id, session_id = %session.session_id, "magic link redeemed");
        Ok(session)
    }

    /// End the caller's current session.
    ///
    /// # Errors
    /// Returns [`AuthError::SessionNotFound`] if it is already gone.
    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.sessions.delete_session(session.session_id).await
    }
}

/// `{api_base_url}/v1/auth/link?code={code}&redirect={redirect}`, query-encoded.
///
/// # Errors
/// Returns an error if the API base URL is not a valid URL.
pub(crate) fn magic_link_url(api_base_url: &str, code: Uuid, redirect: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(&format!("{api_base_url}/v1/auth/link"))
        .with_context(|| format!("Invalid API base URL: {api_base_url}"))?;
    url.query_pairs_mut()
        .append_pair("code", &code.to_string())
        .append_pair("redirect", redirect);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token;
    use crate::cache::MemoryCache;
    use crate::queue::MemoryQueue;
    use crate::users::{User, memory::MemoryUserRepository};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        auth: AuthService,
        users: Arc<MemoryUserRepository>,
        cache: Arc<MemoryCache>,
        emails: UnboundedReceiver<Vec<u8>>,
    }

    async fn harness() -> anyhow::Result<Harness> {
        let config = Arc::new(
            AuthConfig::new("http://api.bookwise.test".to_string())
                .with_redirect_admin_url("http://admin.bookwise.test".to_string())
                .with_redirect_member_url("http://bookwise.test".to_string()),
        );
        let cache = Arc::new(MemoryCache::new());
        let queue = Arc::new(MemoryQueue::new());
        let emails = queue.consume(SEND_EMAIL_QUEUE).await?;
        let users = Arc::new(MemoryUserRepository::new());
        let sessions = Arc::new(SessionService::new(cache.clone(), config.session_ttl()));
        let auth = AuthService::new(config, cache.clone(), queue, sessions, users.clone());
        Ok(Harness {
            auth,
            users,
            cache,
            emails,
        })
    }

    fn next_task(emails: &mut UnboundedReceiver<Vec<u8>>) -> anyhow::Result<EmailTask> {
        let message = emails.try_recv()?;
        Ok(serde_json::from_slice(&message)?)
    }

    fn code_from_task(task: &EmailTask) -> anyhow::Result<Uuid> {
        let link = task.params["magic_link"]
            .as_str()
            .ok_or_else(|| anyhow!("missing magic_link"))?;
        let url = Url::parse(link)?;
        let code = url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| anyhow!("missing code"))?;
        Ok(Uuid::parse_str(&code)?)
    }

    #[test]
    fn link_is_query_encoded() -> anyhow::Result<()> {
        let code = Uuid::nil();
        let url = magic_link_url("https://api.bookwise.dev", code, "https://bookwise.dev/a?b=c")?;
        assert_eq!(
            url.as_str(),
            "https://api.bookwise.dev/v1/auth/link?code=00000000-0000-0000-0000-000000000000&redirect=https%3A%2F%2Fbookwise.dev%2Fa%3Fb%3Dc"
        );
        Ok(())
    }

    #[tokio::test]
    async fn member_sign_in_queues_email_with_member_redirect() -> anyhow::Result<()> {
        let mut h = harness().await?;
        let user = h
            .users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;

        h.auth.sign_in("ana@bookwise.test", &[Role::Member]).await?;

        let task = next_task(&mut h.emails)?;
        assert_eq!(task.to, vec![user.email.clone()]);
        assert_eq!(task.template, SIGN_IN_TEMPLATE);
        assert_eq!(task.params["name"], "Ana Reader");
        let link = task.params["magic_link"].as_str().unwrap_or_default();
        assert!(link.starts_with("http://api.bookwise.test/v1/auth/link?code="));
        assert!(link.ends_with("&redirect=http%3A%2F%2Fbookwise.test"));

        let code = code_from_task(&task)?;
        let stored = h.cache.get(&cache::magic_link_key(code)).await?;
        assert_eq!(stored, user.id.to_string());
        Ok(())
    }

    #[tokio::test]
    async fn admin_sign_in_uses_admin_redirect() -> anyhow::Result<()> {
        let mut h = harness().await?;
        h.users
            .insert(User::new("Ada Admin", "ada@bookwise.test", Role::Admin))
            .await;

        h.auth
            .sign_in("ada@bookwise.test", &[Role::Admin, Role::Owner])
            .await?;

        let task = next_task(&mut h.emails)?;
        let link = task.params["magic_link"].as_str().unwrap_or_default();
        assert!(link.ends_with("&redirect=http%3A%2F%2Fadmin.bookwise.test"));
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_outside_allowed_roles_is_user_not_found() -> anyhow::Result<()> {
        let mut h = harness().await?;
        h.users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;

        let result = h
            .auth
            .sign_in("ana@bookwise.test", &[Role::Admin, Role::Owner])
            .await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));

        let unknown = h.auth.sign_in("nobody@bookwise.test", &[Role::Member]).await;
        assert!(matches!(unknown, Err(AuthError::UserNotFound)));
        assert!(h.emails.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn blocked_user_cannot_sign_in() -> anyhow::Result<()> {
        let mut h = harness().await?;
        let mut user = User::new("Bo Blocked", "bo@bookwise.test", Role::Member);
        user.status = UserStatus::Blocked;
        h.users.insert(user).await;

        let result = h.auth.sign_in("bo@bookwise.test", &[Role::Member]).await;
        assert!(matches!(result, Err(AuthError::UserBlocked)));
        assert!(h.emails.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn magic_link_works_once() -> anyhow::Result<()> {
        let mut h = harness().await?;
        let user = h
            .users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        h.auth.sign_in("ana@bookwise.test", &[Role::Member]).await?;
        let code = code_from_task(&next_task(&mut h.emails)?)?;

        let session = h.auth.verify_magic_link(code).await?;
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.role, Role::Member);
        assert_eq!(token::extract_session_id(&session.token)?, session.session_id);

        assert!(matches!(
            h.auth.verify_magic_link(code).await,
            Err(AuthError::MagicLinkNotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_redemption_opens_one_session() -> anyhow::Result<()> {
        let mut h = harness().await?;
        h.users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        h.auth.sign_in("ana@bookwise.test", &[Role::Member]).await?;
        let code = code_from_task(&next_task(&mut h.emails)?)?;

        let auth = Arc::new(h.auth);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = auth.clone();
            handles.push(tokio::spawn(
                async move { auth.verify_magic_link(code).await },
            ));
        }
        let mut opened = 0;
        for handle in handles {
            if handle.await?.is_ok() {
                opened += 1;
            }
        }
        assert_eq!(opened, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_code_is_magic_link_not_found() -> anyhow::Result<()> {
        let h = harness().await?;
        assert!(matches!(
            h.auth.verify_magic_link(Uuid::now_v7()).await,
            Err(AuthError::MagicLinkNotFound)
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_code_is_magic_link_not_found() -> anyhow::Result<()> {
        let mut h = harness().await?;
        h.users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        h.auth.sign_in("ana@bookwise.test", &[Role::Member]).await?;
        let code = code_from_task(&next_task(&mut h.emails)?)?;

        tokio::time::advance(Duration::from_secs(15 * 60 + 1)).await;

        assert!(matches!(
            h.auth.verify_magic_link(code).await,
            Err(AuthError::MagicLinkNotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn verify_for_deleted_user_is_user_not_found() -> anyhow::Result<()> {
        let mut h = harness().await?;
        let user = h
            .users
            .insert(User::new("Ana Reader", "ana@bookwise.test", Role::Member))
            .await;
        h.auth.sign_in("ana@bookwise.test", &[Role::Member]).await?;
        let code = code_from_task(&next_task(&mut h.emails)?)?;

        h.users.delete_user(user.id).await?;

        assert!(matches!(
            h.auth.verify_magic_link(code).await,
            Err(AuthError::UserNotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_deletes_only_that_session() -> anyhow::Result<()> {
        let h = harness().await?;
        let user_id = Uuid::now_v7();
        let current = h.auth.sessions().create_session(user_id, Role::Member).await?;
        let other = h.auth.sessions().create_session(user_id, Role::Member).await?;

        h.auth.sign_out(&current).await?;

        assert!(matches!(
            h.auth.sessions().get_session_by_token(&current.token).await,
            Err(AuthError::SessionNotFound)
        ));
        assert_eq!(
            h.auth.sessions().get_session_by_token(&other.token).await?,
            other
        );
        Ok(())
    }
}
