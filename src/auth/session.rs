//! Cache-backed session store.
//!
//! Each session is a JSON record under `session:{session_id}`; its id is also a
//! member of `user_sessions:{user_id}` so all sessions of a user can be found
//! without scanning. Both keys share the session TTL.

use super::{AuthError, Role, token, unix_now};
use crate::cache::{self, CacheError, CacheStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub token: String,
    pub created_at: i64,
}

pub struct SessionService {
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

fn session_error(err: CacheError) -> AuthError {
    match err {
        CacheError::Miss => AuthError::SessionNotFound,
        other => AuthError::Internal(other.into()),
    }
}

impl SessionService {
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Open a new session for `user_id`.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the cache write fails.
    pub async fn create_session(&self, user_id: Uuid, role: Role) -> Result<Session, AuthError> {
        let session_id = Uuid::now_v7();
        let session = Session {
            user_id,
            session_id,
            role,
            token: token::create_token(user_id, session_id),
            created_at: unix_now(),
        };

        let record = serde_json::to_string(&session).map_err(|err| session_error(err.into()))?;
        self.cache
            .set_with_index(
                &cache::session_key(session_id),
                &record,
                &cache::user_sessions_key(user_id),
                &session_id.to_string(),
                self.ttl,
            )
            .await
            .map_err(session_error)?;

        debug!(%user_id, %session_id, "session created");
        Ok(session)
    }

    /// Resolve a presented token into its session.
    ///
    /// # Errors
    /// Returns [`AuthError::SessionNotFound`] for malformed, unknown, expired or
    /// mismatching tokens.
    pub async fn get_session_by_token(&self, token: &str) -> Result<Session, AuthError> {
        let session_id =
            token::extract_session_id(token).map_err(|_| AuthError::SessionNotFound)?;
        let session: Session = cache::get_json(self.cache.as_ref(), &cache::session_key(session_id))
            .await
            .map_err(session_error)?;

        // A well-formed token is not proof; it must match the stored one.
        if session.token.as_bytes() != token.as_bytes() {
            return Err(AuthError::SessionNotFound);
        }
        Ok(session)
    }

    /// All live sessions of a user. Index entries whose record is gone or
    /// unreadable are pruned on the way.
    ///
    /// # Errors
    /// Returns [`AuthError::SessionNotFound`] when the user has no session index.
    pub async fn get_sessions_by_user_id(&self, user_id: Uuid) -> Result<Vec<Session>, AuthError> {
        let index_key = cache::user_sessions_key(user_id);
        let members = self
            .cache
            .set_members(&index_key)
            .await
            .map_err(session_error)?;

        let mut sessions = Vec::with_capacity(members.len());
        for member in members {
            match cache::get_json::<Session>(self.cache.as_ref(), &cache::session_key(&member)).await
            {
                Ok(session) => sessions.push(session),
                Err(CacheError::Miss | CacheError::Serialization(_)) => {
                    debug!(%user_id, session_id = %member, "pruning stale session index entry");
                    if let Err(err) = self.cache.remove_from_set(&index_key, &member).await {
                        warn!(%user_id, session_id = %member, "failed to prune session index: {err}");
                    }
                }
                Err(err) => return Err(session_error(err)),
            }
        }

        sessions.sort_by_key(|session| session.session_id);
        Ok(sessions)
    }

    /// Revoke one session and drop it from its owner's index.
    ///
    /// # Errors
    /// Returns [`AuthError::SessionNotFound`] if the session does not exist, or the
    /// first cache error hit while removing it.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), AuthError> {
        let key = cache::session_key(session_id);
        let session: Session = cache::get_json(self.cache.as_ref(), &key)
            .await
            .map_err(session_error)?;

        let deleted = self.cache.delete(&key).await;
        let unindexed = self
            .cache
            .remove_from_set(
                &cache::user_sessions_key(session.user_id),
                &session_id.to_string(),
            )
            .await;

        deleted.and(unindexed).map_err(session_error)?;
        debug!(user_id = %session.user_id, %session_id, "session deleted");
        Ok(())
    }

    /// Revoke every session of a user through [`Self::delete_session`]. Members
    /// whose record is already gone are skipped, other failures are logged; the
    /// index itself is always removed.
    ///
    /// # Errors
    /// Returns [`AuthError::SessionNotFound`] when the user has no session index, or
    /// an internal error if the index cannot be deleted.
    pub async fn delete_all_sessions(&self, user_id: Uuid) -> Result<(), AuthError> {
        let index_key = cache::user_sessions_key(user_id);
        let members = self
            .cache
            .set_members(&index_key)
            .await
            .map_err(session_error)?;

        let mut revoked = 0_usize;
        for member in &members {
            let Ok(session_id) = member.parse::<Uuid>() else {
                warn!(%user_id, session_id = %member, "skipping malformed session index member");
                continue;
            };
            match self.delete_session(session_id).await {
                Ok(()) => revoked += 1,
                Err(AuthError::SessionNotFound) => {
                    debug!(%user_id, %session_id, "session already gone");
                }
                Err(err) => warn!(%user_id, %session_id, "failed to delete session: {err}"),
            }
        }

        self.cache.delete(&index_key).await.map_err(session_error)?;
        debug!(%user_id, revoked, "all sessions deleted");
        Ok(())
    }
}
