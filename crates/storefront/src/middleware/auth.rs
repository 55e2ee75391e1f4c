//! Session-backed identity.
//!
//! The session is the storefront's [`AuthGateway`]: a request is
//! authenticated when its session carries a [`CurrentUser`].

use async_trait::async_trait;
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};
use crate::services::orders::{AuthGateway, GatewayError, Identity};

#[async_trait]
impl AuthGateway for Session {
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError> {
        let user: Option<CurrentUser> = self
            .get(session_keys::CURRENT_USER)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(user.map(|u| Identity::new(u.id)))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    // New privilege level, new session ID.
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use orderdesk_core::UserId;
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_anonymous_session_has_no_identity() {
        let session = session();
        assert_eq!(session.current_identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_identity_follows_login() {
        let session = session();
        set_current_user(&session, &CurrentUser::new(UserId::new(7)))
            .await
            .unwrap();
        assert_eq!(
            session.current_identity().await.unwrap(),
            Some(Identity::new(UserId::new(7)))
        );
    }
}
