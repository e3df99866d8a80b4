//! Authentication collaborator boundary.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use expense_core::UserIdentity;

use crate::local::{LocalPersistence, Scope};

/// Durable key remembering the signed-in identity between runs.
pub const AUTH_USER_KEY: &str = "auth_user";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no identity provider is configured")]
    NotConfigured,

    #[error("sign-in was cancelled")]
    Cancelled,
}

/// Supplies the current identity and notifies on every change.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current(&self) -> Option<UserIdentity>;

    /// Change feed; the receiver starts at the current identity.
    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>>;

    async fn sign_in(&self) -> Result<UserIdentity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Provider backed by a fixed, configured identity.
///
/// Signing in yields the configured identity; without one, sign-in fails with
/// [`AuthError::NotConfigured`]. When built with [`restore`](Self::restore)
/// the signed-in state is kept in the durable local store.
pub struct LocalAuthProvider {
    identity: Option<UserIdentity>,
    state: watch::Sender<Option<UserIdentity>>,
    persistence: Option<LocalPersistence>,
}

impl LocalAuthProvider {
    /// Start signed out.
    pub fn new(identity: Option<UserIdentity>) -> Self {
        Self {
            identity,
            state: watch::channel(None).0,
            persistence: None,
        }
    }

    /// Start signed in if a previous run left the configured user signed in.
    pub fn restore(identity: Option<UserIdentity>, persistence: LocalPersistence) -> Self {
        let remembered: Option<UserIdentity> = persistence.read_json(Scope::Durable, AUTH_USER_KEY);
        let current = match (&identity, remembered) {
            (Some(configured), Some(previous)) if configured.id == previous.id => {
                Some(configured.clone())
            }
            (_, Some(previous)) => {
                tracing::info!(user_id = %previous.id, "remembered user no longer configured");
                persistence.remove(Scope::Durable, AUTH_USER_KEY);
                None
            }
            _ => None,
        };

        Self {
            identity,
            state: watch::channel(current).0,
            persistence: Some(persistence),
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    fn current(&self) -> Option<UserIdentity> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.state.subscribe()
    }

    async fn sign_in(&self) -> Result<UserIdentity, AuthError> {
        let identity = self.identity.clone().ok_or(AuthError::NotConfigured)?;
        if let Some(persistence) = &self.persistence {
            persistence.write_json(Scope::Durable, AUTH_USER_KEY, &identity);
        }
        tracing::info!(user_id = %identity.id, "signed in");
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(persistence) = &self.persistence {
            persistence.remove(Scope::Durable, AUTH_USER_KEY);
        }
        if self.state.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::local::InMemoryKeyValueStore;

    fn persistence() -> LocalPersistence {
        LocalPersistence::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(InMemoryKeyValueStore::new()),
        )
    }

    #[tokio::test]
    async fn test_sign_in_requires_configured_identity() {
        let provider = LocalAuthProvider::new(None);
        assert_eq!(provider.sign_in().await.unwrap_err(), AuthError::NotConfigured);
        assert!(provider.current().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let provider = LocalAuthProvider::new(Some(UserIdentity::new("demo-user-123")));
        let mut rx = provider.subscribe();

        provider.sign_in().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|u| u.id.as_str()), Some("demo-user-123"));

        provider.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_is_remembered() {
        let local = persistence();
        let identity = UserIdentity::new("u1").with_display_name("Ada");

        let provider = LocalAuthProvider::restore(Some(identity.clone()), local.clone());
        assert!(provider.current().is_none());
        provider.sign_in().await.unwrap();

        let restored = LocalAuthProvider::restore(Some(identity.clone()), local.clone());
        assert_eq!(restored.current(), Some(identity));

        restored.sign_out().await.unwrap();
        let restored = LocalAuthProvider::restore(Some(UserIdentity::new("u1")), local);
        assert!(restored.current().is_none());
    }

    #[tokio::test]
    async fn test_other_remembered_user_is_forgotten() {
        let local = persistence();
        LocalAuthProvider::restore(Some(UserIdentity::new("u1")), local.clone())
            .sign_in()
            .await
            .unwrap();

        let provider = LocalAuthProvider::restore(Some(UserIdentity::new("u2")), local.clone());
        assert!(provider.current().is_none());
        assert!(local.read_raw(Scope::Durable, AUTH_USER_KEY).is_none());
    }
}
