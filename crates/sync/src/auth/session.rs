//! Reacts to authentication changes: migration, mode fallback, and the
//! remote subscription lifecycle.

use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;

use expense_core::UserIdentity;

use crate::bridge::SyncBridge;
use crate::controller::{StorageController, StorageMode};
use crate::error::{Result, SyncError};
use crate::migration::{MigrationEngine, MigrationSummary};

/// What a call to [`AuthSession::handle_auth_change`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthTransition {
    /// Same user as before
    Unchanged,
    SignedIn {
        user_id: String,
        migrated: Option<MigrationSummary>,
    },
    SignedOut,
}

pub struct AuthSession {
    controller: Arc<StorageController>,
    migration: MigrationEngine,
    bridge: SyncBridge,
    /// Last user id seen; also serializes transitions.
    last_user: Mutex<Option<String>>,
}

impl AuthSession {
    pub fn new(controller: Arc<StorageController>, bridge: SyncBridge) -> Self {
        Self {
            migration: MigrationEngine::new(Arc::clone(&controller)),
            controller,
            bridge,
            last_user: Mutex::new(None),
        }
    }

    pub fn controller(&self) -> &Arc<StorageController> {
        &self.controller
    }

    pub fn bridge(&self) -> &SyncBridge {
        &self.bridge
    }

    /// Apply an identity change from the auth collaborator.
    ///
    /// Migration runs only on a transition from no user to a user while the
    /// session holds expenses. Failures are reported through notices and
    /// logs; the transition itself always completes.
    pub async fn handle_auth_change(&self, user: Option<UserIdentity>) -> AuthTransition {
        let mut last_user = self.last_user.lock().await;
        let next = user.as_ref().map(|u| u.id.clone());
        if *last_user == next {
            return AuthTransition::Unchanged;
        }
        let previous = std::mem::replace(&mut *last_user, next);

        let transition = match user {
            None => {
                self.bridge.detach();
                self.controller.set_current_user(None);
                AuthTransition::SignedOut
            }
            Some(identity) => {
                if previous.is_some() {
                    // Switching accounts; the old feed must not leak into the new user.
                    self.bridge.detach();
                }
                self.controller.replace_user(Some(identity.clone()));

                let migrated = if previous.is_none() && self.controller.has_session_data() {
                    match self.migration.migrate(&identity).await {
                        Ok(summary) => summary,
                        Err(err) => {
                            tracing::warn!(error = %err, "migration failed; session data kept");
                            None
                        }
                    }
                } else {
                    None
                };
                // No-op once a migration switched to persistent mode.
                self.controller.suggest_upgrade();

                if self.controller.mode().is_persistent() {
                    self.attach(&identity.id).await;
                }
                // Writes queued before a sign-out still belong to their user.
                self.flush_if_pending().await;
                AuthTransition::SignedIn {
                    user_id: identity.id,
                    migrated,
                }
            }
        };

        self.reload_ledger().await;
        transition
    }

    /// Explicit, user-confirmed switch to persistent storage.
    ///
    /// Session expenses are migrated first; with none, the mode is switched
    /// directly.
    pub async fn enable_persistent_storage(&self) -> Result<Option<MigrationSummary>> {
        let user = self
            .controller
            .current_user()
            .ok_or(SyncError::NotAuthenticated)?;

        let migrated = if self.controller.has_session_data() {
            self.migration.migrate(&user).await?
        } else {
            self.controller.set_mode(StorageMode::Persistent);
            None
        };

        self.go_live(&user.id).await;
        self.reload_ledger().await;
        Ok(migrated)
    }

    /// Switch back to session storage. The remote document is kept.
    pub async fn use_session_storage(&self) {
        self.bridge.detach();
        self.controller.set_mode(StorageMode::Session);
        self.reload_ledger().await;
    }

    async fn go_live(&self, user_id: &str) {
        self.attach(user_id).await;
        self.flush_if_pending().await;
    }

    async fn attach(&self, user_id: &str) {
        if let Err(err) = self.bridge.attach(user_id).await {
            tracing::warn!(user_id, error = %err, "could not subscribe to remote changes");
        }
    }

    async fn flush_if_pending(&self) {
        if self.controller.pending_writes() > 0 {
            self.controller.flush_pending().await;
        }
    }

    /// Reload the shared ledger from wherever the current mode points.
    async fn reload_ledger(&self) {
        let expenses = self.controller.load_expenses().await;
        let budget = self.controller.load_budget().await;
        self.bridge
            .ledger()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(expenses, budget);
    }
}
