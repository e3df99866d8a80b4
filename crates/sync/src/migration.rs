//! One-shot transfer of session data into the user's remote document.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use expense_core::{Expense, ExpenseId, UserIdentity};

use crate::controller::{DataKey, StorageController, StorageMode};
use crate::error::Result;
use crate::events::Notice;
use crate::local::{Partition, Scope, storage_key};
use crate::remote::{DocumentPatch, UserInfo};

/// What a completed migration moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Session expenses that were migrated
    pub expense_count: usize,
    /// Expenses in the remote document afterwards
    pub total_expenses: usize,
    pub budget: f64,
}

/// Merge session expenses into the remote list.
///
/// Remote records win on id collision. Session records with new ids are
/// appended and the result is sorted newest first (timestamp, then id). When
/// nothing new is appended the remote list is returned unchanged.
pub fn merge_expenses(remote: &[Expense], session: &[Expense]) -> Vec<Expense> {
    let mut seen: HashSet<ExpenseId> = remote.iter().map(|e| e.id).collect();
    let mut merged = remote.to_vec();

    let appended: Vec<Expense> = session
        .iter()
        .filter(|e| seen.insert(e.id))
        .cloned()
        .collect();
    if appended.is_empty() {
        return merged;
    }

    merged.extend(appended);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    merged
}

/// Moves session-partition data into a newly known user's remote document.
pub struct MigrationEngine {
    controller: Arc<StorageController>,
}

impl MigrationEngine {
    pub fn new(controller: Arc<StorageController>) -> Self {
        Self { controller }
    }

    /// Migrate session data for `user`.
    ///
    /// Returns `Ok(None)` when the session holds no expenses. On any remote
    /// failure nothing is cleared and the mode is unchanged, so the call can
    /// simply be repeated.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn migrate(&self, user: &UserIdentity) -> Result<Option<MigrationSummary>> {
        let (session_expenses, session_budget) = self.controller.session_data();
        if session_expenses.is_empty() {
            tracing::debug!("no session expenses; nothing to migrate");
            return Ok(None);
        }

        match self.transfer(user, session_expenses, session_budget).await {
            Ok(summary) => {
                self.controller
                    .events()
                    .notify(Notice::MigrationCompleted(summary.clone()));
                Ok(Some(summary))
            }
            Err(err) => {
                self.controller.events().notify(Notice::MigrationFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn transfer(
        &self,
        user: &UserIdentity,
        session_expenses: Vec<Expense>,
        session_budget: f64,
    ) -> Result<MigrationSummary> {
        let remote = self.controller.remote().load(&user.id).await?;
        let expense_count = session_expenses.len();

        let merged = if remote.expenses.is_empty() {
            session_expenses
        } else {
            merge_expenses(&remote.expenses, &session_expenses)
        };
        let budget = if session_budget > 0.0 {
            session_budget
        } else {
            remote.budget
        };

        let patch = DocumentPatch::new()
            .expenses(&merged)?
            .budget(budget)
            .user_info(&UserInfo::from(user))?;
        self.controller.remote().save(&user.id, patch).await?;

        let partition = Partition::User(user.id.clone());
        let local = self.controller.local();
        local.write_json(
            Scope::Durable,
            &storage_key(DataKey::Expenses.as_ref(), &partition),
            &merged,
        );
        local.write_json(
            Scope::Durable,
            &storage_key(DataKey::Budget.as_ref(), &partition),
            &budget,
        );

        self.controller.clear_session_data();
        self.controller.set_mode(StorageMode::Persistent);

        tracing::info!(
            migrated = expense_count,
            total = merged.len(),
            budget,
            "session data migrated"
        );
        Ok(MigrationSummary {
            expense_count,
            total_expenses: merged.len(),
            budget,
        })
    }
}
