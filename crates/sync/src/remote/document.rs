//! Typed view of the per-user remote document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use expense_core::{Expense, UserIdentity};

use super::traits::DocumentFields;
use crate::error::Result;

pub const EXPENSES_FIELD: &str = "expenses";
pub const BUDGET_FIELD: &str = "budget";
pub const LAST_UPDATED_FIELD: &str = "lastUpdated";
pub const USER_INFO_FIELD: &str = "userInfo";

/// Presentation fields copied from the identity into the document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl From<&UserIdentity> for UserInfo {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            name: identity.display_name.clone(),
            email: identity.email.clone(),
            photo_url: identity.photo_url.clone(),
        }
    }
}

/// A user's document after coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserDocument {
    pub expenses: Vec<Expense>,
    pub budget: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub user_info: Option<UserInfo>,
}

impl UserDocument {
    /// The value reported for a user with no document: no expenses, zero budget.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Coerce an untyped document, never failing.
    ///
    /// - `expenses` that is not an array reads as empty; array entries that
    ///   are not valid expense records are skipped
    /// - `budget` that is not a finite non-negative number reads as zero
    /// - anything that is not an object reads as [`UserDocument::empty`]
    pub fn from_value(value: &Value) -> Self {
        let Some(fields) = value.as_object() else {
            return Self::empty();
        };

        let expenses = match fields.get(EXPENSES_FIELD) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                    Ok(expense) => Some(expense),
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping malformed remote expense");
                        None
                    }
                })
                .collect(),
            Some(other) if !other.is_null() => {
                tracing::warn!("remote expenses field is not an array; treating as empty");
                Vec::new()
            }
            _ => Vec::new(),
        };

        let budget = fields
            .get(BUDGET_FIELD)
            .and_then(Value::as_f64)
            .filter(|budget| budget.is_finite() && *budget >= 0.0)
            .unwrap_or(0.0);

        let last_updated = fields
            .get(LAST_UPDATED_FIELD)
            .and_then(|value| serde_json::from_value(value.clone()).ok());

        let user_info = fields
            .get(USER_INFO_FIELD)
            .and_then(|value| serde_json::from_value(value.clone()).ok());

        Self {
            expenses,
            budget,
            last_updated,
            user_info,
        }
    }
}

/// Partial document write; only the fields set here are touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentPatch {
    fields: DocumentFields,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary top-level field from an already encoded value.
    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn expenses(self, expenses: &[Expense]) -> Result<Self> {
        let value = serde_json::to_value(expenses)?;
        Ok(self.field(EXPENSES_FIELD, value))
    }

    pub fn budget(self, budget: f64) -> Self {
        self.field(BUDGET_FIELD, Value::from(budget))
    }

    pub fn user_info(self, info: &UserInfo) -> Result<Self> {
        let value = serde_json::to_value(info)?;
        Ok(self.field(USER_INFO_FIELD, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> DocumentFields {
        self.fields
    }
}
