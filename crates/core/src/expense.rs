//! Expense records and id generation.
//!
//! An [`Expense`] is immutable once created; the only mutation the system
//! supports is deletion by id. Ids are derived from the creation instant in
//! milliseconds so that sorting by id roughly sorts by recency.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{LedgerError, Result};

/// Expense identifier (creation time in milliseconds since the Unix epoch).
pub type ExpenseId = u64;

/// A recorded expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub amount: f64,
    pub category: Category,
    /// Calendar date the expense applies to (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// Creation instant; authoritative for ordering and merge.
    pub timestamp: DateTime<Utc>,
}

/// User-supplied fields of an expense before an id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: f64,
    pub category: Category,
    pub date: NaiveDate,
}

impl ExpenseDraft {
    pub fn new(
        description: impl Into<String>,
        amount: f64,
        category: Category,
        date: NaiveDate,
    ) -> Self {
        Self {
            description: description.into(),
            amount,
            category,
            date,
        }
    }

    /// Check the draft against the record invariants.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(LedgerError::EmptyDescription);
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(LedgerError::InvalidAmount(self.amount));
        }
        Ok(())
    }
}

impl Expense {
    /// Build a record from a validated draft.
    pub fn from_draft(draft: ExpenseDraft, id: ExpenseId, timestamp: DateTime<Utc>) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            description: draft.description.trim().to_string(),
            amount: draft.amount,
            category: draft.category,
            date: draft.date,
            timestamp,
        })
    }
}

/// Issues expense ids from the wall clock.
///
/// Two expenses created within the same millisecond would collide, so each
/// id is bumped to be strictly greater than the last one handed out.
#[derive(Debug, Default)]
pub struct ExpenseIdGenerator {
    last: AtomicU64,
}

impl ExpenseIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for an expense created at `now`.
    pub fn next_id(&self, now: DateTime<Utc>) -> ExpenseId {
        let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous.saturating_add(1))
    }

    /// Make sure future ids sort after `id` (used after loading stored records).
    pub fn observe(&self, id: ExpenseId) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(amount: f64) -> ExpenseDraft {
        ExpenseDraft::new(
            "Coffee",
            amount,
            Category::Food,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[test]
    fn test_rejects_invalid_drafts() {
        assert_eq!(
            draft(-1.0).validate(),
            Err(LedgerError::InvalidAmount(-1.0))
        );
        assert!(matches!(
            draft(f64::NAN).validate(),
            Err(LedgerError::InvalidAmount(_))
        ));

        let mut blank = draft(1.0);
        blank.description = "   ".to_string();
        assert_eq!(blank.validate(), Err(LedgerError::EmptyDescription));

        assert!(draft(0.0).validate().is_ok());
    }

    #[test]
    fn test_ids_are_strictly_increasing_within_same_millisecond() {
        let ids = ExpenseIdGenerator::new();
        let now = Utc.timestamp_millis_opt(1_704_067_200_000).unwrap();

        let first = ids.next_id(now);
        let second = ids.next_id(now);
        let third = ids.next_id(now);

        assert_eq!(first, 1_704_067_200_000);
        assert_eq!(second, first + 1);
        assert_eq!(third, first + 2);
    }

    #[test]
    fn test_observe_pushes_ids_forward() {
        let ids = ExpenseIdGenerator::new();
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        ids.observe(5_000);
        assert_eq!(ids.next_id(now), 5_001);
    }

    #[test]
    fn test_json_shape() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        let expense = Expense::from_draft(draft(4.5), 42, timestamp).unwrap();
        let value = serde_json::to_value(&expense).unwrap();

        assert_eq!(value["id"], 42);
        assert_eq!(value["category"], "food");
        assert_eq!(value["date"], "2024-01-01");
        assert_eq!(value["amount"], 4.5);

        let back: Expense = serde_json::from_value(value).unwrap();
        assert_eq!(back, expense);
    }
}
