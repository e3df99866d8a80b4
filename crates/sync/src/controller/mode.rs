use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Where the current data lives.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StorageMode {
    /// Local only, discarded when the session ends
    #[default]
    Session,
    /// Backed by the user's remote document
    Persistent,
}

impl StorageMode {
    pub fn is_persistent(self) -> bool {
        matches!(self, StorageMode::Persistent)
    }
}

/// Logical keys the remote document knows about.
///
/// Any other key passed to the controller is stored locally only.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataKey {
    Expenses,
    Budget,
}

impl DataKey {
    /// Remote document field backing this key.
    pub fn field(self) -> &'static str {
        match self {
            DataKey::Expenses => crate::remote::EXPENSES_FIELD,
            DataKey::Budget => crate::remote::BUDGET_FIELD,
        }
    }
}
