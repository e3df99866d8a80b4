//! Spending categories.

use serde::{Deserialize, Serialize};

/// Closed set of categories an expense can be filed under.
///
/// The string form (used on the wire and in local storage) is snake_case.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Entertainment,
    Bills,
    Health,
    Education,
    #[default]
    Other,
}

impl Category {
    /// Capitalized label for presentation.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Shopping => "Shopping",
            Category::Entertainment => "Entertainment",
            Category::Bills => "Bills",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Other => "Other",
        }
    }
}
