use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user_data::UserData;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub season_number: u32,
    pub index_number: u32,
    /// Set when one catalog record covers a contiguous episode range
    /// (a multi-part episode). Inclusive upper bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_number_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premiere_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_data: UserData,
}

impl Episode {
    /// Number of logical episode slots this record covers. A normal episode
    /// is one slot; a multi-part record covers `end - start + 1` slots.
    /// An end index at or below the start index counts as a single slot.
    pub fn slot_count(&self) -> u32 {
        match self.index_number_end {
            Some(end) if end > self.index_number => end - self.index_number + 1,
            _ => 1,
        }
    }

    /// Whether the episode has premiered at `now`. Episodes without a
    /// premiere date are treated as unaired.
    pub fn is_aired(&self, now: DateTime<Utc>) -> bool {
        self.premiere_date.map(|d| d <= now).unwrap_or(false)
    }
}
