use serde::{Deserialize, Serialize};

use crate::user_data::UserData;

/// One watched movie in the history cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieHistoryEntry {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    /// Stable external identifier used to collapse duplicate library entries
    /// for the same movie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub user_data: UserData,
}
