use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user playback state attached to any catalog item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserData {
    pub played: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub play_count: u32,
}

impl UserData {
    pub fn played_at(at: DateTime<Utc>) -> Self {
        Self {
            played: true,
            is_favorite: false,
            last_played: Some(at),
            play_count: 1,
        }
    }
}
