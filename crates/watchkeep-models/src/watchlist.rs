use serde::{Deserialize, Serialize};

use crate::media::MediaKind;
use crate::user_data::UserData;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchlistCategory {
    Movies,
    Series,
    Seasons,
    Episodes,
}

impl WatchlistCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchlistCategory::Movies => "movies",
            WatchlistCategory::Series => "series",
            WatchlistCategory::Seasons => "seasons",
            WatchlistCategory::Episodes => "episodes",
        }
    }

    pub fn all() -> [WatchlistCategory; 4] {
        [
            WatchlistCategory::Movies,
            WatchlistCategory::Series,
            WatchlistCategory::Seasons,
            WatchlistCategory::Episodes,
        ]
    }

    pub fn for_kind(kind: MediaKind) -> WatchlistCategory {
        match kind {
            MediaKind::Movie => WatchlistCategory::Movies,
            MediaKind::Series => WatchlistCategory::Series,
            MediaKind::Season => WatchlistCategory::Seasons,
            MediaKind::Episode => WatchlistCategory::Episodes,
        }
    }
}

/// One still-to-watch item in a watchlist category. An entry whose user data
/// turns fully played must be removed from its category's canonical array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    pub id: String,
    pub name: String,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Owning series, set for seasons and episodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub user_data: UserData,
}
