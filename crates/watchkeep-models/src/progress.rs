use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::episode::Episode;
use crate::media::SeriesMeta;

/// Minimal projection of the most recently watched episode, kept so the
/// persistent tier never has to carry full episode records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastWatchedEpisode {
    pub id: String,
    pub title: String,
    pub season_number: u32,
    pub index_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played: Option<DateTime<Utc>>,
}

/// Consumption progress for one series the user has started watching.
///
/// `binary_progress` maps season number -> bitstring with one character per
/// aired episode slot ('1' watched, '0' not). `episodes` is a memory-only
/// detail cache: it is never serialized, so persisting a `SeriesProgress`
/// automatically prunes it down to the summary fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesProgress {
    pub series_id: String,
    pub meta: SeriesMeta,
    pub watched_count: u32,
    pub total_episodes: u32,
    pub remaining_count: u32,
    pub percentage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_watched: Option<LastWatchedEpisode>,
    #[serde(default)]
    pub binary_progress: BTreeMap<u32, String>,
    #[serde(skip)]
    pub episodes: Option<Vec<Episode>>,
}

impl SeriesProgress {
    pub fn new(series_id: String, meta: SeriesMeta) -> Self {
        Self {
            series_id,
            meta,
            watched_count: 0,
            total_episodes: 0,
            remaining_count: 0,
            percentage: 0,
            last_watched: None,
            binary_progress: BTreeMap::new(),
            episodes: None,
        }
    }

    /// Recompute the derived count fields from a watched/total pair.
    /// Percentage is always derived here, never stored independently.
    pub fn set_counts(&mut self, watched: u32, total: u32) {
        self.watched_count = watched.min(total);
        self.total_episodes = total;
        self.remaining_count = total - self.watched_count;
        self.percentage = if total > 0 {
            ((self.watched_count as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
    }

    pub fn is_fully_watched(&self) -> bool {
        self.total_episodes > 0 && self.watched_count == self.total_episodes
    }
}
