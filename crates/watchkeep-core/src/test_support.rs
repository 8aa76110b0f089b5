//! Builders and fake collaborators shared by the unit tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use watchkeep_models::{
    Episode, ItemLink, MediaKind, MovieHistoryEntry, SeriesMeta, SeriesProgress, SeriesSummary,
    UserData, WatchlistCategory, WatchlistEntry,
};
use watchkeep_source::{CatalogSource, SourceError};

pub fn meta(name: &str) -> SeriesMeta {
    SeriesMeta {
        name: name.to_string(),
        year: Some(2020),
        status: None,
        image_tag: None,
    }
}

pub fn summary(series_id: &str, name: &str) -> SeriesSummary {
    SeriesSummary {
        series_id: series_id.to_string(),
        meta: meta(name),
    }
}

pub fn episode(id: &str, season: u32, index: u32, watched: bool) -> Episode {
    Episode {
        id: id.to_string(),
        title: format!("Episode {}", index),
        season_number: season,
        index_number: index,
        index_number_end: None,
        premiere_date: Some(Utc::now() - Duration::days(30)),
        user_data: UserData {
            played: watched,
            is_favorite: false,
            last_played: watched.then(|| Utc::now() - Duration::days(1)),
            play_count: u32::from(watched),
        },
    }
}

/// A summary-only progress record (no episode detail), the shape a cold load
/// from the persistent tier produces.
pub fn series_progress(series_id: &str, name: &str, watched: u32, total: u32) -> SeriesProgress {
    let mut progress = SeriesProgress::new(series_id.to_string(), meta(name));
    let bits: String = (0..total).map(|i| if i < watched { '1' } else { '0' }).collect();
    progress.binary_progress.insert(1, bits);
    progress.set_counts(watched, total);
    progress
}

pub fn movie_entry(id: &str, title: &str, provider_id: Option<&str>) -> MovieHistoryEntry {
    MovieHistoryEntry {
        id: id.to_string(),
        title: title.to_string(),
        year: Some(2019),
        genres: vec!["Drama".to_string()],
        provider_id: provider_id.map(str::to_string),
        user_data: UserData::played_at(Utc::now()),
    }
}

pub fn watchlist_entry(
    id: &str,
    name: &str,
    kind: MediaKind,
    series_id: Option<&str>,
    season_number: Option<u32>,
) -> WatchlistEntry {
    WatchlistEntry {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        year: Some(2020),
        series_id: series_id.map(str::to_string),
        season_number,
        user_data: UserData::default(),
    }
}

pub fn episode_link(item_id: &str, series_id: &str, season: u32, index: u32) -> ItemLink {
    ItemLink {
        item_id: item_id.to_string(),
        kind: MediaKind::Episode,
        name: Some(format!("Episode {}", index)),
        year: None,
        series_id: Some(series_id.to_string()),
        season_number: Some(season),
        index_number: Some(index),
        provider_id: None,
    }
}

pub fn movie_link(item_id: &str, name: &str, provider_id: Option<&str>) -> ItemLink {
    ItemLink {
        item_id: item_id.to_string(),
        kind: MediaKind::Movie,
        name: Some(name.to_string()),
        year: Some(2019),
        series_id: None,
        season_number: None,
        index_number: None,
        provider_id: provider_id.map(str::to_string),
    }
}

/// In-memory stand-in for the remote catalog, with call counters so tests can
/// assert on fetch behavior.
#[derive(Default)]
pub struct FakeCatalog {
    pub series: Mutex<Vec<SeriesSummary>>,
    pub episodes: Mutex<HashMap<String, Vec<Episode>>>,
    pub movies: Mutex<Vec<MovieHistoryEntry>>,
    pub watchlists: Mutex<HashMap<WatchlistCategory, Vec<WatchlistEntry>>>,
    pub links: Mutex<HashMap<String, ItemLink>>,
    pub series_list_calls: AtomicUsize,
    pub episode_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub played_calls: AtomicUsize,
    pub fail: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_series(&self, series_id: &str, name: &str, episodes: Vec<Episode>) {
        self.series.lock().unwrap().push(summary(series_id, name));
        self.episodes
            .lock()
            .unwrap()
            .insert(series_id.to_string(), episodes);
    }

    pub fn add_link(&self, link: ItemLink) {
        self.links
            .lock()
            .unwrap()
            .insert(link.item_id.clone(), link);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Fail only the write-back calls, leaving reads working. Exercises the
    /// degraded optimistic-toggle path.
    pub fn set_write_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), SourceError> {
        self.check()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(SourceError::new("fake write failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(SourceError::new("fake transport failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_series_list(
        &self,
        ids: Option<&[String]>,
    ) -> Result<Vec<SeriesSummary>, SourceError> {
        self.check()?;
        self.series_list_calls.fetch_add(1, Ordering::SeqCst);
        let series = self.series.lock().unwrap();
        Ok(match ids {
            Some(ids) => series
                .iter()
                .filter(|s| ids.contains(&s.series_id))
                .cloned()
                .collect(),
            None => series.clone(),
        })
    }

    async fn fetch_episodes(&self, series_id: &str) -> Result<Vec<Episode>, SourceError> {
        self.check()?;
        self.episode_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_watched_movies(&self) -> Result<Vec<MovieHistoryEntry>, SourceError> {
        self.check()?;
        Ok(self.movies.lock().unwrap().clone())
    }

    async fn fetch_watchlist_items(
        &self,
        category: WatchlistCategory,
    ) -> Result<Vec<WatchlistEntry>, SourceError> {
        self.check()?;
        Ok(self
            .watchlists
            .lock()
            .unwrap()
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    async fn lookup_item(&self, item_id: &str) -> Result<Option<ItemLink>, SourceError> {
        self.check()?;
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.links.lock().unwrap().get(item_id).cloned())
    }

    async fn set_played_state(&self, _item_id: &str, _played: bool) -> Result<(), SourceError> {
        self.check_write()?;
        self.played_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_watchlist_membership(
        &self,
        _item_id: &str,
        _member: bool,
    ) -> Result<(), SourceError> {
        self.check_write()?;
        Ok(())
    }
}
