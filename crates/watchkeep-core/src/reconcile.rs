//! Reconciliation engine: apply one watched-state transition to the cache
//! without a full remote refetch, keeping every derived aggregate correct.
//!
//! Mutations always re-derive aggregates from per-item state (episode detail
//! when it is in memory, the progress bitstring otherwise) instead of
//! incrementing counters, so replayed or reordered updates converge on the
//! same result. Persistent-tier writes are coalesced at the end of each
//! operation, never interleaved per item.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use watchkeep_models::{MovieHistoryEntry, SeriesProgress, WatchlistCategory};
use watchkeep_source::{CatalogSource, EnvelopeStore};

use crate::error::CacheError;
use crate::progress::{
    build_series_progress, count_bits, flip, rebuild_from_episodes, season_fully_watched,
};
use crate::store::{SharedStore, WatchlistStores};

/// Enough episode identity to apply a single-episode transition when full
/// episode detail may be absent: the bit-flip fallback needs the season and
/// index, not the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRef {
    pub id: String,
    pub season_number: u32,
    pub index_number: u32,
}

#[derive(Clone)]
pub struct Reconciler {
    progress: SharedStore<SeriesProgress>,
    history: SharedStore<MovieHistoryEntry>,
    watchlists: WatchlistStores,
    source: Arc<dyn CatalogSource>,
    persistent: EnvelopeStore,
}

impl Reconciler {
    pub fn new(
        progress: SharedStore<SeriesProgress>,
        history: SharedStore<MovieHistoryEntry>,
        watchlists: WatchlistStores,
        source: Arc<dyn CatalogSource>,
        persistent: EnvelopeStore,
    ) -> Self {
        Self {
            progress,
            history,
            watchlists,
            source,
            persistent,
        }
    }

    /// Fetch-and-insert a series that is not yet in the progress cache, so a
    /// transition for it lands in a populated record instead of failing.
    async fn ensure_series_cached(&self, series_id: &str) -> Result<(), CacheError> {
        if self.progress.read().await.contains(series_id) {
            return Ok(());
        }

        debug!("Lazy backfill for uncached series {}", series_id);
        let ids = [series_id.to_string()];
        let summaries = self.source.fetch_series_list(Some(&ids)).await?;
        let summary = summaries
            .into_iter()
            .find(|s| s.series_id == series_id)
            .ok_or_else(|| CacheError::NotFound(series_id.to_string()))?;
        let episodes = self.source.fetch_episodes(series_id).await?;
        let record = build_series_progress(&summary, episodes, Utc::now());

        self.progress.write().await.upsert_one(record);
        Ok(())
    }

    /// Make sure per-episode detail is in memory for a series; it is pruned
    /// from the persistent tier and has to be refetched after a cold load.
    async fn ensure_episode_detail(&self, series_id: &str) -> Result<(), CacheError> {
        self.ensure_series_cached(series_id).await?;
        if let Some(record) = self.progress.read().await.get(series_id) {
            if record.episodes.is_some() {
                return Ok(());
            }
        }

        let episodes = self.source.fetch_episodes(series_id).await?;
        let mut guard = self.progress.write().await;
        if let Some(record) = guard.get_mut(series_id) {
            record.episodes = Some(episodes);
            rebuild_from_episodes(record, Utc::now());
        }
        Ok(())
    }

    /// Apply one episode watched/unwatched transition.
    ///
    /// With episode detail in memory the episode record is mutated and every
    /// aggregate re-derived from the expanded episode set. Without detail the
    /// corresponding bit is flipped directly; the bit stays correct even
    /// though multi-part offsets can leave fine-grained aggregates
    /// approximate until the next full reconciliation.
    #[instrument(skip(self))]
    pub async fn set_episode_watched(
        &self,
        series_id: &str,
        episode: Option<&EpisodeRef>,
        watched: bool,
    ) -> Result<(), CacheError> {
        self.ensure_series_cached(series_id).await?;

        let season_number = episode.map(|e| e.season_number);
        {
            let mut guard = self.progress.write().await;
            let record = guard
                .get_mut(series_id)
                .ok_or_else(|| CacheError::NotFound(series_id.to_string()))?;

            if record.episodes.is_some() {
                if let (Some(episodes), Some(target)) = (record.episodes.as_mut(), episode) {
                    if let Some(ep) = episodes.iter_mut().find(|e| e.id == target.id) {
                        if watched && !ep.user_data.played {
                            ep.user_data.play_count += 1;
                        }
                        ep.user_data.played = watched;
                        ep.user_data.last_played = watched.then(Utc::now);
                    } else {
                        warn!(
                            "Episode {} not in cached detail for series {}",
                            target.id, series_id
                        );
                    }
                }
                rebuild_from_episodes(record, Utc::now());
            } else {
                if let Some(target) = episode {
                    let slot = target.index_number.saturating_sub(1) as usize;
                    flip(
                        &mut record.binary_progress,
                        target.season_number,
                        slot,
                        watched,
                    );
                }
                let (watched_bits, total_bits) = count_bits(&record.binary_progress);
                record.set_counts(watched_bits, total_bits);
            }

            guard.persist(&self.persistent);
        }

        if watched {
            let episode_id = episode.map(|e| e.id.as_str());
            self.cascade_watchlist_removals(series_id, season_number, episode_id)
                .await;
        }
        Ok(())
    }

    /// Mark every unwatched aired episode of a series watched. All mutations
    /// land in memory first; the progress cache persists exactly once at the
    /// end. Returns how many episodes changed state.
    #[instrument(skip(self))]
    pub async fn mark_series_watched(&self, series_id: &str) -> Result<u32, CacheError> {
        self.ensure_episode_detail(series_id).await?;

        let now = Utc::now();
        let mut changed = 0;
        {
            let mut guard = self.progress.write().await;
            let record = guard
                .get_mut(series_id)
                .ok_or_else(|| CacheError::NotFound(series_id.to_string()))?;

            if let Some(episodes) = record.episodes.as_mut() {
                for ep in episodes.iter_mut() {
                    if ep.season_number == 0 || !ep.is_aired(now) || ep.user_data.played {
                        continue;
                    }
                    ep.user_data.played = true;
                    ep.user_data.last_played = Some(now);
                    ep.user_data.play_count += 1;
                    changed += 1;
                }
            }
            rebuild_from_episodes(record, now);
            guard.persist(&self.persistent);
        }

        info!("Marked {} episodes watched for series {}", changed, series_id);
        self.cascade_series_removals(series_id).await;
        Ok(changed)
    }

    /// Insert or update a watched movie. Duplicate library entries for the
    /// same movie collapse on the provider id.
    #[instrument(skip(self, movie), fields(movie_id = %movie.id))]
    pub async fn set_movie_watched(&self, movie: MovieHistoryEntry) -> Result<(), CacheError> {
        let movie_id = movie.id.clone();
        {
            let mut guard = self.history.write().await;
            if let Some(provider_id) = movie.provider_id.as_deref() {
                guard.remove_where(|other| {
                    other.id != movie.id && other.provider_id.as_deref() == Some(provider_id)
                });
            }
            guard.upsert_one(movie);
            guard.persist(&self.persistent);
        }

        self.remove_watchlist_entry(WatchlistCategory::Movies, &movie_id)
            .await;
        Ok(())
    }

    /// Remove a movie from history after it became unplayed. Watchlist
    /// membership is user-curated and deliberately untouched.
    #[instrument(skip(self))]
    pub async fn set_movie_unwatched(&self, movie_id: &str) -> Result<(), CacheError> {
        let mut guard = self.history.write().await;
        if guard.remove_one(movie_id).is_some() {
            guard.persist(&self.persistent);
        }
        Ok(())
    }

    /// Remove one entry from a watchlist category, persisting only when the
    /// canonical array actually changed.
    pub async fn remove_watchlist_entry(&self, category: WatchlistCategory, item_id: &str) -> bool {
        let store = self.watchlists.store(category);
        let mut guard = store.write().await;
        if guard.remove_one(item_id).is_some() {
            guard.persist(&self.persistent);
            debug!(
                "Removed {} from {} watchlist (now fully played)",
                item_id,
                category.as_str()
            );
            true
        } else {
            false
        }
    }

    /// Upward watched-state propagation: an episode transition can complete
    /// its season and series, and fully-played items never stay on a
    /// watchlist. Propagation only ever goes up, never down.
    async fn cascade_watchlist_removals(
        &self,
        series_id: &str,
        season_number: Option<u32>,
        episode_id: Option<&str>,
    ) {
        if let Some(episode_id) = episode_id {
            self.remove_watchlist_entry(WatchlistCategory::Episodes, episode_id)
                .await;
        }

        let (series_done, season_done) = {
            let guard = self.progress.read().await;
            match guard.get(series_id) {
                Some(record) => (
                    record.is_fully_watched(),
                    season_number
                        .map(|season| season_fully_watched(&record.binary_progress, season)),
                ),
                None => (false, None),
            }
        };

        if let (Some(true), Some(season)) = (season_done, season_number) {
            let store = self.watchlists.store(WatchlistCategory::Seasons);
            let mut guard = store.write().await;
            let removed = guard.remove_where(|entry| {
                entry.series_id.as_deref() == Some(series_id)
                    && entry.season_number == Some(season)
            });
            if removed > 0 {
                guard.persist(&self.persistent);
            }
        }

        if series_done {
            self.remove_watchlist_entry(WatchlistCategory::Series, series_id)
                .await;
        }
    }

    /// Watchlist cleanup after a whole series became watched.
    async fn cascade_series_removals(&self, series_id: &str) {
        for category in [WatchlistCategory::Seasons, WatchlistCategory::Episodes] {
            let store = self.watchlists.store(category);
            let mut guard = store.write().await;
            let removed = guard.remove_where(|entry| entry.series_id.as_deref() == Some(series_id));
            if removed > 0 {
                guard.persist(&self.persistent);
            }
        }
        self.remove_watchlist_entry(WatchlistCategory::Series, series_id)
            .await;
    }
}
