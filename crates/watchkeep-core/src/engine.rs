//! Engine facade: owns the cache stores, projection settings, and render
//! guard state for one authenticated session, and exposes the page-oriented
//! API the rendering layer talks to.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, instrument, warn};
use watchkeep_config::CacheSettings;
use watchkeep_models::{
    MediaKind, MovieHistoryEntry, RawNotification, SeriesProgress, UserData, WatchlistCategory,
    WatchlistEntry,
};
use watchkeep_source::{CatalogSource, EnvelopeStore};

use crate::error::{CacheError, ErrorKind};
use crate::guard::{should_skip, RenderState};
use crate::invalidator::{episode_ref, history_entry, Invalidator};
use crate::progress::build_series_progress;
use crate::projector::{project, Projection, ProjectionState, SortDirection, SortKey};
use crate::reconcile::Reconciler;
use crate::store::{load_shared, shared, CacheClass, CacheStore, SharedStore, WatchlistStores};

/// Result of an optimistic toggle. The local cache may be updated even when
/// the remote write failed; `reason` carries the degradation when it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub applied: bool,
    pub reason: Option<ErrorKind>,
}

impl ToggleOutcome {
    fn clean() -> Self {
        Self {
            applied: true,
            reason: None,
        }
    }

    fn rejected(kind: ErrorKind) -> Self {
        Self {
            applied: false,
            reason: Some(kind),
        }
    }

    fn degraded(kind: ErrorKind) -> Self {
        Self {
            applied: true,
            reason: Some(kind),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.applied && self.reason.is_none()
    }
}

pub struct ProgressEngine {
    settings: CacheSettings,
    source: Arc<dyn CatalogSource>,
    persistent: EnvelopeStore,
    progress: SharedStore<SeriesProgress>,
    history: SharedStore<MovieHistoryEntry>,
    watchlists: WatchlistStores,
    reconciler: Reconciler,
    projections: RwLock<HashMap<CacheClass, ProjectionState>>,
    rendered: RwLock<HashMap<CacheClass, RenderState>>,
}

impl ProgressEngine {
    pub fn new(
        settings: CacheSettings,
        source: Arc<dyn CatalogSource>,
        persistent: EnvelopeStore,
    ) -> Self {
        let progress = shared(CacheStore::new(
            CacheClass::Progress,
            settings.page_size,
            settings.progress_ttl_seconds,
            settings.owner_key.clone(),
        ));
        let history = shared(CacheStore::new(
            CacheClass::MovieHistory,
            settings.page_size,
            settings.history_ttl_seconds,
            settings.owner_key.clone(),
        ));
        let watchlists = WatchlistStores::new(
            settings.page_size,
            settings.watchlist_ttl_seconds,
            &settings.owner_key,
        );
        let reconciler = Reconciler::new(
            progress.clone(),
            history.clone(),
            watchlists.clone(),
            source.clone(),
            persistent.clone(),
        );
        Self {
            settings,
            source,
            persistent,
            progress,
            history,
            watchlists,
            reconciler,
            projections: RwLock::new(HashMap::new()),
            rendered: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn persistent(&self) -> &EnvelopeStore {
        &self.persistent
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Spawn the invalidation loop for this session, returning the channel
    /// the transport layer feeds raw notifications into. The loop exits when
    /// the sender is dropped.
    pub fn spawn_invalidator(&self) -> (tokio::task::JoinHandle<()>, mpsc::Sender<RawNotification>) {
        let (tx, rx) = mpsc::channel(64);
        let invalidator = Invalidator::new(self.reconciler.clone(), self.source.clone());
        (tokio::spawn(invalidator.run(rx)), tx)
    }

    fn default_projection(&self, class: CacheClass) -> ProjectionState {
        let (key, direction) = match class {
            CacheClass::Progress => (SortKey::LastWatched, SortDirection::Descending),
            CacheClass::MovieHistory => (SortKey::LastWatched, SortDirection::Descending),
            CacheClass::Watchlist(_) => (SortKey::Name, SortDirection::Ascending),
        };
        ProjectionState::new(self.settings.page_size, key, direction)
    }

    async fn projection_state(&self, class: CacheClass) -> ProjectionState {
        let mut guard = self.projections.write().await;
        guard
            .entry(class)
            .or_insert_with(|| self.default_projection(class))
            .clone()
    }

    async fn remember_page(&self, class: CacheClass, page: usize) {
        let mut guard = self.projections.write().await;
        if let Some(state) = guard.get_mut(&class) {
            state.current_page = page;
        }
    }

    pub async fn set_search(&self, class: CacheClass, term: &str) {
        let mut guard = self.projections.write().await;
        guard
            .entry(class)
            .or_insert_with(|| self.default_projection(class))
            .set_search(term);
    }

    pub async fn set_sort(&self, class: CacheClass, key: SortKey, direction: SortDirection) {
        let mut guard = self.projections.write().await;
        guard
            .entry(class)
            .or_insert_with(|| self.default_projection(class))
            .set_sort(key, direction);
    }

    /// One page of series progress. A cold load fetches the full series list
    /// and per-series episodes, keeping only series with watch activity.
    /// Page 0 re-projects the last requested page (used by re-renders after a
    /// sort or data change).
    #[instrument(skip(self))]
    pub async fn get_progress_page(
        &self,
        page: usize,
        use_cache: bool,
    ) -> Result<Projection<SeriesProgress>, CacheError> {
        let source = self.source.clone();
        let items = load_shared(&self.progress, &self.persistent, use_cache, || async move {
            let summaries = source.fetch_series_list(None).await?;
            let now = Utc::now();
            let mut records = Vec::with_capacity(summaries.len());
            for summary in summaries {
                let episodes = source.fetch_episodes(&summary.series_id).await?;
                let record = build_series_progress(&summary, episodes, now);
                if record.watched_count > 0 {
                    records.push(record);
                }
            }
            Ok(records)
        })
        .await?;

        let state = self.projection_state(CacheClass::Progress).await;
        let page = if page == 0 { state.current_page } else { page };
        let projection = project(&items, &state, page);
        self.remember_page(CacheClass::Progress, projection.page).await;
        Ok(projection)
    }

    /// One page of watched-movie history.
    #[instrument(skip(self))]
    pub async fn get_history_page(
        &self,
        page: usize,
        use_cache: bool,
    ) -> Result<Projection<MovieHistoryEntry>, CacheError> {
        let source = self.source.clone();
        let items = load_shared(&self.history, &self.persistent, use_cache, || async move {
            source.fetch_watched_movies().await
        })
        .await?;

        let state = self.projection_state(CacheClass::MovieHistory).await;
        let page = if page == 0 { state.current_page } else { page };
        let projection = project(&items, &state, page);
        self.remember_page(CacheClass::MovieHistory, projection.page).await;
        Ok(projection)
    }

    /// One page of a watchlist category. Fully played entries are filtered
    /// out at load time; a watchlist only ever holds still-to-watch items.
    #[instrument(skip(self))]
    pub async fn get_watchlist_page(
        &self,
        category: WatchlistCategory,
        page: usize,
        use_cache: bool,
    ) -> Result<Projection<WatchlistEntry>, CacheError> {
        let source = self.source.clone();
        let store = self.watchlists.store(category);
        let items = load_shared(store, &self.persistent, use_cache, || async move {
            let entries = source.fetch_watchlist_items(category).await?;
            Ok(entries
                .into_iter()
                .filter(|entry| !entry.user_data.played)
                .collect())
        })
        .await?;

        let class = CacheClass::Watchlist(category);
        let state = self.projection_state(class).await;
        let page = if page == 0 { state.current_page } else { page };
        let projection = project(&items, &state, page);
        self.remember_page(class, projection.page).await;
        Ok(projection)
    }

    /// Whether a tab actually needs to re-render for the candidate state, per
    /// the render-skip heuristic.
    pub async fn should_render(&self, class: CacheClass, candidate: &RenderState) -> bool {
        match self.rendered.read().await.get(&class) {
            Some(previous) => !should_skip(previous, candidate),
            None => true,
        }
    }

    pub async fn mark_rendered(&self, class: CacheClass, state: RenderState) {
        self.rendered.write().await.insert(class, state);
    }

    /// Optimistic watched-state toggle. The cache mutates first; the remote
    /// write follows, and its failure degrades the outcome instead of rolling
    /// the cache back (the invalidator reconverges on the next notification
    /// or refresh).
    #[instrument(skip(self))]
    pub async fn toggle_watched(&self, item_id: &str, watched: bool) -> ToggleOutcome {
        let link = match self.source.lookup_item(item_id).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                warn!("Toggle target {} not found in catalog", item_id);
                return ToggleOutcome::rejected(ErrorKind::NotFound);
            }
            Err(e) => {
                warn!("Failed to resolve toggle target {}: {}", item_id, e);
                return ToggleOutcome::rejected(ErrorKind::Transport);
            }
        };

        let local = match link.kind {
            MediaKind::Episode => match link.series_id.as_deref() {
                Some(series_id) => {
                    let episode = episode_ref(&link);
                    self.reconciler
                        .set_episode_watched(series_id, episode.as_ref(), watched)
                        .await
                }
                None => Err(CacheError::NotFound(format!(
                    "episode {} has no series linkage",
                    item_id
                ))),
            },
            MediaKind::Movie => {
                if watched {
                    self.reconciler.set_movie_watched(history_entry(&link)).await
                } else {
                    self.reconciler.set_movie_unwatched(item_id).await
                }
            }
            MediaKind::Series => {
                if watched {
                    self.reconciler.mark_series_watched(item_id).await.map(|_| ())
                } else {
                    // Bulk unwatch is not a supported transition; nothing to
                    // mutate locally, push only the remote state.
                    Ok(())
                }
            }
            MediaKind::Season => Ok(()),
        };

        if let Err(e) = local {
            warn!("Local toggle for {} failed: {}", item_id, e);
            return ToggleOutcome::rejected(e.kind());
        }

        match self.source.set_played_state(item_id, watched).await {
            Ok(()) => ToggleOutcome::clean(),
            Err(e) => {
                warn!(
                    "Remote played-state write for {} failed after local apply: {}",
                    item_id, e
                );
                ToggleOutcome::degraded(ErrorKind::Transport)
            }
        }
    }

    /// Optimistic watchlist membership toggle, same degradation contract as
    /// `toggle_watched`.
    #[instrument(skip(self))]
    pub async fn toggle_watchlist(&self, item_id: &str, member: bool) -> ToggleOutcome {
        let link = match self.source.lookup_item(item_id).await {
            Ok(Some(link)) => link,
            Ok(None) => return ToggleOutcome::rejected(ErrorKind::NotFound),
            Err(e) => {
                warn!("Failed to resolve watchlist target {}: {}", item_id, e);
                return ToggleOutcome::rejected(ErrorKind::Transport);
            }
        };

        let category = WatchlistCategory::for_kind(link.kind);
        if member {
            let entry = WatchlistEntry {
                id: link.item_id.clone(),
                name: link.name.clone().unwrap_or_default(),
                kind: link.kind,
                year: link.year,
                series_id: link.series_id.clone(),
                season_number: link.season_number,
                user_data: UserData::default(),
            };
            let store = self.watchlists.store(category);
            let mut guard = store.write().await;
            guard.upsert_one(entry);
            guard.persist(&self.persistent);
        } else {
            self.reconciler.remove_watchlist_entry(category, item_id).await;
        }

        match self.source.set_watchlist_membership(item_id, member).await {
            Ok(()) => ToggleOutcome::clean(),
            Err(e) => {
                warn!(
                    "Remote watchlist write for {} failed after local apply: {}",
                    item_id, e
                );
                ToggleOutcome::degraded(ErrorKind::Transport)
            }
        }
    }

    /// Drop every cache tier for this session: canonical arrays, persisted
    /// envelopes, and render guard state.
    pub async fn clear_caches(&self) -> anyhow::Result<()> {
        self.progress.write().await.clear();
        self.history.write().await.clear();
        for category in WatchlistCategory::all() {
            self.watchlists.store(category).write().await.clear();
        }
        self.rendered.write().await.clear();
        self.persistent.clear_all()?;
        info!("All cache tiers cleared");
        Ok(())
    }

    /// Per-class in-memory counts, for inspection tooling.
    pub async fn class_counts(&self) -> Vec<(CacheClass, usize, bool)> {
        let mut counts = Vec::new();
        {
            let guard = self.progress.read().await;
            counts.push((CacheClass::Progress, guard.len(), guard.is_fully_loaded()));
        }
        {
            let guard = self.history.read().await;
            counts.push((CacheClass::MovieHistory, guard.len(), guard.is_fully_loaded()));
        }
        for category in WatchlistCategory::all() {
            let guard = self.watchlists.store(category).read().await;
            counts.push((
                CacheClass::Watchlist(category),
                guard.len(),
                guard.is_fully_loaded(),
            ));
        }
        counts
    }
}
