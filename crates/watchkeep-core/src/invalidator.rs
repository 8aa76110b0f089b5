//! Event-driven invalidation: apply watched-state changes that originate on
//! other clients or directly on the server.
//!
//! Raw transport payloads are duck-typed; they are validated and normalized
//! here before any mutation function sees them. Malformed or unresolvable
//! notifications are logged and dropped, never crash the pipeline, and every
//! applied mutation goes through the same upsert/re-derive paths as local
//! toggles, so replays and reordering cannot double-count anything.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use watchkeep_models::{
    ItemLink, MediaKind, MovieHistoryEntry, PlaybackEvent, PlaybackKind, RawNotification,
    UserData, WatchlistCategory,
};
use watchkeep_source::CatalogSource;

use crate::error::CacheError;
use crate::reconcile::{EpisodeRef, Reconciler};

/// Validate a raw transport payload into a tagged playback event.
pub fn normalize(raw: &RawNotification) -> Result<PlaybackEvent, CacheError> {
    let item_id = raw
        .item_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CacheError::MalformedNotification("missing item_id".to_string()))?;
    let played = raw
        .played
        .ok_or_else(|| CacheError::MalformedNotification("missing played flag".to_string()))?;

    Ok(PlaybackEvent {
        kind: if played {
            PlaybackKind::Watched
        } else {
            PlaybackKind::Unwatched
        },
        item_id: item_id.to_string(),
        watchlisted: raw.watchlisted.unwrap_or(false),
    })
}

pub struct Invalidator {
    reconciler: Reconciler,
    source: Arc<dyn CatalogSource>,
    links: RwLock<HashMap<String, ItemLink>>,
}

impl Invalidator {
    pub fn new(reconciler: Reconciler, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            reconciler,
            source,
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Consume notifications until the channel closes. Failures are handled
    /// here; nothing propagates out of the loop.
    pub async fn run(self, mut receiver: mpsc::Receiver<RawNotification>) {
        info!("Invalidator listening for playback notifications");
        while let Some(raw) = receiver.recv().await {
            if let Err(e) = self.apply(raw).await {
                match e {
                    CacheError::MalformedNotification(_) | CacheError::NotFound(_) => {
                        debug!("Dropped notification: {}", e);
                    }
                    other => warn!("Failed to apply notification: {}", other),
                }
            }
        }
        info!("Notification channel closed, invalidator stopping");
    }

    /// Resolve what a notification's item id refers to, memoizing the result
    /// so repeated notifications for the same item skip the catalog.
    async fn resolve_link(&self, item_id: &str) -> Result<ItemLink, CacheError> {
        if let Some(link) = self.links.read().await.get(item_id) {
            return Ok(link.clone());
        }

        let link = self
            .source
            .lookup_item(item_id)
            .await?
            .ok_or_else(|| CacheError::NotFound(item_id.to_string()))?;
        self.links
            .write()
            .await
            .insert(item_id.to_string(), link.clone());
        Ok(link)
    }

    /// Apply one notification to the cache.
    pub async fn apply(&self, raw: RawNotification) -> Result<(), CacheError> {
        let event = normalize(&raw)?;
        let link = self.resolve_link(&event.item_id).await?;

        debug!(
            "Applying {:?} notification for {} ({:?})",
            event.kind, event.item_id, link.kind
        );

        match event.kind {
            PlaybackKind::Watched => self.apply_watched(&event, &link).await,
            PlaybackKind::Unwatched => self.apply_unwatched(&link).await,
        }
    }

    async fn apply_watched(&self, event: &PlaybackEvent, link: &ItemLink) -> Result<(), CacheError> {
        if event.watchlisted {
            self.reconciler
                .remove_watchlist_entry(WatchlistCategory::for_kind(link.kind), &link.item_id)
                .await;
        }

        match link.kind {
            MediaKind::Episode => {
                let series_id = link.series_id.as_deref().ok_or_else(|| {
                    CacheError::MalformedNotification(format!(
                        "episode {} has no series linkage",
                        link.item_id
                    ))
                })?;
                let episode = episode_ref(link);
                // The reconciler re-checks season/series completion and
                // cascades the watchlist removals upward.
                self.reconciler
                    .set_episode_watched(series_id, episode.as_ref(), true)
                    .await
            }
            MediaKind::Movie => {
                self.reconciler
                    .set_movie_watched(history_entry(link))
                    .await
            }
            MediaKind::Series | MediaKind::Season => {
                // Container-level played notifications carry no episode
                // detail; the watchlist removal above is all that applies.
                Ok(())
            }
        }
    }

    async fn apply_unwatched(&self, link: &ItemLink) -> Result<(), CacheError> {
        match link.kind {
            MediaKind::Episode => {
                let series_id = link.series_id.as_deref().ok_or_else(|| {
                    CacheError::MalformedNotification(format!(
                        "episode {} has no series linkage",
                        link.item_id
                    ))
                })?;
                let episode = episode_ref(link);
                self.reconciler
                    .set_episode_watched(series_id, episode.as_ref(), false)
                    .await
            }
            MediaKind::Movie => self.reconciler.set_movie_unwatched(&link.item_id).await,
            MediaKind::Series | MediaKind::Season => Ok(()),
        }
    }
}

pub(crate) fn episode_ref(link: &ItemLink) -> Option<EpisodeRef> {
    match (link.season_number, link.index_number) {
        (Some(season_number), Some(index_number)) => Some(EpisodeRef {
            id: link.item_id.clone(),
            season_number,
            index_number,
        }),
        _ => None,
    }
}

pub(crate) fn history_entry(link: &ItemLink) -> MovieHistoryEntry {
    MovieHistoryEntry {
        id: link.item_id.clone(),
        title: link.name.clone().unwrap_or_default(),
        year: link.year,
        genres: Vec::new(),
        provider_id: link.provider_id.clone(),
        user_data: UserData::played_at(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{shared, CacheClass, CacheStore, SharedStore, WatchlistStores};
    use crate::test_support::{
        episode, episode_link, movie_link, watchlist_entry, FakeCatalog,
    };
    use std::sync::atomic::Ordering;
    use watchkeep_models::SeriesProgress;
    use watchkeep_source::EnvelopeStore;

    struct Fixture {
        invalidator: Invalidator,
        catalog: Arc<FakeCatalog>,
        progress: SharedStore<SeriesProgress>,
        history: SharedStore<MovieHistoryEntry>,
        watchlists: WatchlistStores,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let persistent = EnvelopeStore::new(dir.path()).unwrap();
        let catalog = Arc::new(FakeCatalog::new());
        let progress = shared(CacheStore::new(
            CacheClass::Progress,
            24,
            3600,
            "user1".to_string(),
        ));
        let history = shared(CacheStore::new(
            CacheClass::MovieHistory,
            24,
            3600,
            "user1".to_string(),
        ));
        let watchlists = WatchlistStores::new(24, 3600, "user1");
        let reconciler = Reconciler::new(
            progress.clone(),
            history.clone(),
            watchlists.clone(),
            catalog.clone(),
            persistent,
        );
        let invalidator = Invalidator::new(reconciler, catalog.clone());
        Fixture {
            invalidator,
            catalog,
            progress,
            history,
            watchlists,
            _dir: dir,
        }
    }

    fn notification(item_id: &str, played: bool, watchlisted: bool) -> RawNotification {
        RawNotification {
            item_id: Some(item_id.to_string()),
            played: Some(played),
            watchlisted: Some(watchlisted),
        }
    }

    #[test]
    fn test_normalize_requires_item_id() {
        let raw = RawNotification {
            item_id: None,
            played: Some(true),
            watchlisted: None,
        };
        assert!(matches!(
            normalize(&raw),
            Err(CacheError::MalformedNotification(_))
        ));

        let raw = RawNotification {
            item_id: Some(String::new()),
            played: Some(true),
            watchlisted: None,
        };
        assert!(matches!(
            normalize(&raw),
            Err(CacheError::MalformedNotification(_))
        ));
    }

    #[test]
    fn test_normalize_requires_played_flag() {
        let raw = RawNotification {
            item_id: Some("x".to_string()),
            played: None,
            watchlisted: Some(true),
        };
        assert!(matches!(
            normalize(&raw),
            Err(CacheError::MalformedNotification(_))
        ));
    }

    #[test]
    fn test_normalize_tags_kind() {
        let event = normalize(&notification("x", true, false)).unwrap();
        assert_eq!(event.kind, PlaybackKind::Watched);
        let event = normalize(&notification("x", false, true)).unwrap();
        assert_eq!(event.kind, PlaybackKind::Unwatched);
        assert!(event.watchlisted);
    }

    #[tokio::test]
    async fn test_unresolvable_item_is_dropped_without_mutation() {
        let fx = fixture();
        let result = fx.invalidator.apply(notification("ghost", true, false)).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
        assert!(fx.history.read().await.is_empty());
        assert!(fx.progress.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_link_resolution_is_memoized() {
        let fx = fixture();
        fx.catalog
            .add_series("s1", "Series", vec![episode("e1", 1, 1, false)]);
        fx.catalog.add_link(episode_link("e1", "s1", 1, 1));

        fx.invalidator
            .apply(notification("e1", true, false))
            .await
            .unwrap();
        fx.invalidator
            .apply(notification("e1", false, false))
            .await
            .unwrap();

        assert_eq!(fx.catalog.lookup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_movie_notification_upserts_history() {
        let fx = fixture();
        fx.catalog.add_link(movie_link("m1", "The Movie", Some("tt1")));

        fx.invalidator
            .apply(notification("m1", true, false))
            .await
            .unwrap();
        // Replay must not duplicate the entry
        fx.invalidator
            .apply(notification("m1", true, false))
            .await
            .unwrap();

        let guard = fx.history.read().await;
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.items()[0].title, "The Movie");

        drop(guard);
        fx.invalidator
            .apply(notification("m1", false, false))
            .await
            .unwrap();
        assert!(fx.history.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_watched_episode_end_to_end_with_watchlist_cascade() {
        let fx = fixture();
        // 9 of 10 episodes watched; e10 arrives from another device
        let mut episodes: Vec<_> = (1..=9).map(|i| episode(&format!("e{}", i), 1, i, true)).collect();
        episodes.push(episode("e10", 1, 10, false));
        fx.catalog.add_series("s1", "Nearly Done", episodes);
        fx.catalog.add_link(episode_link("e10", "s1", 1, 10));
        fx.watchlists
            .store(WatchlistCategory::Series)
            .write()
            .await
            .upsert_one(watchlist_entry(
                "s1",
                "Nearly Done",
                MediaKind::Series,
                None,
                None,
            ));
        fx.watchlists
            .store(WatchlistCategory::Episodes)
            .write()
            .await
            .upsert_one(watchlist_entry(
                "e10",
                "Episode 10",
                MediaKind::Episode,
                Some("s1"),
                Some(1),
            ));

        fx.invalidator
            .apply(notification("e10", true, true))
            .await
            .unwrap();

        let guard = fx.progress.read().await;
        let record = guard.get("s1").unwrap();
        assert_eq!(record.watched_count, 10);
        assert_eq!(record.percentage, 100);
        drop(guard);

        assert!(fx
            .watchlists
            .store(WatchlistCategory::Series)
            .read()
            .await
            .is_empty());
        assert!(fx
            .watchlists
            .store(WatchlistCategory::Episodes)
            .read()
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_double_apply_is_idempotent() {
        let fx = fixture();
        fx.catalog.add_series(
            "s1",
            "Series",
            vec![episode("e1", 1, 1, false), episode("e2", 1, 2, false)],
        );
        fx.catalog.add_link(episode_link("e1", "s1", 1, 1));

        let raw = notification("e1", true, false);
        fx.invalidator.apply(raw.clone()).await.unwrap();
        fx.invalidator.apply(raw).await.unwrap();

        assert_eq!(fx.progress.read().await.get("s1").unwrap().watched_count, 1);
    }

    #[tokio::test]
    async fn test_unwatch_notification_leaves_watchlist_alone() {
        let fx = fixture();
        fx.catalog
            .add_series("s1", "Series", vec![episode("e1", 1, 1, true)]);
        fx.catalog.add_link(episode_link("e1", "s1", 1, 1));
        fx.watchlists
            .store(WatchlistCategory::Series)
            .write()
            .await
            .upsert_one(watchlist_entry("s1", "Series", MediaKind::Series, None, None));

        fx.invalidator
            .apply(notification("e1", false, true))
            .await
            .unwrap();

        assert_eq!(
            fx.watchlists
                .store(WatchlistCategory::Series)
                .read()
                .await
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_survives_bad_notifications() {
        let fx = fixture();
        fx.catalog.add_link(movie_link("m1", "Movie", None));
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(fx.invalidator.run(rx));
        tx.send(RawNotification {
            item_id: None,
            played: Some(true),
            watchlisted: None,
        })
        .await
        .unwrap();
        tx.send(notification("ghost", true, false)).await.unwrap();
        tx.send(notification("m1", true, false)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(fx.history.read().await.len(), 1);
    }
}
