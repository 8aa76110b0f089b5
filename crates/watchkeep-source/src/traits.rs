use async_trait::async_trait;
use watchkeep_models::{
    Episode, ItemLink, MovieHistoryEntry, SeriesSummary, WatchlistCategory, WatchlistEntry,
};

use crate::error::SourceError;

/// Contract for the remote source of truth (the media server's query
/// surface). The cache engine only ever talks to the catalog through this
/// trait; a failed call leaves the cache in its last-known-good state.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List series the user has playback state for. `ids` narrows the listing
    /// to specific series (used for lazy backfill of a single series).
    async fn fetch_series_list(&self, ids: Option<&[String]>)
        -> Result<Vec<SeriesSummary>, SourceError>;

    async fn fetch_episodes(&self, series_id: &str) -> Result<Vec<Episode>, SourceError>;

    async fn fetch_watched_movies(&self) -> Result<Vec<MovieHistoryEntry>, SourceError>;

    async fn fetch_watchlist_items(
        &self,
        category: WatchlistCategory,
    ) -> Result<Vec<WatchlistEntry>, SourceError>;

    /// Resolve an arbitrary item id into its kind and parent linkage.
    async fn lookup_item(&self, item_id: &str) -> Result<Option<ItemLink>, SourceError>;

    async fn set_played_state(&self, item_id: &str, played: bool) -> Result<(), SourceError>;

    async fn set_watchlist_membership(
        &self,
        item_id: &str,
        member: bool,
    ) -> Result<(), SourceError>;
}
