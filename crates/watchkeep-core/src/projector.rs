//! Pagination/sort/search projection over a canonical cache array.
//!
//! Projections are pure: the canonical array is never mutated and projecting
//! the same inputs twice yields identical pages.

use std::cmp::Ordering;
use tracing::debug;
use watchkeep_models::{MovieHistoryEntry, SeriesProgress, WatchlistEntry};

use crate::error::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Name,
    Progress,
    LastWatched,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// UI-session projection settings for one cache class. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionState {
    pub search_term: String,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub page_size: usize,
    /// Last page projected for this class; a page-0 request re-projects it.
    pub current_page: usize,
}

impl ProjectionState {
    pub fn new(page_size: usize, sort_key: SortKey, sort_direction: SortDirection) -> Self {
        Self {
            search_term: String::new(),
            sort_key,
            sort_direction,
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    pub fn set_search(&mut self, term: &str) {
        if self.search_term != term {
            self.search_term = term.to_string();
            // A changed filter can leave the current page beyond the new
            // page count; the projector clamps back to page 1 in that case.
        }
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.sort_key = key;
        self.sort_direction = direction;
    }
}

/// One derived page plus the metadata the rendering layer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection<T> {
    pub page: usize,
    pub page_items: Vec<T>,
    pub total_pages: usize,
    pub filtered_count: usize,
}

/// A record the projector can sort, filter, and paginate.
pub trait Projectable: Clone {
    /// Lowercased text the search term is matched against.
    fn haystack(&self) -> String;

    /// Total order for the given key, ascending.
    fn compare_key(&self, other: &Self, key: SortKey) -> Ordering;

    /// Fixed tie-break applied after the direction multiplier. Defaults to
    /// equal (stable sort order preserved).
    fn tie_break(&self, _other: &Self, _key: SortKey) -> Ordering {
        Ordering::Equal
    }
}

impl Projectable for SeriesProgress {
    fn haystack(&self) -> String {
        self.meta.name.to_lowercase()
    }

    fn compare_key(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => self
                .meta
                .name
                .to_lowercase()
                .cmp(&other.meta.name.to_lowercase()),
            SortKey::Progress => self.percentage.cmp(&other.percentage),
            SortKey::LastWatched => last_played_of(self).cmp(&last_played_of(other)),
            SortKey::Year => self.meta.year.cmp(&other.meta.year),
        }
    }

    fn tie_break(&self, other: &Self, key: SortKey) -> Ordering {
        // Equal progress sorts most-recently-watched first, regardless of
        // the outer direction: this is displayed order, not an internal
        // detail.
        if key == SortKey::Progress {
            last_played_of(other).cmp(&last_played_of(self))
        } else {
            Ordering::Equal
        }
    }
}

fn last_played_of(progress: &SeriesProgress) -> Option<chrono::DateTime<chrono::Utc>> {
    progress.last_watched.as_ref().and_then(|lw| lw.last_played)
}

impl Projectable for MovieHistoryEntry {
    fn haystack(&self) -> String {
        let year = self
            .year
            .map(|y| y.to_string())
            .unwrap_or_default();
        format!("{} {} {}", self.title, year, self.genres.join(" ")).to_lowercase()
    }

    fn compare_key(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => self.title.to_lowercase().cmp(&other.title.to_lowercase()),
            SortKey::LastWatched | SortKey::Progress => self
                .user_data
                .last_played
                .cmp(&other.user_data.last_played),
            SortKey::Year => self.year.cmp(&other.year),
        }
    }
}

impl Projectable for WatchlistEntry {
    fn haystack(&self) -> String {
        self.name.to_lowercase()
    }

    fn compare_key(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => self.name.to_lowercase().cmp(&other.name.to_lowercase()),
            SortKey::LastWatched | SortKey::Progress => self
                .user_data
                .last_played
                .cmp(&other.user_data.last_played),
            SortKey::Year => self.year.cmp(&other.year),
        }
    }
}

/// Derive the requested page from a canonical array and projection state.
///
/// A requested page beyond the filtered page count clamps to page 1 (a stale
/// projection is not an error the caller has to handle).
pub fn project<T: Projectable>(items: &[T], state: &ProjectionState, page: usize) -> Projection<T> {
    let term = state.search_term.trim().to_lowercase();

    let mut active: Vec<T> = if term.is_empty() {
        items.to_vec()
    } else {
        items
            .iter()
            .filter(|item| item.haystack().contains(&term))
            .cloned()
            .collect()
    };

    let key = state.sort_key;
    let direction = state.sort_direction;
    active.sort_by(|a, b| {
        let ordering = a.compare_key(b, key);
        let ordering = match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering == Ordering::Equal {
            a.tie_break(b, key)
        } else {
            ordering
        }
    });

    let filtered_count = active.len();
    let total_pages = filtered_count.div_ceil(state.page_size);
    let page = if page == 0 || filtered_count == 0 {
        1
    } else if page > total_pages {
        let stale = CacheError::StaleProjection {
            requested: page,
            available: total_pages,
        };
        debug!("{}; clamping to page 1", stale);
        1
    } else {
        page
    };

    let start = (page - 1) * state.page_size;
    let end = (start + state.page_size).min(filtered_count);
    let page_items = if start < filtered_count {
        active[start..end].to_vec()
    } else {
        Vec::new()
    };

    Projection {
        page,
        page_items,
        total_pages,
        filtered_count,
    }
}
