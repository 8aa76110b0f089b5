//! Render-skip heuristic: decide cheaply whether a re-render would be a
//! no-op, so cache-layer re-runs on unrelated triggers do not drive redundant
//! DOM work.

use crate::projector::{SortDirection, SortKey};

/// Snapshot of what a tab last rendered (or is about to render).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderState {
    pub rendered: bool,
    pub page: usize,
    pub search_term: String,
    /// None for tabs without a sort control.
    pub sort: Option<(SortKey, SortDirection)>,
    pub item_count: usize,
}

impl RenderState {
    pub fn snapshot(
        page: usize,
        search_term: &str,
        sort: Option<(SortKey, SortDirection)>,
        item_count: usize,
    ) -> Self {
        Self {
            rendered: true,
            page,
            search_term: search_term.to_string(),
            sort,
            item_count,
        }
    }
}

/// A render is skippable iff content was rendered before and no tracked
/// dimension changed. Item count is compared instead of deep item equality;
/// this is an intentionally cheap heuristic.
pub fn should_skip(previous: &RenderState, candidate: &RenderState) -> bool {
    previous.rendered
        && previous.page == candidate.page
        && previous.search_term == candidate.search_term
        && previous.sort == candidate.sort
        && previous.item_count == candidate.item_count
}
