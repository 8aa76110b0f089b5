use serde::{Deserialize, Serialize};

use crate::media::MediaKind;

/// Raw payload as delivered by the real-time transport. Fields are optional
/// because the channel is duck-typed; validation happens at the invalidator
/// boundary before any mutation function sees the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played: Option<bool>,
    /// Whether the item is on one of the user's watchlists, as reported by
    /// the transport ("likes" on the wire).
    #[serde(default, alias = "likes", skip_serializing_if = "Option::is_none")]
    pub watchlisted: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackKind {
    Watched,
    Unwatched,
}

/// Normalized watched-state change, produced from a `RawNotification` once
/// validated and resolved against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    pub kind: PlaybackKind,
    pub item_id: String,
    pub watchlisted: bool,
}

/// Resolved linkage for a notification target: what the item is and, for
/// episodes, which series and season own it. Memoized by item id so repeated
/// notifications for the same item do not re-query the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemLink {
    pub item_id: String,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}
