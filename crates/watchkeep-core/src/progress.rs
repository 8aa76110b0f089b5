//! Binary progress codec: per-season watched state as compact bitstrings.
//!
//! Each aired episode slot maps to one character ('1' watched, '0' not) so a
//! series' full progress survives in the persistent tier without carrying
//! episode records. Multi-part episodes expand into one slot per covered
//! index, all inheriting the parent record's watched flag.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;
use watchkeep_models::{Episode, LastWatchedEpisode, SeriesMeta, SeriesProgress, SeriesSummary};

/// Season number reserved for specials, excluded from all progress accounting.
const SPECIALS_SEASON: u32 = 0;

/// One logical episode slot after multi-part expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub season_number: u32,
    pub index: u32,
    pub watched: bool,
}

/// Expand aired episodes into logical slots. Unaired episodes and specials
/// (season 0) never produce slots.
pub fn expand_slots(episodes: &[Episode], now: DateTime<Utc>) -> Vec<Slot> {
    let mut slots = Vec::new();
    for episode in episodes {
        if episode.season_number == SPECIALS_SEASON || !episode.is_aired(now) {
            continue;
        }
        let end = episode.index_number + episode.slot_count() - 1;
        for index in episode.index_number..=end {
            slots.push(Slot {
                season_number: episode.season_number,
                index,
                watched: episode.user_data.played,
            });
        }
    }
    slots
}

/// Encode episodes into `season -> bitstring`, one character per aired slot,
/// ordered by expanded index within each season.
pub fn encode(episodes: &[Episode], now: DateTime<Utc>) -> BTreeMap<u32, String> {
    let mut by_season: BTreeMap<u32, Vec<Slot>> = BTreeMap::new();
    for slot in expand_slots(episodes, now) {
        by_season.entry(slot.season_number).or_default().push(slot);
    }

    let mut encoded = BTreeMap::new();
    for (season, mut slots) in by_season {
        slots.sort_by_key(|s| s.index);
        let bits: String = slots
            .iter()
            .map(|s| if s.watched { '1' } else { '0' })
            .collect();
        encoded.insert(season, bits);
    }
    encoded
}

/// Flip a single slot's bit in place. Returns false when the season or slot
/// is unknown, leaving the map untouched.
pub fn flip(
    binary_progress: &mut BTreeMap<u32, String>,
    season: u32,
    slot_index: usize,
    watched: bool,
) -> bool {
    let Some(bits) = binary_progress.get_mut(&season) else {
        debug!("flip: season {} not present in binary progress", season);
        return false;
    };
    if slot_index >= bits.len() {
        debug!(
            "flip: slot {} out of range for season {} ({} slots)",
            slot_index,
            season,
            bits.len()
        );
        return false;
    }
    let ch = if watched { "1" } else { "0" };
    bits.replace_range(slot_index..slot_index + 1, ch);
    true
}

/// Count watched and total bits across all seasons.
pub fn count_bits(binary_progress: &BTreeMap<u32, String>) -> (u32, u32) {
    let mut watched = 0;
    let mut total = 0;
    for bits in binary_progress.values() {
        total += bits.len() as u32;
        watched += bits.chars().filter(|c| *c == '1').count() as u32;
    }
    (watched, total)
}

/// Whether every slot of the given season is watched. Absent seasons count
/// as not fully watched.
pub fn season_fully_watched(binary_progress: &BTreeMap<u32, String>, season: u32) -> bool {
    binary_progress
        .get(&season)
        .map(|bits| !bits.is_empty() && bits.chars().all(|c| c == '1'))
        .unwrap_or(false)
}

/// Re-derive every aggregate on a `SeriesProgress` from its in-memory episode
/// detail. Returns false (no change) when detail is absent; callers then fall
/// back to direct bit manipulation.
pub fn rebuild_from_episodes(progress: &mut SeriesProgress, now: DateTime<Utc>) -> bool {
    let Some(episodes) = progress.episodes.as_ref() else {
        return false;
    };

    let slots = expand_slots(episodes, now);
    let watched = slots.iter().filter(|s| s.watched).count() as u32;
    let total = slots.len() as u32;

    progress.binary_progress = encode(episodes, now);
    progress.last_watched = last_watched_projection(episodes, now);
    progress.set_counts(watched, total);
    true
}

/// The most recently played watched episode, projected down to the summary
/// fields the persistent tier keeps.
fn last_watched_projection(
    episodes: &[Episode],
    now: DateTime<Utc>,
) -> Option<LastWatchedEpisode> {
    episodes
        .iter()
        .filter(|e| e.user_data.played && e.season_number != SPECIALS_SEASON && e.is_aired(now))
        .max_by_key(|e| e.user_data.last_played)
        .map(|e| LastWatchedEpisode {
            id: e.id.clone(),
            title: e.title.clone(),
            season_number: e.season_number,
            index_number: e.index_number,
            last_played: e.user_data.last_played,
        })
}

/// Build a fresh `SeriesProgress` from a catalog listing plus its episodes,
/// retaining the episode detail in memory.
pub fn build_series_progress(
    summary: &SeriesSummary,
    episodes: Vec<Episode>,
    now: DateTime<Utc>,
) -> SeriesProgress {
    let mut progress = SeriesProgress::new(summary.series_id.clone(), summary.meta.clone());
    progress.episodes = Some(episodes);
    rebuild_from_episodes(&mut progress, now);
    progress
}
