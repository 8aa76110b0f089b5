pub mod envelope;
pub mod episode;
pub mod event;
pub mod history;
pub mod media;
pub mod progress;
pub mod user_data;
pub mod watchlist;

pub use envelope::CacheEnvelope;
pub use episode::Episode;
pub use event::{ItemLink, PlaybackEvent, PlaybackKind, RawNotification};
pub use history::MovieHistoryEntry;
pub use media::{MediaKind, SeriesMeta, SeriesSummary};
pub use progress::{LastWatchedEpisode, SeriesProgress};
pub use user_data::UserData;
pub use watchlist::{WatchlistCategory, WatchlistEntry};
