pub mod engine;
pub mod error;
pub mod guard;
pub mod invalidator;
pub mod poll;
pub mod progress;
pub mod projector;
pub mod reconcile;
pub mod store;

pub use engine::{ProgressEngine, ToggleOutcome};
pub use error::{CacheError, ErrorKind};
pub use guard::{should_skip, RenderState};
pub use invalidator::Invalidator;
pub use poll::PollTask;
pub use projector::{project, Projectable, Projection, ProjectionState, SortDirection, SortKey};
pub use reconcile::{EpisodeRef, Reconciler};
pub use store::{CacheClass, CacheRecord, CacheStore, SharedStore, WatchlistStores};

#[cfg(test)]
pub(crate) mod test_support;
