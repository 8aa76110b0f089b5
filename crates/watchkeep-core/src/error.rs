use thiserror::Error;
use watchkeep_source::SourceError;

/// Engine-internal error taxonomy. All variants are handled locally within
/// the component that detects them; callers across the cache/projection
/// boundary only ever see valid data or an explicit "unchanged" signal.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("transport failure: {0}")]
    Transport(#[from] SourceError),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("requested page {requested} exceeds {available} available pages")]
    StaleProjection { requested: usize, available: usize },

    #[error("malformed notification: {0}")]
    MalformedNotification(String),
}

/// Coarse error classification surfaced in optimistic toggle outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    NotFound,
    StaleProjection,
    MalformedNotification,
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Transport(_) => ErrorKind::Transport,
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::StaleProjection { .. } => ErrorKind::StaleProjection,
            CacheError::MalformedNotification(_) => ErrorKind::MalformedNotification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            CacheError::Transport(SourceError::new("reset".to_string())).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            CacheError::NotFound("e1".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CacheError::StaleProjection {
                requested: 9,
                available: 2
            }
            .kind(),
            ErrorKind::StaleProjection
        );
        assert_eq!(
            CacheError::MalformedNotification("missing item_id".to_string()).kind(),
            ErrorKind::MalformedNotification
        );
    }

    #[test]
    fn test_stale_projection_display_names_both_pages() {
        let err = CacheError::StaleProjection {
            requested: 5,
            available: 2,
        };
        assert_eq!(err.to_string(), "requested page 5 exceeds 2 available pages");
    }
}
