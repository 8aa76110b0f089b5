use std::error::Error;
use std::fmt;

/// Transport-level failure from a remote collaborator. The cache layer treats
/// any such failure as "no change", never as an implicit removal. The
/// underlying cause (HTTP error, socket error) is kept on the chain so logs
/// can surface it without the cache layer matching on transport details.
#[derive(Debug)]
pub struct SourceError {
    message: String,
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl SourceError {
    pub fn new(message: String) -> Self {
        Self {
            message,
            cause: None,
        }
    }

    /// Wrap an underlying transport error with a higher-level message.
    pub fn with_cause(message: String, cause: impl Error + Send + Sync + 'static) -> Self {
        Self {
            message,
            cause: Some(Box::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_is_preserved_on_the_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = SourceError::with_cause("failed to fetch series list".to_string(), io);

        assert_eq!(err.to_string(), "failed to fetch series list");
        assert_eq!(err.source().unwrap().to_string(), "reset by peer");
    }

    #[test]
    fn test_plain_error_has_no_source() {
        let err = SourceError::new("timed out".to_string());
        assert!(err.source().is_none());
    }
}
