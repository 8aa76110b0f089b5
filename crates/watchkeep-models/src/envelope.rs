use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrapper written to the persistent tier around every cached array.
///
/// A read past `stored_at + ttl_seconds` is a miss, as is a read whose
/// `owner_key` does not match the requesting identity (shared storage must
/// never leak one user's caches to another).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEnvelope<T> {
    pub data: Vec<T>,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    pub owner_key: String,
}

impl<T> CacheEnvelope<T> {
    pub fn new(data: Vec<T>, ttl_seconds: i64, owner_key: String) -> Self {
        Self {
            data,
            stored_at: Utc::now(),
            ttl_seconds,
            owner_key,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.stored_at + chrono::Duration::seconds(self.ttl_seconds)
    }

    pub fn is_owned_by(&self, owner_key: &str) -> bool {
        self.owner_key == owner_key
    }
}
