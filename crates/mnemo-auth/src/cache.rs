//! Token lookup cache.
//!
//! Bounds the staleness window to 60 seconds while keeping in-process
//! mutations (revoke, enable, delete) visible immediately through explicit
//! invalidation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::store::AuthToken;

/// Maximum age of a cached token row.
pub const CACHE_TTL: Duration = Duration::from_secs(60);

/// TTL cache over token rows, keyed by token string.
#[derive(Default)]
pub struct ValidationCache {
    entries: Mutex<HashMap<String, (AuthToken, Instant)>>,
}

impl ValidationCache {
    /// Fetch a cached row if present and fresh.
    pub fn get(&self, token: &str) -> Option<AuthToken> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(token) {
            Some((record, inserted)) if inserted.elapsed() < CACHE_TTL => Some(record.clone()),
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    /// Cache a token row.
    pub fn put(&self, record: AuthToken) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(record.token.clone(), (record, Instant::now()));
        }
    }

    /// Drop a cached row. Called on every mutation of the token.
    pub fn invalidate(&self, token: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn token(name: &str) -> AuthToken {
        AuthToken {
            token: name.to_string(),
            user_id: "alice".to_string(),
            display_name: None,
            email: None,
            enabled: true,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            permissions: Vec::new(),
        }
    }

    #[test]
    fn test_put_get_invalidate() {
        let cache = ValidationCache::default();
        assert!(cache.get("t1").is_none());

        cache.put(token("t1"));
        assert!(cache.get("t1").is_some());

        cache.invalidate("t1");
        assert!(cache.get("t1").is_none());
    }
}
