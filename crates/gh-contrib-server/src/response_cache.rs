//! Response-level TTL cache
//!
//! Keyed by organization and pagination parameters; stores the finished
//! JSON body together with the organization's last-changed timestamp so
//! cache hits still carry a correct `Last-Modified` header.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

const MAX_ENTRIES: usize = 10_000;

struct StoredResponse {
    body: Value,
    last_changed: Option<DateTime<Utc>>,
    stored_at: Instant,
}

pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<String, StoredResponse>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn key(org: &str, per_page: usize, page: usize) -> String {
        format!("{org}&per_page={per_page}&page={page}")
    }

    pub fn get(&mut self, key: &str) -> Option<(Value, Option<DateTime<Utc>>)> {
        let hit = self.entries.get(key)?;
        if hit.stored_at.elapsed() > self.ttl {
            self.entries.remove(key);
            return None;
        }
        let hit = self.entries.get(key)?;
        Some((hit.body.clone(), hit.last_changed))
    }

    pub fn store(&mut self, key: String, body: Value, last_changed: Option<DateTime<Utc>>) {
        if self.entries.len() >= MAX_ENTRIES {
            let ttl = self.ttl;
            self.entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
        }
        if self.entries.len() >= MAX_ENTRIES {
            return;
        }
        self.entries.insert(
            key,
            StoredResponse {
                body,
                last_changed,
                stored_at: Instant::now(),
            },
        );
    }
}
