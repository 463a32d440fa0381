use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock second at which this process started. Events older than this
/// were queued before a restart and are never replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStart(u64);

impl ProcessStart {
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        )
    }

    pub fn at(unix_secs: u64) -> Self {
        Self(unix_secs)
    }

    pub fn unix_secs(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Duplicate,
    Stale,
}

/// Best-effort filter for retried and pre-restart events.
///
/// Ids are remembered for `window` after first sight. A duplicate that
/// arrives after that may slip through, but a first delivery is never
/// dropped.
pub struct Deduplicator {
    seen: DashMap<String, Instant>,
    window: Duration,
    started: ProcessStart,
}

impl Deduplicator {
    pub fn new(window: Duration, started: ProcessStart) -> Self {
        Self {
            seen: DashMap::new(),
            window,
            started,
        }
    }

    /// Decides whether an event should be handled.
    ///
    /// Events without an id cannot be deduplicated and are accepted; events
    /// without a timestamp skip the staleness check.
    pub fn admit(&self, event_id: Option<&str>, event_ts: Option<u64>) -> Admission {
        if let Some(ts) = event_ts {
            if ts < self.started.unix_secs() {
                return Admission::Stale;
            }
        }

        let Some(id) = event_id else {
            return Admission::Accepted;
        };

        let now = Instant::now();
        // The entry guard holds the shard lock, so check and insert are one step.
        match self.seen.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    Admission::Duplicate
                } else {
                    entry.insert(now);
                    Admission::Accepted
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Admission::Accepted
            }
        }
    }

    /// Drops ids older than the window. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.seen.len();
        let now = Instant::now();
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < self.window);
        before.saturating_sub(self.seen.len())
    }

    pub fn tracked(&self) -> usize {
        self.seen.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
