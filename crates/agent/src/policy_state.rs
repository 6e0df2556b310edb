//! State the agent keeps around policy decisions: drop/block counters, the
//! set of conversations already warned about missing mention metadata, and
//! per-session locks so concurrent turns on one conversation run one at a
//! time.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

/// Process-wide policy counters. Monotonic until restart.
#[derive(Debug, Default)]
pub struct PolicyCounters {
    dropped_by_access: AtomicU64,
    dropped_by_reply: AtomicU64,
    blocked_tool_call: AtomicU64,
}

/// A point-in-time copy of [`PolicyCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub dropped_by_access: u64,
    pub dropped_by_reply: u64,
    pub blocked_tool_call: u64,
}

impl PolicyCounters {
    pub fn record_access_drop(&self) {
        self.dropped_by_access.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reply_drop(&self) {
        self.dropped_by_reply.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked_tool(&self) {
        self.blocked_tool_call.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            dropped_by_access: self.dropped_by_access.load(Ordering::Relaxed),
            dropped_by_reply: self.dropped_by_reply.load(Ordering::Relaxed),
            blocked_tool_call: self.blocked_tool_call.load(Ordering::Relaxed),
        }
    }
}

/// Counters plus the missing-metadata warning set.
#[derive(Debug, Default)]
pub struct PolicyState {
    pub counters: PolicyCounters,
    warned_missing_metadata: Mutex<HashSet<String>>,
}

impl PolicyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time `(channel, chat_id)` is reported, `false` after.
    pub fn first_missing_metadata(&self, channel: &str, chat_id: &str) -> bool {
        self.warned_missing_metadata
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(format!("{channel}:{chat_id}"))
    }
}

/// One async mutex per session key. Entries nobody holds or waits on are
/// pruned on the next `lock` call.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // The map's own reference is the only one left once a key is idle.
            locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counters_accumulate() {
        let counters = PolicyCounters::default();
        counters.record_access_drop();
        counters.record_blocked_tool();
        counters.record_blocked_tool();
        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                dropped_by_access: 1,
                dropped_by_reply: 0,
                blocked_tool_call: 2,
            }
        );
    }

    #[test]
    fn missing_metadata_warns_once_per_chat() {
        let state = PolicyState::new();
        assert!(state.first_missing_metadata("whatsapp", "g1"));
        assert!(!state.first_missing_metadata("whatsapp", "g1"));
        assert!(state.first_missing_metadata("whatsapp", "g2"));
        assert!(state.first_missing_metadata("telegram", "g1"));
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.lock("cli:direct").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("cli:direct").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        let _other = locks.lock("telegram:1").await;
        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn idle_keys_are_pruned() {
        let locks = SessionLocks::new();
        for key in ["telegram:1", "telegram:2", "telegram:3"] {
            drop(locks.lock(key).await);
        }
        assert_eq!(locks.len(), 1);

        let held = locks.lock("cli:direct").await;
        let _next = locks.lock("telegram:4").await;
        assert_eq!(locks.len(), 2);
        drop(held);
    }
}
