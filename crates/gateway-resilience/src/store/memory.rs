//! In-process store backend.

use super::{KeyValueStore, ScoreBound, StoreError, StoreResult, WindowAdmission, WindowOutcome};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Sorted(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Absolute expiry measured on the store clock
    expires_at: Option<Duration>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Duration) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with TTL and sorted-set support.
///
/// Time comes from the injected [`Clock`], so tests can expire entries by
/// advancing a [`crate::clock::ManualClock`]. [`MemoryStore::set_available`]
/// simulates an outage: while unavailable every call fails.
/// [`MemoryStore::set_latency`] simulates a stalled server; with an
/// operation timeout set, a call slower than the bound fails with
/// [`StoreError::Timeout`] the way a Redis call does.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    latency: Mutex<Duration>,
    operation_timeout: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store on the given clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            operation_timeout: None,
        }
    }

    /// Bound every call, like `RedisStore`'s per-operation timeout
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Toggle simulated availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency` (runtime time, not the store clock)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Remaining TTL of a live key, `None` if the key is absent or persistent
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_sub(now))
    }

    /// Number of live keys
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether no live keys remain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key
    pub fn flush(&self) {
        self.entries.lock().clear();
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ))
        }
    }

    /// Wait out the simulated latency within the operation timeout
    async fn stall(&self) -> StoreResult<()> {
        let latency = *self.latency.lock();
        if latency.is_zero() {
            return Ok(());
        }
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, tokio::time::sleep(latency))
                .await
                .map_err(|_| StoreError::Timeout(limit)),
            None => {
                tokio::time::sleep(latency).await;
                Ok(())
            }
        }
    }

    /// Run `f` on the live entry map after dropping expired keys
    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, Duration) -> T) -> StoreResult<T> {
        self.ensure_available()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(f(&mut entries, now))
    }
}

fn sorted_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<Option<&'a mut HashMap<String, f64>>> {
    match entries.get_mut(key) {
        None => Ok(None),
        Some(Entry {
            value: Value::Sorted(members),
            ..
        }) => Ok(Some(members)),
        Some(_) => Err(StoreError::WrongType {
            key: key.to_string(),
        }),
    }
}

fn remove_by_score(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    min: ScoreBound,
    max: ScoreBound,
) -> StoreResult<u64> {
    let Some(members) = sorted_mut(entries, key)? else {
        return Ok(0);
    };
    let before = members.len();
    members.retain(|_, score| !(min.admits_from_below(*score) && max.admits_from_above(*score)));
    let removed = (before - members.len()) as u64;
    if members.is_empty() {
        entries.remove(key);
    }
    Ok(removed)
}

fn cardinality(entries: &mut HashMap<String, Entry>, key: &str) -> StoreResult<u64> {
    Ok(sorted_mut(entries, key)?.map_or(0, |members| members.len() as u64))
}

fn add_member(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    member: &str,
    score: f64,
) -> StoreResult<()> {
    let entry = entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::new(Value::Sorted(HashMap::new())));
    match &mut entry.value {
        Value::Sorted(members) => {
            members.insert(member.to_string(), score);
            Ok(())
        }
        Value::Text(_) => Err(StoreError::WrongType {
            key: key.to_string(),
        }),
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.stall().await?;
        self.with_entries(|entries, _| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
            }),
        })?
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.stall().await?;
        self.with_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Text(value.to_string()),
                    expires_at: ttl.map(|ttl| now + ttl),
                },
            );
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.stall().await?;
        self.with_entries(|entries, _| entries.remove(key).is_some())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.stall().await?;
        self.with_entries(|entries, _| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Value::Text("0".to_string())));
            let Value::Text(text) = &mut entry.value else {
                return Err(StoreError::WrongType {
                    key: key.to_string(),
                });
            };
            let current: i64 = text.parse().map_err(|_| StoreError::WrongType {
                key: key.to_string(),
            })?;
            let next = current + 1;
            *text = next.to_string();
            Ok(next)
        })?
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.stall().await?;
        self.with_entries(|entries, now| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                true
            }
            None => false,
        })
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.stall().await?;
        self.with_entries(|entries, _| add_member(entries, key, member, score))?
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> StoreResult<u64> {
        self.stall().await?;
        self.with_entries(|entries, _| remove_by_score(entries, key, min, max))?
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        self.stall().await?;
        self.with_entries(|entries, _| cardinality(entries, key))?
    }

    async fn ping(&self) -> StoreResult<()> {
        self.stall().await?;
        self.ensure_available()
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }

    async fn sliding_window_admit(
        &self,
        admission: &WindowAdmission<'_>,
    ) -> StoreResult<WindowOutcome> {
        self.stall().await?;
        // Single critical section: purge, count and insert cannot interleave.
        self.with_entries(|entries, now| {
            remove_by_score(
                entries,
                admission.key,
                ScoreBound::NegInfinity,
                ScoreBound::Exclusive(admission.window_start()),
            )?;

            let count = cardinality(entries, admission.key)?;
            if count >= u64::from(admission.max_requests) {
                return Ok(WindowOutcome {
                    admitted: false,
                    count,
                });
            }

            add_member(entries, admission.key, admission.member, admission.now)?;
            if let Some(entry) = entries.get_mut(admission.key) {
                entry.expires_at = Some(now + admission.ttl());
            }

            Ok(WindowOutcome {
                admitted: true,
                count: count + 1,
            })
        })?
    }
}
