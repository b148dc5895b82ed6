// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log with an in-memory LRU cache.
//!
//! Events land in daily `events-YYYY-MM-DD.jsonl` files named by the
//! event's UTC date. Queries project over source, time window and
//! relation IDs with pagination; a bounded cache of the most recent
//! events is lazily populated on first query by scanning files
//! newest-first.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use pmo_core::{mask, mask_value, Event, EventSource};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Default bound on cached events.
const DEFAULT_CACHE_CAPACITY: usize = 1_000;

/// Errors from event store operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event store construction parameters.
#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    /// Directory holding the daily JSONL files.
    pub dir: PathBuf,
    /// Bound on the in-memory cache (most recent events).
    pub cache_capacity: usize,
}

impl EventStoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Result ordering for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    Ascending,
    #[default]
    Descending,
}

/// Projection over the event log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub source: Option<EventSource>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub task_id: Option<String>,
    pub session_id: Option<String>,
    pub executor_id: Option<String>,
    pub order: QueryOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl EventFilter {
    fn matches(&self, event: &Event) -> bool {
        if let Some(source) = self.source {
            if event.source != source {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        if let Some(task_id) = &self.task_id {
            if event.relations.task_id.as_deref() != Some(task_id.as_str()) {
                return false;
            }
        }
        if let Some(session_id) = &self.session_id {
            if event.relations.session_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        if let Some(executor_id) = &self.executor_id {
            if event.relations.executor_id.as_deref() != Some(executor_id.as_str()) {
                return false;
            }
        }
        true
    }
}

struct StoreInner {
    dir: PathBuf,
    append_lock: Mutex<()>,
    cache: Mutex<LruCache<String, Event>>,
    primed: AtomicBool,
}

/// Append-only event store. Cheap to clone; construct once at startup
/// and pass down by reference.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<StoreInner>,
}

impl EventStore {
    pub fn new(config: EventStoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(StoreInner {
                dir: config.dir,
                append_lock: Mutex::new(()),
                cache: Mutex::new(LruCache::new(capacity)),
                primed: AtomicBool::new(false),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Append an event durably. Content is masked before it reaches disk.
    pub fn record(&self, event: &Event) -> Result<(), EventStoreError> {
        let masked = masked_copy(event);
        let line = serde_json::to_string(&masked)?;
        let path = self.file_for(masked.timestamp);

        {
            let _guard = self.inner.append_lock.lock();
            std::fs::create_dir_all(&self.inner.dir)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }

        self.inner
            .cache
            .lock()
            .put(masked.id.as_str().to_string(), masked);
        Ok(())
    }

    /// Append an event off the caller's thread; used for non-critical
    /// events where the caller does not need the result.
    pub fn record_async(&self, event: Event) {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.record(&event) {
                warn!(error = %e, "async event append failed");
            }
        });
    }

    /// Query events matching `filter`, ordered and paginated.
    pub fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, EventStoreError> {
        self.prime_cache()?;

        let mut matched = if self.cache_covers(filter) {
            let cache = self.inner.cache.lock();
            cache
                .iter()
                .map(|(_, event)| event)
                .filter(|event| filter.matches(event))
                .cloned()
                .collect::<Vec<_>>()
        } else {
            self.scan_files(filter)?
        };

        matched.sort_by(|a, b| {
            (a.timestamp, a.id.as_str()).cmp(&(b.timestamp, b.id.as_str()))
        });
        if filter.order == QueryOrder::Descending {
            matched.reverse();
        }

        let page: Vec<Event> = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }

    fn file_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.inner
            .dir
            .join(format!("events-{}.jsonl", timestamp.format("%Y-%m-%d")))
    }

    /// Whether the cache window covers the filter's time bound.
    fn cache_covers(&self, filter: &EventFilter) -> bool {
        let cache = self.inner.cache.lock();
        if cache.is_empty() {
            return false;
        }
        // Cache holds the most recent events; the least-recently inserted
        // entry bounds the window.
        let oldest = cache
            .iter()
            .map(|(_, event)| event.timestamp)
            .min()
            .unwrap_or_default();
        match filter.since {
            Some(since) => since >= oldest,
            // Without a lower bound the scan must see all files, unless
            // the cache was able to hold everything.
            None => cache.len() < cache.cap().get(),
        }
    }

    /// Lazily populate the cache by scanning files newest-first.
    fn prime_cache(&self) -> Result<(), EventStoreError> {
        if self.inner.primed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let capacity = self.inner.cache.lock().cap().get();
        let mut recent: Vec<Event> = Vec::new();
        for path in self.event_files_newest_first()? {
            if recent.len() >= capacity {
                break;
            }
            recent.extend(read_events(&path)?);
        }
        // Insert in chronological order so eviction drops the oldest.
        recent.sort_by(|a, b| {
            (a.timestamp, a.id.as_str()).cmp(&(b.timestamp, b.id.as_str()))
        });
        let mut cache = self.inner.cache.lock();
        for event in recent {
            cache.put(event.id.as_str().to_string(), event);
        }
        Ok(())
    }

    fn scan_files(&self, filter: &EventFilter) -> Result<Vec<Event>, EventStoreError> {
        let mut matched = Vec::new();
        for path in self.event_files_newest_first()? {
            for event in read_events(&path)? {
                if filter.matches(&event) {
                    matched.push(event);
                }
            }
        }
        Ok(matched)
    }

    fn event_files_newest_first(&self) -> Result<Vec<PathBuf>, EventStoreError> {
        let mut files = Vec::new();
        let entries = match std::fs::read_dir(&self.inner.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if name.starts_with("events-") && name.ends_with(".jsonl") {
                files.push(path);
            }
        }
        // Daily file names sort chronologically.
        files.sort();
        files.reverse();
        Ok(files)
    }
}

fn masked_copy(event: &Event) -> Event {
    let mut masked = event.clone();
    masked.summary = mask(&event.summary);
    masked.data = mask_value(&event.data);
    masked
}

fn read_events(path: &Path) -> Result<Vec<Event>, EventStoreError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => {
                // A corrupt line never poisons the rest of the file.
                warn!(path = %path.display(), error = %e, "skipping corrupt event line");
            }
        }
    }
    Ok(events)
}

#[cfg(test)]
#[path = "event_store_tests.rs"]
mod tests;
