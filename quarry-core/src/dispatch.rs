use crate::{
    Config, Error, Operation, Payload, QuarryError, QueryResult, Result, classify_message,
    error_kind,
};
use futures::future::BoxFuture;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};
use tokio::sync::{Mutex, OnceCell};

/// Executes payloads out of the caller's hands and returns raw results.
///
/// This is the only seam between result sets and whatever actually runs the
/// query (a worker pool, a remote service, an in memory store). Implementations
/// should tag uniqueness failures with [`crate::ErrorKind::UniqueViolation`]; untagged
/// errors are classified from their message.
pub trait DispatchChannel: Send + Sync {
    fn execute(&self, operation: Operation, payload: Payload) -> BoxFuture<'_, Result<QueryResult>>;
}

impl<T: DispatchChannel + ?Sized> DispatchChannel for Arc<T> {
    fn execute(&self, operation: Operation, payload: Payload) -> BoxFuture<'_, Result<QueryResult>> {
        (**self).execute(operation, payload)
    }
}

/// Counters shared by every result set derived from the same schema.
#[derive(Debug, Default)]
pub struct Stats {
    queries: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    retries: AtomicU64,
}

/// Point in time copy of [`Stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub queries: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub retries: u64,
}

impl Stats {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
    pub fn reset(&self) {
        for counter in [
            &self.queries,
            &self.errors,
            &self.cache_hits,
            &self.cache_misses,
            &self.retries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct CacheEntry {
    source: String,
    created: Instant,
    cell: Arc<OnceCell<QueryResult>>,
}

/// Wraps a [`DispatchChannel`]: classifies errors, keeps the [`Stats`] and
/// deduplicates identical reads when caching is enabled.
pub struct Dispatcher {
    channel: Arc<dyn DispatchChannel>,
    stats: Arc<Stats>,
    config: Config,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn DispatchChannel>, stats: Arc<Stats>, config: Config) -> Self {
        Self {
            channel,
            stats,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send the payload through the channel.
    ///
    /// Reads go through the cache when enabled (globally or by the payload's
    /// `cache` attribute). Writes drop every cached read of their source.
    pub async fn dispatch(&self, operation: Operation, payload: Payload) -> Result<QueryResult> {
        let use_cache = operation.is_read() && payload.attributes.cache.unwrap_or(self.config.cache);
        if !operation.is_read() {
            let source = payload.source.clone();
            self.invalidate(&source).await;
            let result = self.send(operation, payload).await;
            self.invalidate(&source).await;
            return result;
        }
        if !use_cache {
            return self.send(operation, payload).await;
        }
        let key = payload.cache_key(&operation);
        let cell = {
            let mut cache = self.cache.lock().await;
            let now = Instant::now();
            let expired = cache
                .get(&key)
                .is_some_and(|e| now.duration_since(e.created) > self.config.cache_ttl);
            if expired {
                cache.remove(&key);
            }
            if !cache.contains_key(&key) && cache.len() >= self.config.cache_capacity {
                if let Some(oldest) = cache
                    .iter()
                    .min_by_key(|(_, e)| e.created)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest);
                }
            }
            let entry = cache.entry(key.clone()).or_insert_with(|| CacheEntry {
                source: payload.source.clone(),
                created: now,
                cell: Arc::new(OnceCell::new()),
            });
            entry.cell.clone()
        };
        // Only the caller that runs the send is a miss, callers awaiting it are hits
        let sent = AtomicBool::new(false);
        let result = cell
            .get_or_try_init(|| {
                sent.store(true, Ordering::Relaxed);
                self.stats.record_cache_miss();
                self.send(operation, payload)
            })
            .await
            .cloned();
        if result.is_ok() && !sent.load(Ordering::Relaxed) {
            self.stats.record_cache_hit();
            log::trace!("Cache hit for {}", key);
        }
        result
    }

    /// Drop every cached read of `source`.
    pub async fn invalidate(&self, source: &str) {
        self.cache.lock().await.retain(|_, e| e.source != source);
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    async fn send(&self, operation: Operation, payload: Payload) -> Result<QueryResult> {
        self.stats.record_query();
        if self.config.log_payloads {
            log::debug!("Dispatching {} {}", operation, payload);
        }
        let context = format!("While dispatching {} on `{}`", operation, payload.source);
        match self.channel.execute(operation, payload).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.stats.record_error();
                let e = classify(e).context(context);
                log::error!("{:#}", e);
                Err(e)
            }
        }
    }
}

/// Make sure a channel error carries a classification.
fn classify(e: Error) -> Error {
    if error_kind(&e).is_some() {
        return e;
    }
    let message = format!("{:#}", e);
    let kind = classify_message(&message);
    e.context(QuarryError::new(kind, message))
}
