//! A single Moka backed cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fetchbox_core::{CacheHandle, MatchOptions, Request, Response, StoreError, StoreResult};
use http::Method;
use http::header::VARY;
use moka::future::Cache;
use smol_str::SmolStr;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::metrics::record_entries;

#[derive(Clone)]
struct StoredEntry {
    sequence: u64,
    request: Request,
    response: Response,
}

type Bucket = Arc<Vec<StoredEntry>>;

/// A named cache holding responses in a Moka cache.
///
/// Entries are addressed by the request URL without its fragment. Several
/// entries may share a URL when the stored responses carry a `Vary` header.
pub struct MokaCache {
    name: SmolStr,
    entries: Cache<String, Bucket>,
    sequence: AtomicU64,
    writes: Mutex<()>,
    max_entry_bytes: Option<usize>,
}

impl MokaCache {
    pub(crate) fn new(name: SmolStr, max_capacity: u64, max_entry_bytes: Option<usize>) -> Self {
        Self {
            name,
            entries: Cache::new(max_capacity),
            sequence: AtomicU64::new(0),
            writes: Mutex::new(()),
            max_entry_bytes,
        }
    }

    /// Number of stored URLs. Eventually consistent.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub(crate) fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    fn buckets(&self) -> Vec<(String, Bucket)> {
        self.entries
            .iter()
            .map(|(key, bucket)| (key.as_ref().clone(), bucket))
            .collect()
    }

    async fn candidates(&self, request: &Request, options: MatchOptions) -> Vec<StoredEntry> {
        let mut found: Vec<StoredEntry> = if options.ignore_search {
            let wanted = entry_key(request.url(), true);
            self.buckets()
                .into_iter()
                .filter(|(key, _)| strip_query(key) == wanted)
                .flat_map(|(_, bucket)| bucket.as_ref().clone())
                .collect()
        } else {
            match self.entries.get(&entry_key(request.url(), false)).await {
                Some(bucket) => bucket.as_ref().clone(),
                None => Vec::new(),
            }
        };
        found.retain(|entry| options.ignore_vary || vary_matches(request, entry));
        found.sort_by_key(|entry| entry.sequence);
        found
    }

    fn record(&self) {
        record_entries(&self.name, self.entry_count());
    }
}

impl std::fmt::Debug for MokaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("name", &self.name)
            .field("entries", &self.entries.entry_count())
            .field("max_entry_bytes", &self.max_entry_bytes)
            .finish()
    }
}

#[async_trait]
impl CacheHandle for MokaCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> StoreResult<Option<Response>> {
        if !can_match(request) {
            return Ok(None);
        }
        Ok(self
            .candidates(request, options)
            .await
            .into_iter()
            .next()
            .map(|entry| entry.response))
    }

    async fn put(&self, request: &Request, response: Response) -> StoreResult<()> {
        if request.method() != Method::GET {
            return Err(StoreError::UnsupportedMethod {
                method: request.method().clone(),
            });
        }
        if let Some(limit) = self.max_entry_bytes
            && response.body().len() > limit
        {
            return Err(StoreError::QuotaExceeded {
                url: request.url().to_string(),
            });
        }

        let _guard = self.writes.lock().await;
        let key = entry_key(request.url(), false);
        let mut bucket: Vec<StoredEntry> = match self.entries.get(&key).await {
            Some(bucket) => bucket
                .iter()
                .filter(|entry| !vary_matches(request, entry))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        bucket.push(StoredEntry {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            request: request.clone(),
            response,
        });
        self.entries.insert(key, Arc::new(bucket)).await;
        debug!(cache = %self.name, url = %request.url(), "stored response");
        self.record();
        Ok(())
    }

    async fn keys(
        &self,
        request: Option<&Request>,
        options: MatchOptions,
    ) -> StoreResult<Vec<Request>> {
        let entries = match request {
            Some(request) if !can_match(request) => Vec::new(),
            Some(request) => self.candidates(request, options).await,
            None => {
                let mut all: Vec<StoredEntry> = self
                    .buckets()
                    .into_iter()
                    .flat_map(|(_, bucket)| bucket.as_ref().clone())
                    .collect();
                all.sort_by_key(|entry| entry.sequence);
                all
            }
        };
        Ok(entries.into_iter().map(|entry| entry.request).collect())
    }

    async fn delete(&self, request: &Request, options: MatchOptions) -> StoreResult<bool> {
        if !can_match(request) {
            return Ok(false);
        }

        let _guard = self.writes.lock().await;
        let keys: Vec<String> = if options.ignore_search {
            let wanted = entry_key(request.url(), true);
            self.buckets()
                .into_iter()
                .map(|(key, _)| key)
                .filter(|key| strip_query(key) == wanted)
                .collect()
        } else {
            vec![entry_key(request.url(), false)]
        };

        let mut removed = false;
        for key in keys {
            let Some(bucket) = self.entries.get(&key).await else {
                continue;
            };
            let kept: Vec<StoredEntry> = bucket
                .iter()
                .filter(|entry| !(options.ignore_vary || vary_matches(request, entry)))
                .cloned()
                .collect();
            if kept.len() == bucket.len() {
                continue;
            }
            removed = true;
            if kept.is_empty() {
                self.entries.invalidate(&key).await;
            } else {
                self.entries.insert(key, Arc::new(kept)).await;
            }
        }
        if removed {
            debug!(cache = %self.name, url = %request.url(), "deleted entries");
            self.record();
        }
        Ok(removed)
    }
}

fn can_match(request: &Request) -> bool {
    request.method() == Method::GET || request.method() == Method::HEAD
}

fn entry_key(url: &Url, ignore_search: bool) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    if ignore_search {
        url.set_query(None);
    }
    url.into()
}

fn strip_query(key: &str) -> &str {
    key.split_once('?').map_or(key, |(base, _)| base)
}

/// Whether the headers named by the stored response's `Vary` agree.
///
/// `Vary: *` never matches.
fn vary_matches(request: &Request, entry: &StoredEntry) -> bool {
    for value in entry.response.headers().get_all(VARY) {
        let Ok(value) = value.to_str() else {
            return false;
        };
        for name in value.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if name == "*" {
                return false;
            }
            if request.headers().get(name) != entry.request.headers().get(name) {
                return false;
            }
        }
    }
    true
}
