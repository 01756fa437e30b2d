use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;

use crate::error::SeiriError;
use crate::limiter::RateLimiter;
use crate::models::{Collection, MediaId, MediaRecord};
use crate::normalize;
use crate::scan_log::{self, ScanEvent, SharedScanLog};
use crate::sources::CatalogSource;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_QUERIES: usize = 50;

/// What a fetch should cover.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// The user's list, when the caller already has it.
    pub collection: Option<Arc<Collection>>,
    /// Also search the catalog for `titles`.
    pub enhanced: bool,
    /// Parsed titles of the files being matched.
    pub titles: Vec<String>,
}

/// Catalog search results by title family, kept for the life of the process.
///
/// Only successful searches are stored. A failed or timed-out search leaves
/// no entry, so the next pass searches again.
#[derive(Debug, Default)]
pub struct SearchCache {
    results: DashMap<String, Arc<Vec<MediaRecord>>>,
}

impl SearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, title: &str) -> Option<Arc<Vec<MediaRecord>>> {
        self.results
            .get(&normalize::family_key(title))
            .map(|r| Arc::clone(r.value()))
    }

    pub fn insert(&self, title: &str, found: Vec<MediaRecord>) -> Arc<Vec<MediaRecord>> {
        let found = Arc::new(found);
        self.results
            .insert(normalize::family_key(title), Arc::clone(&found));
        found
    }

    /// Drop the results for the family of `title`. Returns whether any existed.
    pub fn invalidate(&self, title: &str) -> bool {
        self.results.remove(&normalize::family_key(title)).is_some()
    }

    pub fn clear(&self) {
        self.results.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Assembles the candidate media of a matching pass.
pub struct MediaFetcher<C> {
    catalog: Arc<C>,
    limiter: Arc<RateLimiter>,
    cache: Arc<SearchCache>,
    workers: usize,
    timeout: Duration,
    max_queries: usize,
    log: SharedScanLog,
}

impl<C: CatalogSource + 'static> MediaFetcher<C> {
    pub fn new(catalog: Arc<C>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            catalog,
            limiter,
            cache: Arc::new(SearchCache::new()),
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            max_queries: DEFAULT_MAX_QUERIES,
            log: scan_log::shared_scan_log(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = max_queries;
        self
    }

    pub fn with_scan_log(mut self, log: SharedScanLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_search_cache(mut self, cache: Arc<SearchCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn search_cache(&self) -> &Arc<SearchCache> {
        &self.cache
    }

    /// Load the user's list from the catalog.
    pub async fn load_collection(&self) -> Result<Arc<Collection>, SeiriError> {
        self.limiter.acquire().await;
        match tokio::time::timeout(self.timeout, self.catalog.get_collection()).await {
            Ok(Ok(collection)) => Ok(Arc::new(collection)),
            Ok(Err(e)) => Err(SeiriError::Fetch(format!("collection: {e}"))),
            Err(_) => Err(SeiriError::Timeout("collection".into())),
        }
    }

    /// Candidate media: the user's list first, in list order, then media
    /// found by enhanced searches in ascending ID order.
    ///
    /// Only loading the collection can fail. A failed or timed-out search
    /// just contributes nothing.
    #[tracing::instrument(name = "fetch_media", skip_all, fields(enhanced = options.enhanced))]
    pub async fn fetch(&self, options: &FetchOptions) -> Result<Vec<MediaRecord>, SeiriError> {
        let collection = match &options.collection {
            Some(collection) => Arc::clone(collection),
            None => self.load_collection().await?,
        };

        let mut candidates = collection.media();
        if !options.enhanced {
            tracing::debug!(candidates = candidates.len(), "Using list media only");
            return Ok(candidates);
        }

        let known: HashSet<MediaId> = candidates.iter().map(|m| m.id).collect();
        let (cached, queries): (Vec<_>, Vec<_>) = self
            .queries(&options.titles)
            .into_iter()
            .map(|query| (self.cache.get(&query), query))
            .partition(|(hit, _)| hit.is_some());
        let cached: Vec<Arc<Vec<MediaRecord>>> =
            cached.into_iter().filter_map(|(hit, _)| hit).collect();
        let queries: Vec<String> = queries.into_iter().map(|(_, query)| query).collect();
        let query_count = queries.len();
        let cached_count = cached.len();

        let mut found_sets = cached;
        for (query, result) in self.search_all(queries).await {
            match result {
                Ok(found) => found_sets.push(self.cache.insert(&query, found)),
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Media search failed");
                    scan_log::record(
                        &self.log,
                        ScanEvent::SearchFailed {
                            query,
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        let mut discovered = BTreeMap::new();
        for media in found_sets.iter().flat_map(|found| found.iter()) {
            if !known.contains(&media.id) {
                discovered.entry(media.id).or_insert_with(|| media.clone());
            }
        }

        tracing::info!(
            list = candidates.len(),
            discovered = discovered.len(),
            queries = query_count,
            cached = cached_count,
            "Candidate media fetched"
        );
        candidates.extend(discovered.into_values());
        Ok(candidates)
    }

    /// Distinct titles by family, first spelling kept, capped.
    fn queries(&self, titles: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        titles
            .iter()
            .filter(|t| !t.trim().is_empty())
            .filter(|t| {
                let key = normalize::family_key(t);
                !key.is_empty() && seen.insert(key)
            })
            .take(self.max_queries)
            .cloned()
            .collect()
    }

    async fn search_all(
        &self,
        queries: Vec<String>,
    ) -> Vec<(String, Result<Vec<MediaRecord>, SeiriError>)> {
        futures::stream::iter(queries)
            .map(|query| {
                let catalog = Arc::clone(&self.catalog);
                let limiter = Arc::clone(&self.limiter);
                let timeout = self.timeout;
                let task_query = query.clone();
                let handle = tokio::spawn(async move {
                    limiter.acquire().await;
                    match tokio::time::timeout(timeout, catalog.search_media(&task_query)).await {
                        Ok(Ok(found)) => Ok(found),
                        Ok(Err(e)) => Err(SeiriError::Fetch(e.to_string())),
                        Err(_) => Err(SeiriError::Timeout(format!("search {task_query:?}"))),
                    }
                });
                async move {
                    let result = handle.await.unwrap_or_else(|e| {
                        Err(SeiriError::Fetch(format!("search task failed: {e}")))
                    });
                    (query, result)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}
