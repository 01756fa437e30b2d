//! Episode resolution for matched files.
//!
//! Parsed episode numbers are either already relative to the matched media
//! or counted across the whole title family. Relative numbers are taken as
//! is; anything else is translated through the media's episode mapping,
//! fetched once per media and kept in an [`EpisodeCache`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::container::MediaContainer;
use crate::error::SeiriError;
use crate::limiter::RateLimiter;
use crate::models::{EpisodeMapping, LocalFile, MediaId};
use crate::scan_log::{self, ScanEvent, SharedScanLog};
use crate::sources::EpisodeSource;

type Slot = Arc<Mutex<Option<Arc<EpisodeMapping>>>>;

/// Process-lifetime cache of episode mappings with single-flight fetches.
///
/// Each media ID owns a slot guarded by an async mutex. The first caller to
/// find a slot empty fetches while holding the lock; concurrent callers wait
/// on the same lock and then read the stored mapping. Failed fetches leave
/// the slot empty, so the next caller retries.
#[derive(Debug, Default)]
pub struct EpisodeCache {
    slots: DashMap<MediaId, Slot>,
}

impl EpisodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached mapping, if present and not being fetched right now.
    pub fn get(&self, media_id: MediaId) -> Option<Arc<EpisodeMapping>> {
        let slot = self.slots.get(&media_id).map(|s| Arc::clone(s.value()))?;
        let guard = slot.try_lock().ok()?;
        guard.as_ref().map(Arc::clone)
    }

    /// Return the cached mapping or run `fetch` to fill it.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        media_id: MediaId,
        fetch: F,
    ) -> Result<Arc<EpisodeMapping>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EpisodeMapping, E>>,
    {
        let slot = Arc::clone(self.slots.entry(media_id).or_default().value());
        let mut guard = slot.lock().await;
        if let Some(mapping) = guard.as_ref() {
            return Ok(Arc::clone(mapping));
        }
        let mapping = Arc::new(fetch().await?);
        *guard = Some(Arc::clone(&mapping));
        Ok(mapping)
    }

    /// Drop the mapping of one media. Returns whether a slot existed.
    pub fn invalidate(&self, media_id: MediaId) -> bool {
        self.slots.remove(&media_id).is_some()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of media with a stored mapping.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().try_lock().is_ok_and(|g| g.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one hydration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationReport {
    /// Files that received an episode number in this pass.
    pub resolved: usize,
    /// Matched files still without an episode number.
    pub unresolved: usize,
    /// Media whose mapping fetch failed or timed out.
    pub failed_media: Vec<MediaId>,
}

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolves episode numbers of matched files.
pub struct FileHydrator<E> {
    source: Arc<E>,
    limiter: Arc<RateLimiter>,
    cache: Arc<EpisodeCache>,
    workers: usize,
    timeout: Duration,
    log: SharedScanLog,
}

impl<E: EpisodeSource + 'static> FileHydrator<E> {
    pub fn new(source: Arc<E>, limiter: Arc<RateLimiter>, cache: Arc<EpisodeCache>) -> Self {
        Self {
            source,
            limiter,
            cache,
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
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

    pub fn with_scan_log(mut self, log: SharedScanLog) -> Self {
        self.log = log;
        self
    }

    pub fn cache(&self) -> &Arc<EpisodeCache> {
        &self.cache
    }

    /// Resolve the episode of every matched file that has none yet.
    #[tracing::instrument(name = "hydrate", skip_all, fields(files = files.len()))]
    pub async fn hydrate(&self, files: &mut [LocalFile], container: &MediaContainer) -> HydrationReport {
        let mut report = HydrationReport::default();
        let mut pending: BTreeMap<MediaId, Vec<(usize, u32)>> = BTreeMap::new();
        let mut touched = Vec::new();

        for (index, file) in files.iter_mut().enumerate() {
            let Some(media_id) = file.media_id else {
                continue;
            };
            if file.ignored || file.episode.is_some() {
                continue;
            }
            let media = container.get(media_id);
            match (file.parsed_episode(), media) {
                (None, Some(media)) if media.is_single_episode() => {
                    file.episode = Some(1);
                    touched.push(index);
                }
                (Some(episode), Some(media))
                    if media.episodes.is_some_and(|total| (1..=total).contains(&episode)) =>
                {
                    file.episode = Some(episode);
                    touched.push(index);
                }
                (Some(episode), _) => pending.entry(media_id).or_default().push((index, episode)),
                (None, _) => {}
            }
        }

        let fetched = self.fetch_all(pending.keys().copied().collect()).await;
        for (media_id, result) in fetched {
            let Some(waiting) = pending.get(&media_id) else {
                continue;
            };
            let mapping = match result {
                Ok(mapping) => mapping,
                Err(e) => {
                    tracing::warn!(media_id, error = %e, "Episode mapping fetch failed");
                    scan_log::record(
                        &self.log,
                        ScanEvent::HydrationFailed {
                            media_id,
                            message: e.to_string(),
                        },
                    );
                    report.failed_media.push(media_id);
                    continue;
                }
            };
            let count = container
                .get(media_id)
                .and_then(|m| m.episodes)
                .unwrap_or_else(|| u32::try_from(mapping.len()).unwrap_or(u32::MAX));
            for &(index, parsed) in waiting {
                let relative = mapping
                    .get(parsed)
                    .filter(|_| parsed <= count)
                    .or_else(|| mapping.find_absolute(parsed));
                if let Some(meta) = relative {
                    files[index].episode = Some(meta.episode);
                    files[index].metadata = Some(meta.clone());
                    touched.push(index);
                }
            }
        }

        for index in touched {
            let file = &mut files[index];
            let (Some(media_id), Some(episode)) = (file.media_id, file.episode) else {
                continue;
            };
            if file.metadata.is_none() {
                file.metadata = self
                    .cache
                    .get(media_id)
                    .and_then(|m| m.get(episode).cloned());
            }
            report.resolved += 1;
            scan_log::record(
                &self.log,
                ScanEvent::Hydrated {
                    path: file.path.clone(),
                    media_id,
                    episode,
                },
            );
        }

        report.unresolved = files
            .iter()
            .filter(|f| f.media_id.is_some() && f.episode.is_none() && !f.ignored)
            .count();
        report.failed_media.sort_unstable();

        tracing::info!(
            resolved = report.resolved,
            unresolved = report.unresolved,
            failed_media = report.failed_media.len(),
            "Hydration pass complete"
        );
        report
    }

    /// Fetch mappings for `media_ids` on the worker pool, one task per media.
    async fn fetch_all(
        &self,
        media_ids: Vec<MediaId>,
    ) -> Vec<(MediaId, Result<Arc<EpisodeMapping>, SeiriError>)> {
        futures::stream::iter(media_ids)
            .map(|media_id| {
                let source = Arc::clone(&self.source);
                let limiter = Arc::clone(&self.limiter);
                let cache = Arc::clone(&self.cache);
                let timeout = self.timeout;
                let handle = tokio::spawn(async move {
                    fetch_mapping(&*source, &limiter, &cache, media_id, timeout).await
                });
                async move {
                    let result = handle.await.unwrap_or_else(|e| {
                        Err(SeiriError::Fetch(format!("hydration task failed: {e}")))
                    });
                    (media_id, result)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await
    }

    /// Drop the cached mapping of one media so the next pass refetches it.
    pub fn invalidate(&self, media_id: MediaId) -> bool {
        self.cache.invalidate(media_id)
    }
}

/// Fetch one mapping through the cache, behind the limiter and a timeout.
pub async fn fetch_mapping<E: EpisodeSource>(
    source: &E,
    limiter: &RateLimiter,
    cache: &EpisodeCache,
    media_id: MediaId,
    timeout: Duration,
) -> Result<Arc<EpisodeMapping>, SeiriError> {
    cache
        .get_or_fetch(media_id, || async {
            limiter.acquire().await;
            tracing::debug!(media_id, "Fetching episode mapping");
            match tokio::time::timeout(timeout, source.get_episode_mapping(media_id)).await {
                Ok(Ok(mapping)) => Ok(mapping),
                Ok(Err(e)) => Err(SeiriError::Fetch(format!("episodes of {media_id}: {e}"))),
                Err(_) => Err(SeiriError::Timeout(format!("episodes of {media_id}"))),
            }
        })
        .await
}
