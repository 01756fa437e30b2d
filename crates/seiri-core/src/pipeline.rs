//! One reconciliation pass: parse, fetch, match, hydrate, aggregate.

use std::sync::Arc;

use serde::Serialize;

use crate::aggregator;
use crate::config::AppConfig;
use crate::container::MediaContainer;
use crate::error::SeiriError;
use crate::fetcher::{FetchOptions, MediaFetcher, SearchCache};
use crate::hydrator::{EpisodeCache, FileHydrator, HydrationReport};
use crate::limiter::RateLimiter;
use crate::matcher::{self, MatchOutcome, MatchResult, MatchRule};
use crate::models::{Collection, LibraryEntry, LocalFile, MediaId};
use crate::scan_log::{self, ScanEvent, ScanStats, SharedScanLog};
use crate::sources::{CatalogSource, EpisodeSource, TitleParser};

/// Per-pass knobs.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// The user's list, if already loaded. Fetched from the catalog otherwise.
    pub collection: Option<Arc<Collection>>,
    pub enhanced: bool,
}

/// Everything one pass produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub files: Vec<LocalFile>,
    pub matches: Vec<MatchResult>,
    pub hydration: HydrationReport,
    pub library: Vec<LibraryEntry>,
    #[serde(skip)]
    pub collection: Arc<Collection>,
    pub stats: ScanStats,
}

/// Owns the long-lived parts of the pipeline: the limiter, both caches and
/// the scan log. Both service calls share the one limiter.
///
/// Passes run one at a time. The scan log holds the events of the latest
/// pass and its stats are read from there.
pub struct Reconciler<C, E> {
    fetcher: MediaFetcher<C>,
    hydrator: FileHydrator<E>,
    log: SharedScanLog,
    pass: tokio::sync::Mutex<()>,
}

impl<C, E> Reconciler<C, E>
where
    C: CatalogSource + 'static,
    E: EpisodeSource + 'static,
{
    pub fn new(catalog: Arc<C>, episodes: Arc<E>, limiter: Arc<RateLimiter>) -> Self {
        let log = scan_log::shared_scan_log();
        Self {
            fetcher: MediaFetcher::new(catalog, Arc::clone(&limiter))
                .with_scan_log(Arc::clone(&log)),
            hydrator: FileHydrator::new(episodes, limiter, Arc::new(EpisodeCache::new()))
                .with_scan_log(Arc::clone(&log)),
            log,
            pass: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_config(catalog: Arc<C>, episodes: Arc<E>, config: &AppConfig) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.limiter));
        let timeout = config.fetcher.request_timeout();
        let mut reconciler = Self::new(catalog, episodes, limiter);
        reconciler.fetcher = reconciler
            .fetcher
            .with_workers(config.fetcher.workers)
            .with_timeout(timeout)
            .with_max_queries(config.matching.max_queries);
        reconciler.hydrator = reconciler
            .hydrator
            .with_workers(config.hydrator.workers)
            .with_timeout(timeout);
        reconciler
    }

    /// Run one pass over `files`.
    ///
    /// Only a failure to load the collection is an error. Every per-file or
    /// per-media failure ends up in the outcome instead.
    #[tracing::instrument(name = "reconcile", skip_all, fields(files = files.len()))]
    pub async fn reconcile<P: TitleParser + ?Sized>(
        &self,
        mut files: Vec<LocalFile>,
        parser: &P,
        options: ReconcileOptions,
    ) -> Result<ReconcileOutcome, SeiriError> {
        let _pass = self.pass.lock().await;
        self.clear_log();
        self.parse_files(&mut files, parser);

        let collection = match options.collection {
            Some(collection) => collection,
            None => self.fetcher.load_collection().await?,
        };
        let titles = files
            .iter()
            .filter(|f| !f.locked && !f.ignored)
            .filter_map(|f| f.parsed_title().map(str::to_string))
            .collect();
        let candidates = self
            .fetcher
            .fetch(&FetchOptions {
                collection: Some(Arc::clone(&collection)),
                enhanced: options.enhanced,
                titles,
            })
            .await?;

        let container = MediaContainer::build(candidates);
        let matches = matcher::match_files(&files, &container);
        self.log_matches(&matches);
        matcher::apply_matches(&mut files, &matches);

        let hydration = self.hydrator.hydrate(&mut files, &container).await;
        let library = aggregator::aggregate(&collection, &files);

        let stats = match self.log.lock() {
            Ok(log) => log.stats(),
            Err(poisoned) => poisoned.into_inner().stats(),
        };
        tracing::info!(
            matched = stats.matched,
            unmatched = stats.unmatched,
            ambiguous = stats.ambiguous,
            resolved = hydration.resolved,
            "Reconciliation pass complete"
        );

        Ok(ReconcileOutcome {
            files,
            matches,
            hydration,
            library,
            collection,
            stats,
        })
    }

    fn parse_files<P: TitleParser + ?Sized>(&self, files: &mut [LocalFile], parser: &P) {
        for file in files.iter_mut().filter(|f| !f.locked && !f.ignored) {
            match parser.parse(&file.name) {
                Some(parsed) => {
                    scan_log::record(
                        &self.log,
                        ScanEvent::Parsed {
                            path: file.path.clone(),
                            title: parsed.title.clone(),
                            episode: parsed.episode_start,
                        },
                    );
                    file.parsed = Some(parsed);
                }
                None => {
                    tracing::debug!(path = %file.path, "Failed to parse file name");
                    scan_log::record(
                        &self.log,
                        ScanEvent::ParseFailed {
                            path: file.path.clone(),
                        },
                    );
                    file.parsed = None;
                    file.reset_match();
                }
            }
        }
    }

    fn log_matches(&self, matches: &[MatchResult]) {
        for result in matches {
            if matches!(result.rule, MatchRule::Locked | MatchRule::Ignored) {
                continue;
            }
            let event = match result.outcome {
                MatchOutcome::Matched(media_id) => ScanEvent::Matched {
                    path: result.path.clone(),
                    media_id,
                    rule: result.rule.to_string(),
                },
                MatchOutcome::Unmatched => ScanEvent::Unmatched {
                    path: result.path.clone(),
                    rule: result.rule.to_string(),
                },
                MatchOutcome::Ambiguous => ScanEvent::Ambiguous {
                    path: result.path.clone(),
                    candidates: result.candidates.clone(),
                },
            };
            scan_log::record(&self.log, event);
        }
    }

    fn clear_log(&self) {
        match self.log.lock() {
            Ok(mut log) => log.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Forget the episode mapping of one media.
    pub fn invalidate_episodes(&self, media_id: MediaId) -> bool {
        self.hydrator.invalidate(media_id)
    }

    pub fn clear_episode_cache(&self) {
        self.hydrator.cache().clear();
    }

    pub fn episode_cache(&self) -> &Arc<EpisodeCache> {
        self.hydrator.cache()
    }

    pub fn search_cache(&self) -> &Arc<SearchCache> {
        self.fetcher.search_cache()
    }

    /// Forget every stored search so the next enhanced pass asks again.
    pub fn clear_search_cache(&self) {
        self.fetcher.search_cache().clear();
    }

    pub fn scan_log(&self) -> &SharedScanLog {
        &self.log
    }
}
