mod db;

use std::sync::Arc;

use tokio::sync::RwLock;

use seiri_api::anilist::AniListClient;
use seiri_api::anizip::AniZipClient;
use seiri_core::aggregator;
use seiri_core::config::AppConfig;
use seiri_core::models::{Entry, LibraryEntry, LocalFile, MediaId};
use seiri_core::pipeline::{ReconcileOptions, ReconcileOutcome, Reconciler};
use seiri_core::scan_log::{ScanLogEntry, SharedScanLog};
use seiri_core::scanner;
use seiri_core::sources::{CatalogSource, EpisodeSource, TitleParser};

pub use db::DbHandle;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Long-lived application state: config, the database actor, the
/// reconciler and the library view of the last pass.
pub struct Runtime<C = AniListClient, E = AniZipClient> {
    db: DbHandle,
    config: Arc<RwLock<AppConfig>>,
    reconciler: Reconciler<C, E>,
    library: Arc<RwLock<Vec<LibraryEntry>>>,
}

impl Runtime {
    /// Load config, open the database and connect the AniList and ani.zip clients.
    pub fn new() -> Result<Self, RuntimeError> {
        let config = AppConfig::load().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db = DbHandle::open(&db_path)
            .ok_or_else(|| RuntimeError::Database("failed to open database".into()))?;

        let catalog = AniListClient::new(
            config.services.anilist_token.clone(),
            config.services.anilist_username.clone(),
        );
        Ok(Self::with_sources(
            config,
            db,
            Arc::new(catalog),
            Arc::new(AniZipClient::new()),
        ))
    }
}

impl<C, E> Runtime<C, E>
where
    C: CatalogSource + 'static,
    E: EpisodeSource + 'static,
{
    pub fn with_sources(config: AppConfig, db: DbHandle, catalog: Arc<C>, episodes: Arc<E>) -> Self {
        let reconciler = Reconciler::from_config(catalog, episodes, &config);
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            reconciler,
            library: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn db_handle(&self) -> DbHandle {
        self.db.clone()
    }

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Persist and apply a new config. Limiter and worker settings take
    /// effect on the next `Runtime`.
    pub async fn update_config(&self, new_config: AppConfig) -> Result<(), RuntimeError> {
        new_config
            .save()
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        *self.config.write().await = new_config;
        Ok(())
    }

    /// Walk the watch folders and sync the file table with what is on disk.
    /// Returns the number of files found.
    pub async fn refresh_files(&self) -> Result<usize, RuntimeError> {
        let library_config = self.config.read().await.library.clone();
        let found = tokio::task::spawn_blocking(move || {
            scanner::discover_local_files(&library_config)
        })
        .await
        .map_err(|e| RuntimeError::Config(format!("scan task failed: {e}")))?
        .map_err(|e| RuntimeError::Config(e.to_string()))?;

        let present: Vec<String> = found.iter().map(|f| f.path.clone()).collect();
        let count = found.len();
        self.db
            .upsert_local_files(found)
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        let removed = self
            .db
            .delete_missing(present)
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;

        tracing::info!(found = count, removed, "Local files refreshed");
        Ok(count)
    }

    /// Run a reconciliation pass over every stored file and save what it
    /// resolved.
    pub async fn reconcile<P: TitleParser + ?Sized>(
        &self,
        parser: &P,
    ) -> Result<ReconcileOutcome, RuntimeError> {
        let files = self
            .db
            .get_local_files()
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        let enhanced = self.config.read().await.matching.enhanced;

        let outcome = self
            .reconciler
            .reconcile(
                files,
                parser,
                ReconcileOptions {
                    collection: None,
                    enhanced,
                },
            )
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        self.db
            .save_resolved(outcome.files.clone())
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        *self.library.write().await = outcome.library.clone();
        Ok(outcome)
    }

    /// Library view of the last pass.
    pub async fn library(&self) -> Vec<LibraryEntry> {
        self.library.read().await.clone()
    }

    pub async fn entry(&self, media_id: MediaId) -> Result<Entry, RuntimeError> {
        self.library
            .read()
            .await
            .iter()
            .flat_map(|group| &group.entries)
            .find(|e| e.media.id == media_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(format!("media {media_id}")))
    }

    /// Lock or unlock a file. Locked files keep their match across passes.
    pub async fn set_locked(&self, path: &str, locked: bool) -> Result<(), RuntimeError> {
        let path = seiri_core::models::normalize_path(path);
        let updated = self
            .db
            .set_locked(path.clone(), locked)
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        if !updated {
            return Err(RuntimeError::NotFound(path));
        }

        let mut library = self.library.write().await;
        for entry in library.iter_mut().flat_map(|group| group.entries.iter_mut()) {
            let mut touched = false;
            for file in entry.local_files.iter_mut().filter(|f| f.path == path) {
                file.locked = locked;
                touched = true;
            }
            if touched {
                entry.all_files_locked = aggregator::all_locked(&entry.local_files);
            }
        }
        Ok(())
    }

    /// Ignored files are never matched and drop out of the library on the
    /// next pass.
    pub async fn set_ignored(&self, path: &str, ignored: bool) -> Result<(), RuntimeError> {
        let path = seiri_core::models::normalize_path(path);
        let updated = self
            .db
            .set_ignored(path.clone(), ignored)
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))?;
        if updated {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(path))
        }
    }

    pub async fn local_files(&self) -> Result<Vec<LocalFile>, RuntimeError> {
        self.db
            .get_local_files()
            .await
            .map_err(|e| RuntimeError::Database(e.to_string()))
    }

    pub fn invalidate_episodes(&self, media_id: MediaId) -> bool {
        self.reconciler.invalidate_episodes(media_id)
    }

    pub fn clear_episode_cache(&self) {
        self.reconciler.clear_episode_cache();
    }

    pub fn clear_search_cache(&self) {
        self.reconciler.clear_search_cache();
    }

    pub fn scan_log(&self) -> &SharedScanLog {
        self.reconciler.scan_log()
    }

    /// Why a file ended up where it did in the last pass.
    pub fn file_events(&self, path: &str) -> Vec<ScanLogEntry> {
        let path = seiri_core::models::normalize_path(path);
        match self.scan_log().lock() {
            Ok(log) => log.events_for(&path),
            Err(poisoned) => poisoned.into_inner().events_for(&path),
        }
    }
}
