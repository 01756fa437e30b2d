use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use seiri_core::error::SeiriError;
use seiri_core::models::LocalFile;
use seiri_core::storage::Storage;

/// Async front for [`Storage`]. The connection lives on its own thread and
/// every call is a message to it.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    GetLocalFiles {
        reply: oneshot::Sender<Result<Vec<LocalFile>, SeiriError>>,
    },
    UpsertLocalFiles {
        files: Vec<LocalFile>,
        reply: oneshot::Sender<Result<usize, SeiriError>>,
    },
    SaveResolved {
        files: Vec<LocalFile>,
        reply: oneshot::Sender<Result<(), SeiriError>>,
    },
    SetLocked {
        path: String,
        locked: bool,
        reply: oneshot::Sender<Result<bool, SeiriError>>,
    },
    SetIgnored {
        path: String,
        ignored: bool,
        reply: oneshot::Sender<Result<bool, SeiriError>>,
    },
    DeleteMissing {
        present: Vec<String>,
        reply: oneshot::Sender<Result<usize, SeiriError>>,
    },
}

fn closed<T>() -> Result<T, SeiriError> {
    Err(SeiriError::Config("DB actor closed".into()))
}

impl DbHandle {
    pub fn open(path: &Path) -> Option<Self> {
        let storage = Storage::open(path)
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    pub fn open_memory() -> Option<Self> {
        let storage = Storage::open_memory()
            .map_err(|e| tracing::error!("Failed to open in-memory database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    fn spawn(storage: Storage) -> Option<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .map_err(|e| tracing::error!("Failed to spawn DB thread: {e}"))
            .ok()?;

        Some(Self { tx })
    }

    pub async fn get_local_files(&self) -> Result<Vec<LocalFile>, SeiriError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::GetLocalFiles { reply });
        rx.await.unwrap_or_else(|_| closed())
    }

    pub async fn upsert_local_files(&self, files: Vec<LocalFile>) -> Result<usize, SeiriError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::UpsertLocalFiles { files, reply });
        rx.await.unwrap_or_else(|_| closed())
    }

    pub async fn save_resolved(&self, files: Vec<LocalFile>) -> Result<(), SeiriError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::SaveResolved { files, reply });
        rx.await.unwrap_or_else(|_| closed())
    }

    pub async fn set_locked(&self, path: String, locked: bool) -> Result<bool, SeiriError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::SetLocked {
            path,
            locked,
            reply,
        });
        rx.await.unwrap_or_else(|_| closed())
    }

    pub async fn set_ignored(&self, path: String, ignored: bool) -> Result<bool, SeiriError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::SetIgnored {
            path,
            ignored,
            reply,
        });
        rx.await.unwrap_or_else(|_| closed())
    }

    pub async fn delete_missing(&self, present: Vec<String>) -> Result<usize, SeiriError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::DeleteMissing { present, reply });
        rx.await.unwrap_or_else(|_| closed())
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::GetLocalFiles { reply } => {
                let _ = reply.send(storage.get_local_files());
            }
            DbCommand::UpsertLocalFiles { files, reply } => {
                let _ = reply.send(storage.upsert_local_files(&files));
            }
            DbCommand::SaveResolved { files, reply } => {
                let _ = reply.send(storage.save_resolved(&files));
            }
            DbCommand::SetLocked {
                path,
                locked,
                reply,
            } => {
                let _ = reply.send(storage.set_locked(&path, locked));
            }
            DbCommand::SetIgnored {
                path,
                ignored,
                reply,
            } => {
                let _ = reply.send(storage.set_ignored(&path, ignored));
            }
            DbCommand::DeleteMissing { present, reply } => {
                let _ = reply.send(storage.delete_missing(&present));
            }
        }
    }
    tracing::debug!("DB actor stopped");
}
