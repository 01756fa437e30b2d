use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::SeiriError;
use crate::models::{EpisodeMetadata, LocalFile, MediaId, ParsedMetadata};

const SCHEMA_V1: &str = include_str!("../../../migrations/001_local_files.sql");

/// SQLite-backed storage for discovered local files.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, SeiriError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, SeiriError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    // ── Local files ─────────────────────────────────────────────

    /// All stored files, ordered by path.
    pub fn get_local_files(&self) -> Result<Vec<LocalFile>, SeiriError> {
        let mut stmt = self.conn.prepare(
            "SELECT path, name, parsed, media_id, episode, metadata, locked, ignored
             FROM local_file ORDER BY path",
        )?;
        let rows = stmt
            .query_map([], |row| Ok(row_to_local_file(row)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert newly discovered files, returning the rows written. Existing
    /// rows keep their resolved fields and their lock and ignore flags.
    pub fn upsert_local_files(&self, files: &[LocalFile]) -> Result<usize, SeiriError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO local_file (path, name, parsed, media_id, episode, metadata, locked, ignored)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(path) DO UPDATE SET
                     name = excluded.name,
                     parsed = COALESCE(excluded.parsed, local_file.parsed)",
            )?;
            for file in files {
                let parsed = to_json(file.parsed.as_ref())?;
                let metadata = to_json(file.metadata.as_ref())?;
                written += stmt.execute(params![
                    file.path,
                    file.name,
                    parsed,
                    media_id_column(file.media_id)?,
                    file.episode,
                    metadata,
                    file.locked,
                    file.ignored,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Write back what a reconciliation pass resolves: media ID, episode and
    /// episode metadata. Flags and parsed fields are left alone.
    pub fn save_resolved(&self, files: &[LocalFile]) -> Result<(), SeiriError> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE local_file
                 SET media_id = ?2, episode = ?3, metadata = ?4, updated_at = datetime('now')
                 WHERE path = ?1",
            )?;
            for file in files {
                let metadata = to_json(file.metadata.as_ref())?;
                stmt.execute(params![
                    file.path,
                    media_id_column(file.media_id)?,
                    file.episode,
                    metadata,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Pin or unpin a file. Returns `false` if no such file is stored.
    pub fn set_locked(&self, path: &str, locked: bool) -> Result<bool, SeiriError> {
        let changed = self.conn.execute(
            "UPDATE local_file SET locked = ?2, updated_at = datetime('now') WHERE path = ?1",
            params![path, locked],
        )?;
        Ok(changed > 0)
    }

    /// Exclude a file from matching. Ignoring a file also clears its match.
    pub fn set_ignored(&self, path: &str, ignored: bool) -> Result<bool, SeiriError> {
        let changed = if ignored {
            self.conn.execute(
                "UPDATE local_file
                 SET ignored = 1, media_id = 0, episode = NULL, metadata = NULL,
                     updated_at = datetime('now')
                 WHERE path = ?1",
                params![path],
            )?
        } else {
            self.conn.execute(
                "UPDATE local_file SET ignored = 0, updated_at = datetime('now') WHERE path = ?1",
                params![path],
            )?
        };
        Ok(changed > 0)
    }

    /// Delete every stored file whose path is not in `present`.
    pub fn delete_missing(&self, present: &[String]) -> Result<usize, SeiriError> {
        let present: HashSet<&str> = present.iter().map(String::as_str).collect();
        let stored: Vec<String> = {
            let mut stmt = self.conn.prepare("SELECT path FROM local_file")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            rows
        };

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        for path in stored.iter().filter(|p| !present.contains(p.as_str())) {
            deleted += tx.execute("DELETE FROM local_file WHERE path = ?1", params![path])?;
        }
        tx.commit()?;
        Ok(deleted)
    }
}

// ── Migrations ──────────────────────────────────────────────────

/// Run schema migrations using `PRAGMA user_version` for version tracking.
fn run_migrations(conn: &Connection) -> Result<(), SeiriError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

// ── Row mapping helpers ─────────────────────────────────────────

fn to_json<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>, SeiriError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(Into::into)
}

/// Unmatched files are stored with media ID 0.
fn media_id_column(media_id: Option<MediaId>) -> Result<i64, SeiriError> {
    i64::try_from(media_id.unwrap_or(0))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)).into())
}

fn row_to_local_file(row: &rusqlite::Row<'_>) -> LocalFile {
    let parsed: Option<ParsedMetadata> = row
        .get::<_, Option<String>>(2)
        .unwrap_or(None)
        .and_then(|s| serde_json::from_str(&s).ok());
    let metadata: Option<EpisodeMetadata> = row
        .get::<_, Option<String>>(5)
        .unwrap_or(None)
        .and_then(|s| serde_json::from_str(&s).ok());
    let media_id: i64 = row.get(3).unwrap_or(0);

    LocalFile {
        path: row.get(0).unwrap_or_default(),
        name: row.get(1).unwrap_or_default(),
        parsed,
        media_id: u64::try_from(media_id).ok().filter(|&id| id > 0),
        episode: row.get(4).unwrap_or(None),
        metadata,
        locked: row.get::<_, i32>(6).unwrap_or(0) != 0,
        ignored: row.get::<_, i32>(7).unwrap_or(0) != 0,
    }
}
