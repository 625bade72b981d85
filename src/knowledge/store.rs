//! Single-file SQLite store behind the knowledge index.
//!
//! The store owns only a path. Every operation opens its own connection,
//! does its work and drops the connection on every exit path, so no handle
//! outlives the call that needed it. Writes go through one transaction per
//! document: a failure anywhere rolls the whole document back.
//!
//! Single writer only. Readers running next to a writer in another process
//! may observe a document mid-replacement.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction};

use crate::knowledge::error::{KnowledgeError, KnowledgeResult};

/// Schema revision recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    cite_key        TEXT PRIMARY KEY,
    title           TEXT NOT NULL DEFAULT '',
    authors         TEXT NOT NULL DEFAULT '[]',
    year            TEXT NOT NULL DEFAULT '',
    keywords        TEXT NOT NULL DEFAULT '[]',
    key_concepts    TEXT NOT NULL DEFAULT '[]',
    page_count      INTEGER NOT NULL DEFAULT 0,
    extraction_date TEXT NOT NULL DEFAULT '',
    file_path       TEXT NOT NULL DEFAULT '',
    processing_time REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS pages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    cite_key      TEXT NOT NULL REFERENCES documents (cite_key) ON DELETE CASCADE,
    page_num      INTEGER NOT NULL,
    content_type  TEXT NOT NULL DEFAULT 'main',
    keywords      TEXT NOT NULL DEFAULT '[]',
    word_count    INTEGER NOT NULL DEFAULT 0,
    has_figures   INTEGER NOT NULL DEFAULT 0,
    has_tables    INTEGER NOT NULL DEFAULT 0,
    has_equations INTEGER NOT NULL DEFAULT 0,
    UNIQUE (cite_key, page_num)
);

CREATE TABLE IF NOT EXISTS keywords (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    keyword   TEXT NOT NULL,
    cite_key  TEXT NOT NULL REFERENCES documents (cite_key) ON DELETE CASCADE,
    page_num  INTEGER NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0 CHECK (frequency >= 0),
    context   TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS concept_network (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    concept             TEXT NOT NULL,
    related_concept     TEXT NOT NULL,
    cite_key            TEXT NOT NULL REFERENCES documents (cite_key) ON DELETE CASCADE,
    co_occurrence_count INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_keywords_keyword ON keywords (keyword);
CREATE INDEX IF NOT EXISTS idx_keywords_cite_key ON keywords (cite_key);
CREATE INDEX IF NOT EXISTS idx_concepts_concept ON concept_network (concept);
CREATE INDEX IF NOT EXISTS idx_concepts_related ON concept_network (related_concept);
CREATE INDEX IF NOT EXISTS idx_concepts_cite_key ON concept_network (cite_key);
"#;

/// Handle to a knowledge index file.
///
/// Cheap to clone; holds no open connection.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    path: PathBuf,
}

impl KnowledgeStore {
    /// Open (or create) the index at `path` and make sure the schema exists.
    ///
    /// Safe to call on every startup: schema creation is idempotent.
    pub fn open(path: impl Into<PathBuf>) -> KnowledgeResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| KnowledgeError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self { path };
        store.init_schema()?;
        tracing::debug!(path = %store.path.display(), "knowledge index ready");
        Ok(store)
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create tables and indexes if they are missing.
    pub fn init_schema(&self) -> KnowledgeResult<()> {
        self.read(|conn| {
            conn.execute_batch(SCHEMA)?;
            let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            if version == 0 {
                conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            }
            Ok(())
        })
    }

    /// Open a fresh connection with foreign-key enforcement on.
    pub(crate) fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Run `f` on a scoped connection, reporting failures as "index unavailable".
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> KnowledgeResult<T> {
        let conn = self.connect().map_err(|e| self.unavailable(e))?;
        f(&conn).map_err(|e| self.unavailable(e))
    }

    /// Run `f` inside one transaction on behalf of `cite_key`.
    ///
    /// The transaction commits only if `f` succeeds; otherwise it is rolled
    /// back when dropped.
    pub(crate) fn write<T>(
        &self,
        cite_key: &str,
        f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> KnowledgeResult<T> {
        let failed = |source| KnowledgeError::IngestFailed {
            cite_key: cite_key.to_string(),
            source,
        };

        let mut conn = self.connect().map_err(failed)?;
        let tx = conn.transaction().map_err(failed)?;
        let value = f(&tx).map_err(failed)?;
        tx.commit().map_err(failed)?;
        Ok(value)
    }

    fn unavailable(&self, source: rusqlite::Error) -> KnowledgeError {
        KnowledgeError::Unavailable {
            path: self.path.display().to_string(),
            source,
        }
    }
}
