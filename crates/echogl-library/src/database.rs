//! Game database using SQLite

use crate::{AppId, LibraryError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;

/// A game in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub id: AppId,
    pub name: String,
    pub install_path: String,
    pub catalog_id: Option<i64>,
    pub summary: Option<String>,
    pub genres: Option<String>,
    pub platforms: Option<String>,
    pub cover_path: Option<String>,
    pub cover_thumbnail_path: Option<String>,
    pub cover_detail_path: Option<String>,
    pub last_scanned: Option<String>,
}

impl GameRecord {
    /// A freshly scanned record with no catalog data
    pub fn from_scan(id: AppId, name: impl Into<String>, install_path: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            install_path: install_path.into(),
            catalog_id: None,
            summary: None,
            genres: None,
            platforms: None,
            cover_path: None,
            cover_thumbnail_path: None,
            cover_detail_path: None,
            last_scanned: None,
        }
    }

    pub fn with_covers(mut self, thumbnail: Option<String>, detail: Option<String>) -> Self {
        self.cover_thumbnail_path = thumbnail;
        self.cover_detail_path = detail;
        self
    }

    /// Whether catalog data has been attached
    pub fn is_enriched(&self) -> bool {
        self.catalog_id.is_some()
    }
}

/// Catalog-derived columns written by the enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub catalog_id: i64,
    pub summary: Option<String>,
    pub genres: Option<String>,
    pub platforms: Option<String>,
    pub cover_path: Option<String>,
}

/// What `upsert_scan` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Refreshed,
    /// The store is disconnected
    Skipped,
}

/// Game database manager.
///
/// A store that failed to open is kept in a disconnected state: every call
/// logs and does nothing, reads come back empty.
pub struct GameStore {
    conn: Option<Connection>,
}

impl GameStore {
    /// Open or create a database
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        let store = Self { conn: Some(conn) };
        store.init_schema()?;

        tracing::info!("Opened library database {}", path.display());
        Ok(store)
    }

    /// Open a database, falling back to a disconnected store on failure
    pub fn open_or_disconnected(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(
                    "Cannot open library database {}: {}; persistence disabled",
                    path.display(),
                    e
                );
                Self::disconnected()
            }
        }
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;

        let store = Self { conn: Some(conn) };
        store.init_schema()?;

        Ok(store)
    }

    /// A store without a connection
    pub fn disconnected() -> Self {
        Self { conn: None }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), LibraryError> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                install_path TEXT,
                catalog_id INTEGER,
                summary TEXT,
                genres TEXT,
                platforms TEXT,
                cover_path TEXT,
                cover_thumbnail_path TEXT,
                cover_detail_path TEXT,
                last_scanned TEXT DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        )?;

        Self::migrate(conn)?;

        conn.execute_batch(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_games_catalog_id ON games(catalog_id);
            CREATE INDEX IF NOT EXISTS idx_games_name ON games(name);
        "#,
        )?;

        Ok(())
    }

    /// Bring databases created by older versions up to the current layout.
    ///
    /// The oldest layout keys games by `appid`; it is renamed in place so
    /// existing rows stay addressable. Runs in one transaction.
    fn migrate(conn: &Connection) -> Result<(), LibraryError> {
        let mut existing = {
            let mut stmt = conn.prepare("PRAGMA table_info(games)")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>("name"))?
                .collect::<Result<Vec<_>, _>>()?;
            names
        };
        fn has(columns: &[String], column: &str) -> bool {
            columns.iter().any(|name| name == column)
        }

        let columns = [
            ("install_path", "TEXT"),
            ("catalog_id", "INTEGER"),
            ("summary", "TEXT"),
            ("genres", "TEXT"),
            ("platforms", "TEXT"),
            ("cover_path", "TEXT"),
            ("cover_thumbnail_path", "TEXT"),
            ("cover_detail_path", "TEXT"),
            ("last_scanned", "TEXT"),
        ];

        let rename_key = has(&existing, "appid") && !has(&existing, "id");
        let missing = columns.iter().any(|&(column, _)| !has(&existing, column));
        if !rename_key && !missing {
            return Ok(());
        }

        let tx = conn.unchecked_transaction()?;

        if rename_key {
            tracing::info!("Renaming games.appid to games.id");
            tx.execute_batch("ALTER TABLE games RENAME COLUMN appid TO id;")?;
            existing.retain(|name| name != "appid");
            existing.push("id".to_string());
        }

        for (column, kind) in columns {
            if !has(&existing, column) {
                tracing::info!("Adding column games.{}", column);
                tx.execute_batch(&format!("ALTER TABLE games ADD COLUMN {column} {kind};"))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn connection(&self, operation: &str) -> Option<&Connection> {
        if self.conn.is_none() {
            tracing::warn!("Library database unavailable, skipping {}", operation);
        }
        self.conn.as_ref()
    }

    fn connection_mut(&mut self, operation: &str) -> Option<&mut Connection> {
        if self.conn.is_none() {
            tracing::warn!("Library database unavailable, skipping {}", operation);
        }
        self.conn.as_mut()
    }

    /// Insert a scanned game, or refresh the scan-derived columns of an
    /// existing one. Catalog columns are never touched.
    pub fn upsert_scan(&mut self, record: &GameRecord) -> Result<UpsertOutcome, LibraryError> {
        let Some(conn) = self.connection_mut("upsert") else {
            return Ok(UpsertOutcome::Skipped);
        };

        let tx = conn.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM games WHERE id = ?1", params![record.id], |_| Ok(()))
            .optional()?
            .is_some();

        tx.execute(
            r#"INSERT INTO games
               (id, name, install_path, cover_thumbnail_path, cover_detail_path, last_scanned)
               VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   install_path = excluded.install_path,
                   cover_thumbnail_path = COALESCE(excluded.cover_thumbnail_path, games.cover_thumbnail_path),
                   cover_detail_path = COALESCE(excluded.cover_detail_path, games.cover_detail_path),
                   last_scanned = CURRENT_TIMESTAMP"#,
            params![
                record.id,
                record.name,
                record.install_path,
                record.cover_thumbnail_path,
                record.cover_detail_path,
            ],
        )?;

        tx.commit()?;

        Ok(if exists {
            UpsertOutcome::Refreshed
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Overwrite the catalog-derived columns of a game
    pub fn update_metadata(&mut self, id: AppId, update: &MetadataUpdate) -> Result<(), LibraryError> {
        let Some(conn) = self.connection_mut("metadata update") else {
            return Ok(());
        };

        let tx = conn.transaction()?;
        let changed = tx.execute(
            r#"UPDATE games SET
                   catalog_id = ?1,
                   summary = ?2,
                   genres = ?3,
                   platforms = ?4,
                   cover_path = ?5
               WHERE id = ?6"#,
            params![
                update.catalog_id,
                update.summary,
                update.genres,
                update.platforms,
                update.cover_path,
                id,
            ],
        )?;
        tx.commit()?;

        if changed == 0 {
            return Err(LibraryError::GameNotFound(id));
        }
        Ok(())
    }

    /// Overwrite the local cover paths of a game
    pub fn update_covers(
        &mut self,
        id: AppId,
        thumbnail: Option<&str>,
        detail: Option<&str>,
    ) -> Result<(), LibraryError> {
        let Some(conn) = self.connection_mut("cover update") else {
            return Ok(());
        };

        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE games SET cover_thumbnail_path = ?1, cover_detail_path = ?2 WHERE id = ?3",
            params![thumbnail, detail, id],
        )?;
        tx.commit()?;

        if changed == 0 {
            return Err(LibraryError::GameNotFound(id));
        }
        Ok(())
    }

    /// Get a game by ID
    pub fn get_by_id(&self, id: AppId) -> Result<Option<GameRecord>, LibraryError> {
        let Some(conn) = self.connection("lookup") else {
            return Ok(None);
        };

        let game = conn
            .query_row("SELECT * FROM games WHERE id = ?1", params![id], Self::row_to_game)
            .optional()?;

        Ok(game)
    }

    /// Get all games
    pub fn get_all(&self) -> Result<Vec<GameRecord>, LibraryError> {
        let Some(conn) = self.connection("listing") else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare("SELECT * FROM games ORDER BY name COLLATE NOCASE, id")?;

        let games = stmt
            .query_map([], Self::row_to_game)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(games)
    }

    /// Get total game count
    pub fn game_count(&self) -> Result<i64, LibraryError> {
        let Some(conn) = self.connection("count") else {
            return Ok(0);
        };

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Release the connection; later calls become no-ops
    pub fn close(&mut self) -> Result<(), LibraryError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| LibraryError::Sqlite(e))?;
            tracing::info!("Library database closed");
        }
        Ok(())
    }

    /// Convert a row to a GameRecord
    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        Ok(GameRecord {
            id: row.get("id")?,
            name: row.get("name")?,
            install_path: row.get::<_, Option<String>>("install_path")?.unwrap_or_default(),
            catalog_id: row.get("catalog_id")?,
            summary: row.get("summary")?,
            genres: row.get("genres")?,
            platforms: row.get("platforms")?,
            cover_path: row.get("cover_path")?,
            cover_thumbnail_path: row.get("cover_thumbnail_path")?,
            cover_detail_path: row.get("cover_detail_path")?,
            last_scanned: row.get("last_scanned")?,
        })
    }
}
