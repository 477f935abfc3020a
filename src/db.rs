//! SQLite database for the game catalog
//!
//! This module provides durable storage for game records. The schema is
//! created on open and default catalog entries are seeded idempotently,
//! keyed on the component path.

use crate::error::StoreError;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Current schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Component path of the built-in number guessing game
pub const NUMBER_GUESS_PATH: &str = "NumberGuess/NumberGuessGame.js";

/// A game catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub icon_url: String,
    pub game_component_path: String,
}

/// A catalog entry that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGame {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_url: String,
    pub game_component_path: String,
}

/// The games every fresh store starts with
pub fn default_catalog() -> Vec<NewGame> {
    vec![NewGame {
        title: "Number Guessing Game".to_string(),
        description: Some("Guess the secret number between 1 and 100!".to_string()),
        icon_url: "/assets/game_icon.png".to_string(),
        game_component_path: NUMBER_GUESS_PATH.to_string(),
    }]
}

/// Read access to the game catalog
pub trait GameStore: Send + Sync {
    /// Every record, in insertion order
    fn list_games(&self) -> Result<Vec<GameRecord>, StoreError>;

    /// A single record by id
    fn get_game(&self, id: i64) -> Result<Option<GameRecord>, StoreError>;
}

/// Run a store call on the blocking thread pool
pub async fn run_blocking<T, F>(store: Arc<dyn GameStore>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&dyn GameStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

/// Database connection wrapper with thread-safe access
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(StoreError::Open)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;

        info!(path = %path.display(), "Connected to the SQLite database");
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Open)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    /// Create the backing tables if absent. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?;

        if current_version < SCHEMA_VERSION {
            info!("Running migrations from v{} to v{}", current_version, SCHEMA_VERSION);

            if current_version < 1 {
                migrate_v1(&conn)?;
            }
        }

        Ok(())
    }

    /// Insert the given games unless a row with the same component path
    /// already exists. Returns how many rows were inserted.
    pub fn seed_if_empty(&self, games: &[NewGame]) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO games (title, description, icon_url, game_component_path)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        let mut inserted = 0;
        for game in games {
            match stmt.execute(params![
                game.title,
                game.description,
                game.icon_url,
                game.game_component_path
            ]) {
                Ok(0) => {
                    debug!(path = %game.game_component_path, "Game already present, skipping");
                }
                Ok(_) => {
                    inserted += 1;
                    info!(title = %game.title, path = %game.game_component_path, "Inserted game");
                }
                Err(e) => {
                    error!(title = %game.title, error = %e, "Error inserting game");
                }
            }
        }

        Ok(inserted)
    }

    /// Number of rows in the catalog
    pub fn count_games(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl GameStore for Database {
    fn list_games(&self) -> Result<Vec<GameRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, icon_url, game_component_path
             FROM games ORDER BY id",
        )?;

        let games = stmt
            .query_map([], game_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(games)
    }

    fn get_game(&self, id: i64) -> Result<Option<GameRecord>, StoreError> {
        let conn = self.conn.lock();
        let game = conn
            .query_row(
                "SELECT id, title, description, icon_url, game_component_path
                 FROM games WHERE id = ?1",
                params![id],
                game_from_row,
            )
            .optional()?;

        Ok(game)
    }
}

/// Migration v1: games table
fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
    debug!("Applying migration v1: games table");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            icon_url TEXT,
            game_component_path TEXT NOT NULL UNIQUE
        );

        INSERT INTO schema_migrations (version) VALUES (1);
        "#,
    )?;

    Ok(())
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        icon_url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        game_component_path: row.get(4)?,
    })
}
