use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::gallery::Post;

const META_INDEX_VERSION: &str = "index_version";
const META_LOCATION: &str = "location";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable at {}: {reason}", .path.display())]
    StoreUnavailable { path: PathBuf, reason: String },
    #[error("storage: {op} failed")]
    TransactionFailed {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("storage: stored post {id} is corrupt")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

trait TxContext<T> {
    fn op(self, op: &'static str) -> StoreResult<T>;
}

impl<T> TxContext<T> for rusqlite::Result<T> {
    fn op(self, op: &'static str) -> StoreResult<T> {
        self.map_err(|source| StoreError::TransactionFailed { op, source })
    }
}

/// Local post store, download ledger and a small metadata table, all in one
/// SQLite database.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> StoreResult<Self> {
        let path = match opts.path {
            Some(path) => path,
            None => default_path().ok_or_else(|| StoreError::StoreUnavailable {
                path: PathBuf::new(),
                reason: "no data directory available".into(),
            })?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| StoreError::StoreUnavailable {
                path: parent.to_path_buf(),
                reason: err.to_string(),
            })?;
        }

        let conn = Connection::open(&path).map_err(|err| StoreError::StoreUnavailable {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .op("set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .op("set busy timeout")?;
        migrate(&conn)?;

        tracing::debug!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> StoreResult<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| StoreError::StoreUnavailable {
                path: PathBuf::new(),
                reason: "connection still in use".into(),
            })?
            .into_inner();
        conn.close().map_err(|(_, err)| err).op("close connection")
    }

    /// Inserts or wholesale replaces a post keyed by its id.
    pub fn save_post(&self, post: &Post) -> StoreResult<()> {
        let body = serde_json::to_string(post).map_err(|source| StoreError::Corrupt {
            id: post.id.clone(),
            source,
        })?;
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO posts (id, genre, date, body, stored_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
  genre = excluded.genre,
  date = excluded.date,
  body = excluded.body,
  stored_at = excluded.stored_at
"#,
            params![post.id, post.genre, post.date, body, unix_now()],
        )
        .op("save post")?;
        Ok(())
    }

    pub fn get_post(&self, id: &str) -> StoreResult<Option<Post>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM posts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .op("query post")?;
        body.map(|body| decode_post(id, &body)).transpose()
    }

    /// Every persisted post, in insertion order. Rows whose body no longer
    /// decodes are logged and left out.
    pub fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, body FROM posts ORDER BY rowid ASC")
            .op("list posts")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .op("list posts")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .op("list posts")?;
        Ok(rows
            .iter()
            .filter_map(|(id, body)| match decode_post(id, body) {
                Ok(post) => Some(post),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable stored post");
                    None
                }
            })
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn insert_raw_post(&self, id: &str, body: &str) {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO posts (id, genre, date, body, stored_at) VALUES (?1, NULL, '', ?2, 0)",
            params![id, body],
        )
        .unwrap();
    }

    pub fn post_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .op("count posts")?;
        Ok(count.max(0) as usize)
    }

    pub fn mark_downloaded(&self, file: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO download_log (path, downloaded, logged_at)
VALUES (?1, 1, ?2)
ON CONFLICT(path) DO UPDATE SET
  downloaded = 1,
  logged_at = excluded.logged_at
"#,
            params![ledger_path(file), unix_now()],
        )
        .op("mark downloaded")?;
        Ok(())
    }

    pub fn is_downloaded(&self, file: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let flag: Option<i64> = conn
            .query_row(
                "SELECT downloaded FROM download_log WHERE path = ?1",
                params![ledger_path(file)],
                |row| row.get(0),
            )
            .optional()
            .op("query download log")?;
        Ok(flag.unwrap_or(0) != 0)
    }

    pub fn set_index_version(&self, version: &str) -> StoreResult<()> {
        self.set_meta(META_INDEX_VERSION, version)
    }

    pub fn index_version(&self) -> StoreResult<Option<String>> {
        self.get_meta(META_INDEX_VERSION)
    }

    pub fn set_location(&self, fragment: &str) -> StoreResult<()> {
        self.set_meta(META_LOCATION, fragment)
    }

    pub fn location(&self) -> StoreResult<Option<String>> {
        self.get_meta(META_LOCATION)
    }

    fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO meta (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
            params![key, value],
        )
        .op("write metadata")?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .op("read metadata")
    }
}

/// Ledger keys are synthetic paths, one per manifest file.
fn ledger_path(file: &str) -> String {
    format!("/log/{file}")
}

fn decode_post(id: &str, body: &str) -> StoreResult<Post> {
    serde_json::from_str(body).map_err(|source| StoreError::Corrupt {
        id: id.to_string(),
        source,
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

fn migrate(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )
    .op("create migrations table")?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql).op("apply migration")?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, unix_now()],
        )
        .op("record migration")?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS posts (
  id TEXT PRIMARY KEY,
  genre TEXT,
  date TEXT NOT NULL,
  body TEXT NOT NULL,
  stored_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS download_log (
  path TEXT PRIMARY KEY,
  downloaded INTEGER NOT NULL,
  logged_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_genre ON posts(genre);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("gallery-tui").join("gallery.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::sample_post;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(Options {
            path: Some(dir.path().join("nested").join("gallery.db")),
        })
        .unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn save_post_replaces_wholesale() {
        let (_dir, store) = open_temp();
        let mut post = sample_post("7", "Anime", "2024-01-01");
        store.save_post(&post).unwrap();
        post.title = "Renamed".into();
        post.genre = None;
        store.save_post(&post).unwrap();

        assert_eq!(store.post_count().unwrap(), 1);
        let loaded = store.get_post("7").unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(loaded.genre, None);
        assert!(store.get_post("missing").unwrap().is_none());
    }

    #[test]
    fn list_posts_keeps_insertion_order() {
        let (_dir, store) = open_temp();
        for id in ["b", "a", "c"] {
            store.save_post(&sample_post(id, "x", "2024-01-01")).unwrap();
        }
        let ids: Vec<_> = store
            .list_posts()
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn ledger_tracks_files_independently_of_posts() {
        let (_dir, store) = open_temp();
        assert!(!store.is_downloaded("a.json").unwrap());
        store.mark_downloaded("a.json").unwrap();
        store.mark_downloaded("a.json").unwrap();
        assert!(store.is_downloaded("a.json").unwrap());
        assert!(!store.is_downloaded("b.json").unwrap());
        assert_eq!(store.post_count().unwrap(), 0);
    }

    #[test]
    fn metadata_round_trips_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gallery.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert_eq!(store.index_version().unwrap(), None);
        store.set_index_version("v1").unwrap();
        store.set_index_version("v2").unwrap();
        store.set_location("anime").unwrap();
        store.mark_downloaded("a.json").unwrap();
        store.close().unwrap();

        let reopened = Store::open(Options { path: Some(path) }).unwrap();
        assert_eq!(reopened.index_version().unwrap().as_deref(), Some("v2"));
        assert_eq!(reopened.location().unwrap().as_deref(), Some("anime"));
        assert!(reopened.is_downloaded("a.json").unwrap());
    }

    #[test]
    fn corrupt_body_is_reported_and_skipped_by_listing() {
        let (_dir, store) = open_temp();
        store.save_post(&sample_post("a", "Anime", "2024-01-01")).unwrap();
        store.insert_raw_post("x", "not json");
        let err = store.get_post("x").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref id, .. } if id == "x"));

        let listed: Vec<_> = store.list_posts().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(listed, vec!["a"]);
    }
}
