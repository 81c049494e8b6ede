//! Document store backed by SQLite.
//!
//! Each collection is a table of JSON documents keyed by id, mirrored in
//! memory for reads. A write closure mutates the in-memory collections under
//! the write lock while every touched document is journaled. On success only
//! the touched documents are upserted or deleted, inside one transaction. If
//! the closure or the commit fails, the journal is replayed backwards so
//! memory matches disk again.

use crate::types::community::Post;
use crate::types::course::Course;
use crate::types::notification::Notification;
use crate::types::quiz::{Question, Quiz, Submission};
use crate::types::showcase::{Idea, Project};
use crate::types::user::User;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteLockingMode,
};
use sqlx::{ConnectOptions, Connection};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const DB_FILE: &str = "cogitosphere.db";

/// How long to wait for a lock held by another process before giving up.
const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

const SQLITE_BUSY: i32 = 5;

const TABLES: [&str; 9] = [
    User::COLLECTION,
    Course::COLLECTION,
    Question::COLLECTION,
    Quiz::COLLECTION,
    Submission::COLLECTION,
    Post::COLLECTION,
    Project::COLLECTION,
    Idea::COLLECTION,
    Notification::COLLECTION,
];

pub trait Document: Clone + Serialize + DeserializeOwned {
    /// Table name; must be a plain SQL identifier.
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("collection {0} holds a document that is not valid json: {1}")]
    Corrupt(&'static str, #[source] serde_json::Error),

    #[error("collection {0}: failed to encode document: {1}")]
    Encode(&'static str, #[source] serde_json::Error),

    #[error("data directory {} is in use by another process", .0.display())]
    Locked(PathBuf),
}

enum Undo<T> {
    Inserted,
    Replaced(usize, T),
    Removed(usize, T),
}

pub struct Collection<T> {
    docs: Vec<T>,
    journal: Vec<(Uuid, Undo<T>)>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            docs: Vec::new(),
            journal: Vec::new(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.docs).finish()
    }
}

struct PendingRow {
    collection: &'static str,
    id: Uuid,
    doc: Option<String>,
}

impl<T: Document> Collection<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.docs.iter()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.docs.iter().find(|doc| doc.id() == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut T> {
        let index = self.position(id)?;
        self.journal
            .push((id, Undo::Replaced(index, self.docs[index].clone())));
        Some(&mut self.docs[index])
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn insert(&mut self, doc: T) {
        let id = doc.id();
        match self.position(id) {
            Some(index) => {
                let old = std::mem::replace(&mut self.docs[index], doc);
                self.journal.push((id, Undo::Replaced(index, old)));
            }
            None => {
                self.docs.push(doc);
                self.journal.push((id, Undo::Inserted));
            }
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let index = self.position(id)?;
        let doc = self.docs.remove(index);
        self.journal.push((id, Undo::Removed(index, doc.clone())));
        Some(doc)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.docs.iter().position(|doc| doc.id() == id)
    }

    fn rollback(&mut self) {
        while let Some((id, undo)) = self.journal.pop() {
            match undo {
                Undo::Inserted => {
                    if let Some(index) = self.position(id) {
                        self.docs.remove(index);
                    }
                }
                Undo::Replaced(index, old) => self.docs[index] = old,
                Undo::Removed(index, old) => self.docs.insert(index, old),
            }
        }
    }

    fn commit(&mut self) {
        self.journal.clear();
    }

    /// One row per touched id: the current document, or `None` once removed.
    fn pending(&self, rows: &mut Vec<PendingRow>) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for (id, _) in &self.journal {
            if !seen.insert(*id) {
                continue;
            }
            let doc = match self.get(*id) {
                Some(doc) => Some(
                    serde_json::to_string(doc)
                        .map_err(|err| StoreError::Encode(T::COLLECTION, err))?,
                ),
                None => None,
            };
            rows.push(PendingRow {
                collection: T::COLLECTION,
                id: *id,
                doc,
            });
        }
        Ok(())
    }

    async fn load(conn: &mut SqliteConnection) -> Result<Self, StoreError> {
        let sql = format!("SELECT doc FROM {} ORDER BY rowid", T::COLLECTION);
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
        let docs = rows
            .iter()
            .map(|(doc,)| serde_json::from_str(doc))
            .collect::<Result<Vec<T>, _>>()
            .map_err(|err| StoreError::Corrupt(T::COLLECTION, err))?;
        Ok(Self {
            docs,
            journal: Vec::new(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Collections {
    pub users: Collection<User>,
    pub courses: Collection<Course>,
    pub questions: Collection<Question>,
    pub quizzes: Collection<Quiz>,
    pub submissions: Collection<Submission>,
    pub posts: Collection<Post>,
    pub projects: Collection<Project>,
    pub ideas: Collection<Idea>,
    pub notifications: Collection<Notification>,
}

impl Collections {
    async fn load(conn: &mut SqliteConnection) -> Result<Self, StoreError> {
        Ok(Self {
            users: Collection::load(conn).await?,
            courses: Collection::load(conn).await?,
            questions: Collection::load(conn).await?,
            quizzes: Collection::load(conn).await?,
            submissions: Collection::load(conn).await?,
            posts: Collection::load(conn).await?,
            projects: Collection::load(conn).await?,
            ideas: Collection::load(conn).await?,
            notifications: Collection::load(conn).await?,
        })
    }

    fn pending(&self) -> Result<Vec<PendingRow>, StoreError> {
        let mut rows = Vec::new();
        self.users.pending(&mut rows)?;
        self.courses.pending(&mut rows)?;
        self.questions.pending(&mut rows)?;
        self.quizzes.pending(&mut rows)?;
        self.submissions.pending(&mut rows)?;
        self.posts.pending(&mut rows)?;
        self.projects.pending(&mut rows)?;
        self.ideas.pending(&mut rows)?;
        self.notifications.pending(&mut rows)?;
        Ok(rows)
    }

    fn rollback(&mut self) {
        self.users.rollback();
        self.courses.rollback();
        self.questions.rollback();
        self.quizzes.rollback();
        self.submissions.rollback();
        self.posts.rollback();
        self.projects.rollback();
        self.ideas.rollback();
        self.notifications.rollback();
    }

    fn commit(&mut self) {
        self.users.commit();
        self.courses.commit();
        self.questions.commit();
        self.quizzes.commit();
        self.submissions.commit();
        self.posts.commit();
        self.projects.commit();
        self.ideas.commit();
        self.notifications.commit();
    }
}

/// Undoes uncommitted changes when dropped, including while a write closure
/// unwinds from a panic.
struct Staged<'a>(&'a mut Collections);

impl Drop for Staged<'_> {
    fn drop(&mut self) {
        self.0.rollback();
    }
}

pub struct Database {
    collections: RwLock<Collections>,
    /// Held for the whole of a write, which also serializes writers.
    conn: Mutex<Option<SqliteConnection>>,
}

impl Database {
    /// A store that lives only in memory; nothing is written to disk.
    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
            conn: Mutex::new(None),
        }
    }

    /// Opens `<data_dir>/cogitosphere.db` and loads every collection.
    ///
    /// The connection keeps an exclusive lock on the file for as long as the
    /// store is open, so a second process fails with [`StoreError::Locked`]
    /// instead of writing behind this one's back.
    pub async fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let path = data_dir.join(DB_FILE);
        let locked = |err: sqlx::Error| {
            if is_busy(&err) {
                StoreError::Locked(data_dir.to_path_buf())
            } else {
                StoreError::Sqlx(err)
            }
        };

        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .locking_mode(SqliteLockingMode::Exclusive)
            .busy_timeout(LOCK_TIMEOUT)
            .connect()
            .await
            .map_err(locked)?;

        sqlx::query("BEGIN EXCLUSIVE")
            .execute(&mut conn)
            .await
            .map_err(locked)?;
        for table in TABLES {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {table} \
                 (id TEXT PRIMARY KEY NOT NULL, doc TEXT NOT NULL)"
            );
            sqlx::query(&sql).execute(&mut conn).await?;
        }
        sqlx::query("COMMIT").execute(&mut conn).await?;

        let collections = Collections::load(&mut conn).await?;
        tracing::info!(
            users = collections.users.len(),
            courses = collections.courses.len(),
            quizzes = collections.quizzes.len(),
            "opened document store at {}",
            path.display()
        );
        Ok(Self {
            collections: RwLock::new(collections),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Closes the connection and releases the file lock.
    pub async fn close(self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.into_inner() {
            conn.close().await?;
        }
        Ok(())
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Collections) -> R) -> R {
        let guard = self.collections.read().await;
        f(&guard)
    }

    /// Runs `f` and persists what it touched. Nothing is kept, in memory or
    /// on disk, unless both `f` and the commit succeed.
    pub async fn write<R, E>(
        &self,
        f: impl FnOnce(&mut Collections) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().await;
        let mut collections = self.collections.write().await;
        let mut staged = Staged(&mut *collections);

        let value = f(&mut *staged.0)?;
        if let Some(conn) = conn.as_mut() {
            persist(conn, &*staged.0).await?;
        }
        staged.0.commit();
        Ok(value)
    }
}

async fn persist(conn: &mut SqliteConnection, collections: &Collections) -> Result<(), StoreError> {
    let rows = collections.pending()?;
    if rows.is_empty() {
        return Ok(());
    }

    let mut tx = conn.begin().await?;
    for row in &rows {
        match row.doc.as_deref() {
            Some(doc) => {
                let sql = format!(
                    "INSERT INTO {} (id, doc) VALUES (?1, ?2) \
                     ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
                    row.collection
                );
                sqlx::query(&sql)
                    .bind(row.id.to_string())
                    .bind(doc)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                let sql = format!("DELETE FROM {} WHERE id = ?1", row.collection);
                sqlx::query(&sql)
                    .bind(row.id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }
    tx.commit().await?;
    tracing::debug!(rows = rows.len(), "committed document changes");
    Ok(())
}

fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| code & 0xff == SQLITE_BUSY),
        _ => false,
    }
}
