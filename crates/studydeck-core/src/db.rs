//! SQLite persistence for study sessions, quiz results and tool state.

use crate::sync::ToolStateStore;
use crate::{Result, StudyError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use studydeck_types::{QuizResult, StudyAids, StudyMaterialInput, StudySession, ToolKey};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Fields needed to create a session; id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewStudySession {
    pub title: String,
    pub study_material: StudyMaterialInput,
    pub study_aids: StudyAids,
}

/// SQLite-based store for everything a user accumulates.
pub struct StudyStore {
    conn: Mutex<Connection>,
}

/// Column values of a `study_sessions` row before JSON decoding.
struct SessionRow {
    id: String,
    title: String,
    created_at: String,
    study_material: String,
    study_aids: String,
}

impl StudyStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests and throwaway servers.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Run `f` against the store on the blocking thread pool.
    ///
    /// Async callers go through here so SQLite work never sits on an
    /// executor thread.
    pub async fn call<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&StudyStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS study_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                study_material TEXT NOT NULL,
                study_aids TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_study_sessions_user
                ON study_sessions(user_id, created_at);

            CREATE TABLE IF NOT EXISTS quiz_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES study_sessions(id) ON DELETE CASCADE,
                score INTEGER NOT NULL,
                total INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_quiz_results_session ON quiz_results(session_id);

            CREATE TABLE IF NOT EXISTS tool_states (
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                tool TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, session_id, tool)
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert a new session for a user.
    pub fn insert_session(&self, user_id: Uuid, new: NewStudySession) -> Result<StudySession> {
        let session = StudySession {
            id: Uuid::new_v4(),
            title: new.title,
            created_at: Utc::now(),
            study_material: new.study_material,
            study_aids: new.study_aids,
            quiz_results: Vec::new(),
        };

        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO study_sessions (id, user_id, title, created_at, study_material, study_aids)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                session.id.to_string(),
                user_id.to_string(),
                session.title,
                session.created_at.to_rfc3339(),
                serde_json::to_string(&session.study_material)?,
                serde_json::to_string(&session.study_aids)?,
            ],
        )?;
        debug!(target: "studydeck::store", "Inserted session {} for user {}", session.id, user_id);
        Ok(session)
    }

    /// Get one of the user's sessions with its quiz results.
    pub fn get_session(&self, user_id: Uuid, id: Uuid) -> Result<Option<StudySession>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT * FROM study_sessions WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
                Self::read_session_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let quiz_results = Self::query_quiz_results(&conn, &row.id)?;
                Ok(Some(Self::decode_session(row, quiz_results)?))
            }
            None => Ok(None),
        }
    }

    /// The user's study history, newest session first.
    pub fn list_sessions(&self, user_id: Uuid) -> Result<Vec<StudySession>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM study_sessions WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id.to_string()], Self::read_session_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let quiz_results = Self::query_quiz_results(&conn, &row.id)?;
                Self::decode_session(row, quiz_results)
            })
            .collect()
    }

    /// Append a quiz attempt to a session.
    pub fn add_quiz_result(&self, session_id: Uuid, result: &QuizResult) -> Result<()> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM study_sessions WHERE id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StudyError::SessionNotFound(session_id));
        }

        conn.execute(
            "INSERT INTO quiz_results (session_id, score, total, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id.to_string(),
                result.score,
                result.total,
                result.date.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn query_quiz_results(conn: &Connection, session_id: &str) -> Result<Vec<QuizResult>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT score, total, created_at FROM quiz_results
            WHERE session_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )?;
        let results = stmt
            .query_map(params![session_id], |row| {
                let created_at: String = row.get(2)?;
                Ok(QuizResult {
                    score: row.get(0)?,
                    total: row.get(1)?,
                    date: parse_timestamp(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn read_session_row(row: &rusqlite::Row) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get("id")?,
            title: row.get("title")?,
            created_at: row.get("created_at")?,
            study_material: row.get("study_material")?,
            study_aids: row.get("study_aids")?,
        })
    }

    fn decode_session(row: SessionRow, quiz_results: Vec<QuizResult>) -> Result<StudySession> {
        Ok(StudySession {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            title: row.title,
            created_at: parse_timestamp(&row.created_at),
            study_material: serde_json::from_str(&row.study_material)?,
            study_aids: serde_json::from_str(&row.study_aids)?,
            quiz_results,
        })
    }
}

impl ToolStateStore for StudyStore {
    fn load(&self, key: &ToolKey) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM tool_states WHERE user_id = ?1 AND session_id = ?2 AND tool = ?3",
                params![
                    key.user_id.to_string(),
                    key.session_id.to_string(),
                    key.tool.as_str()
                ],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &ToolKey, state: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO tool_states (user_id, session_id, tool, state, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (user_id, session_id, tool)
            DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
            "#,
            params![
                key.user_id.to_string(),
                key.session_id.to_string(),
                key.tool.as_str(),
                serde_json::to_string(state)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn clear(&self, key: &ToolKey) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM tool_states WHERE user_id = ?1 AND session_id = ?2 AND tool = ?3",
            params![
                key.user_id.to_string(),
                key.session_id.to_string(),
                key.tool.as_str()
            ],
        )?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
