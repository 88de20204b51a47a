//! Pooled access to conversations, messages, and mission logs

use crate::schema;
use chrono::{DateTime, Utc};
use intelscout_core::types::{truncate_chars, QUERY_TRUNCATE_CHARS, TITLE_TRUNCATE_CHARS};
use intelscout_core::{
    Conversation, IntelScoutError, Message, MessageRole, MissionLog, MissionStatus, Result,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Connections are recycled after this long, keeping long-lived pools from
/// pinning stale file handles.
const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(300);

/// Aggregate mission counters for the stats interface.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MissionStats {
    pub total_missions: u64,
    pub completed_missions: u64,
    pub failed_missions: u64,
}

/// The relational audit log. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct RelationalLog {
    pool: Pool<SqliteConnectionManager>,
}

impl RelationalLog {
    /// Open (or create) the database at `database_url` and apply the schema.
    ///
    /// `":memory:"` maps to a shared-cache in-memory database so every pooled
    /// connection sees the same data.
    pub fn open(database_url: &str, pool_size: u32) -> Result<Self> {
        let manager = if database_url == ":memory:" {
            SqliteConnectionManager::file("file:intelscout_mem?mode=memory&cache=shared")
                .with_flags(
                    rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                        | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                        | rusqlite::OpenFlags::SQLITE_OPEN_URI,
                )
        } else {
            SqliteConnectionManager::file(database_url)
        };

        let pool = Pool::builder()
            .max_size(pool_size)
            .max_lifetime(Some(CONNECTION_MAX_LIFETIME))
            .build(manager)
            .map_err(|e| IntelScoutError::Storage {
                message: format!("failed to open connection pool for '{database_url}'"),
                source: Some(Box::new(e)),
            })?;

        let log = Self { pool };
        let conn = log.conn()?;
        schema::apply(&conn)?;
        info!(database_url, pool_size, "relational log ready");
        Ok(log)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| IntelScoutError::Storage {
            message: "failed to acquire pooled connection".to_string(),
            source: Some(Box::new(e)),
        })
    }

    /// Lightweight liveness probe for health checks.
    pub fn ping(&self) -> Result<()> {
        self.conn()?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(storage_err("ping failed"))
    }

    // ---- conversations -------------------------------------------------

    /// Fetch an existing conversation, or create one titled after the first
    /// user input (truncated).
    pub fn ensure_conversation(&self, id: Option<i64>, first_input: &str) -> Result<Conversation> {
        if let Some(id) = id {
            if let Some(existing) = self.get_conversation(id)? {
                return Ok(existing);
            }
        }
        let now = Utc::now();
        let title = truncate_chars(first_input.trim(), TITLE_TRUNCATE_CHARS);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (title, created_at, updated_at) VALUES (?1, ?2, ?3)",
            params![title, now.to_rfc3339(), now.to_rfc3339()],
        )
        .map_err(storage_err("failed to insert conversation"))?;
        let id = conn.last_insert_rowid();
        debug!(conversation_id = id, "created conversation");
        Ok(Conversation {
            id,
            title: Some(title),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<Conversation>> {
        self.conn()?
            .query_row(
                "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
                params![id],
                row_to_conversation,
            )
            .optional()
            .map_err(storage_err("failed to load conversation"))
    }

    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, created_at, updated_at FROM conversations
                 ORDER BY updated_at DESC",
            )
            .map_err(storage_err("failed to prepare conversation listing"))?;
        let rows = stmt
            .query_map([], row_to_conversation)
            .map_err(storage_err("failed to list conversations"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("failed to read conversation row"))
    }

    /// Bump `updated_at`, called whenever a mission or message lands.
    pub fn touch_conversation(&self, id: i64) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )
            .map_err(storage_err("failed to touch conversation"))?;
        Ok(())
    }

    // ---- messages ------------------------------------------------------

    pub fn append_message(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, role.as_str(), content, now.to_rfc3339()],
        )
        .map_err(storage_err("failed to append message"))?;
        Ok(Message {
            id: conn.last_insert_rowid(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, created_at FROM messages
                 WHERE conversation_id = ?1 ORDER BY id ASC",
            )
            .map_err(storage_err("failed to prepare message listing"))?;
        let rows = stmt
            .query_map(params![conversation_id], row_to_message)
            .map_err(storage_err("failed to list messages"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("failed to read message row"))
    }

    // ---- mission logs --------------------------------------------------

    /// Create a PENDING mission row. The query is truncated for the audit
    /// column; the full objective stays with the mission in memory.
    pub fn create_mission(&self, conversation_id: i64, query: &str) -> Result<MissionLog> {
        let now = Utc::now();
        let query = truncate_chars(query, QUERY_TRUNCATE_CHARS);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO mission_logs (conversation_id, query, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation_id,
                query,
                MissionStatus::Pending.as_str(),
                now.to_rfc3339()
            ],
        )
        .map_err(storage_err("failed to create mission log"))?;
        let id = conn.last_insert_rowid();
        info!(mission_id = id, conversation_id, "mission log created");
        Ok(MissionLog {
            id,
            conversation_id,
            query,
            response: None,
            status: MissionStatus::Pending,
            created_at: now,
        })
    }

    pub fn mark_mission_running(&self, id: i64) -> Result<()> {
        let updated = self
            .conn()?
            .execute(
                "UPDATE mission_logs SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![
                    MissionStatus::InProgress.as_str(),
                    id,
                    MissionStatus::Pending.as_str()
                ],
            )
            .map_err(storage_err("failed to mark mission running"))?;
        if updated == 0 {
            return Err(IntelScoutError::Storage {
                message: format!("mission {id} is not PENDING"),
                source: None,
            });
        }
        Ok(())
    }

    /// Record the terminal COMPLETED status with the full report text.
    pub fn complete_mission(&self, id: i64, report: &str) -> Result<()> {
        self.finish_mission(id, MissionStatus::Completed, report)
    }

    /// Record the terminal FAILED status with the partial/error response.
    pub fn fail_mission(&self, id: i64, reason: &str) -> Result<()> {
        self.finish_mission(id, MissionStatus::Failed, reason)
    }

    /// A mission reaches a terminal status at most once; a second attempt is
    /// a storage error rather than a silent overwrite.
    fn finish_mission(&self, id: i64, status: MissionStatus, response: &str) -> Result<()> {
        debug_assert!(status.is_terminal());
        let updated = self
            .conn()?
            .execute(
                "UPDATE mission_logs SET status = ?1, response = ?2
                 WHERE id = ?3 AND status IN (?4, ?5)",
                params![
                    status.as_str(),
                    response,
                    id,
                    MissionStatus::Pending.as_str(),
                    MissionStatus::InProgress.as_str()
                ],
            )
            .map_err(storage_err("failed to finalize mission"))?;
        if updated == 0 {
            return Err(IntelScoutError::Storage {
                message: format!("mission {id} already reached a terminal status"),
                source: None,
            });
        }
        info!(mission_id = id, status = %status, "mission finalized");
        Ok(())
    }

    pub fn get_mission(&self, id: i64) -> Result<Option<MissionLog>> {
        self.conn()?
            .query_row(
                "SELECT id, conversation_id, query, response, status, created_at
                 FROM mission_logs WHERE id = ?1",
                params![id],
                row_to_mission,
            )
            .optional()
            .map_err(storage_err("failed to load mission log"))
    }

    /// All reports, newest first.
    pub fn list_reports(&self) -> Result<Vec<MissionLog>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, query, response, status, created_at
                 FROM mission_logs ORDER BY created_at DESC, id DESC",
            )
            .map_err(storage_err("failed to prepare report listing"))?;
        let rows = stmt
            .query_map([], row_to_mission)
            .map_err(storage_err("failed to list reports"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("failed to read mission row"))
    }

    pub fn stats(&self) -> Result<MissionStats> {
        self.conn()?
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'COMPLETED'), 0),
                        COALESCE(SUM(status = 'FAILED'), 0)
                 FROM mission_logs",
                [],
                |row| {
                    Ok(MissionStats {
                        total_missions: row.get::<_, i64>(0)? as u64,
                        completed_missions: row.get::<_, i64>(1)? as u64,
                        failed_missions: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .map_err(storage_err("failed to compute mission stats"))
    }
}

fn storage_err<E>(message: &'static str) -> impl FnOnce(E) -> IntelScoutError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| IntelScoutError::Storage {
        message: message.to_string(),
        source: Some(Box::new(e)),
    }
}

fn parse_timestamp(text: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: parse_timestamp(row.get(2)?)?,
        updated_at: parse_timestamp(row.get(3)?)?,
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: MessageRole::from_str(&role).unwrap_or(MessageRole::User),
        content: row.get(3)?,
        created_at: parse_timestamp(row.get(4)?)?,
    })
}

fn row_to_mission(row: &Row<'_>) -> rusqlite::Result<MissionLog> {
    let status: String = row.get(4)?;
    Ok(MissionLog {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        query: row.get(2)?,
        response: row.get(3)?,
        status: MissionStatus::from_str(&status).unwrap_or(MissionStatus::Failed),
        created_at: parse_timestamp(row.get(5)?)?,
    })
}
