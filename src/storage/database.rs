//! Transcript Database with Connection Pooling and Safe Transactions
//!
//! SQLite store for conversations, their messages and uploaded files:
//! - Connection pooling via r2d2
//! - Panic-safe transactions with automatic rollback
//! - WAL mode for concurrent readers while a chat is recording

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::chat::{AttachmentState, PersistenceSink, Role};
use crate::types::{ChatError, ConversationId, Result, ResultExt, Turn, TurnRole};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version
const SCHEMA_VERSION: u32 = 1;

/// Conversation row with its message count
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Stored chat message
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub is_user: bool,
    /// Backend role that handled the turn
    pub backend: Option<Role>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Stored attachment
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file_name: String,
    pub extracted_text: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    // One writer (the chat loop) plus a few readers (history, status)
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout_secs: 30,
        }
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context_fn(|| format!("Corrupted timestamp '{}'", raw))
}

impl Database {
    /// Open database with connection pooling at the specified path,
    /// creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| ChatError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| ChatError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Configure a new connection with production-ready settings.
    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            ChatError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// If the closure fails or panics the transaction is rolled back and an
    /// error is returned instead of poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit().with_context("Failed to commit transaction")?;
                Ok(value)
            }
            // Transaction will be rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(ChatError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    pub fn create_conversation(&self, title: &str) -> Result<ConversationId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (title, created_at) VALUES (?1, ?2)",
            params![title, Utc::now().to_rfc3339()],
        )
        .with_context("Failed to create conversation")?;
        Ok(ConversationId::new(conn.last_insert_rowid()))
    }

    /// Newest first
    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.title, c.created_at, COUNT(m.id)
                 FROM conversations c
                 LEFT JOIN messages m ON m.conversation_id = c.id
                 GROUP BY c.id
                 ORDER BY c.id DESC",
            )
            .with_context("Failed to prepare conversation query")?;

        let rows: Vec<(i64, String, String, i64)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context("Failed to fetch conversations")?;

        rows.into_iter()
            .map(|(id, title, created_at, count)| {
                Ok(ConversationSummary {
                    id: ConversationId::new(id),
                    title,
                    created_at: parse_timestamp(&created_at)?,
                    message_count: count as usize,
                })
            })
            .collect()
    }

    pub fn latest_conversation(&self) -> Result<Option<ConversationId>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM conversations ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .with_context("Failed to query latest conversation")?;
        Ok(id.map(ConversationId::new))
    }

    /// Remove a conversation with its messages and uploads.
    /// Returns whether it existed.
    pub fn delete_conversation(&self, conversation: ConversationId) -> Result<bool> {
        let id = conversation.get();
        self.transaction(move |conn| {
            conn.execute("DELETE FROM messages WHERE conversation_id = ?1", params![id])?;
            conn.execute(
                "DELETE FROM uploaded_files WHERE conversation_id = ?1",
                params![id],
            )?;
            let removed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub fn save_message(
        &self,
        conversation: ConversationId,
        is_user: bool,
        backend: Option<Role>,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (conversation_id, is_user, backend, text, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation.get(),
                is_user,
                backend.map(|r| r.key()),
                text,
                timestamp.to_rfc3339()
            ],
        )
        .with_context("Failed to save message")?;
        Ok(())
    }

    /// Messages of one conversation in insertion order
    pub fn load_messages(&self, conversation: ConversationId) -> Result<Vec<StoredMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT is_user, backend, text, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY id",
            )
            .with_context("Failed to prepare message query")?;

        let rows: Vec<(bool, Option<String>, String, String)> = stmt
            .query_map(params![conversation.get()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context("Failed to fetch messages")?;

        rows.into_iter()
            .map(|(is_user, backend, text, timestamp)| {
                Ok(StoredMessage {
                    is_user,
                    backend: backend.as_deref().and_then(|key| {
                        Role::ALL.into_iter().find(|role| role.key() == key)
                    }),
                    text,
                    timestamp: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    // =========================================================================
    // Uploads
    // =========================================================================

    pub fn record_upload(
        &self,
        conversation: ConversationId,
        file_name: &str,
        extracted_text: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO uploaded_files (conversation_id, file_name, extracted_text, uploaded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.get(),
                file_name,
                extracted_text,
                Utc::now().to_rfc3339()
            ],
        )
        .with_context("Failed to record upload")?;
        Ok(())
    }

    pub fn load_uploads(&self, conversation: ConversationId) -> Result<Vec<StoredUpload>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT file_name, extracted_text, uploaded_at
                 FROM uploaded_files
                 WHERE conversation_id = ?1
                 ORDER BY id",
            )
            .with_context("Failed to prepare upload query")?;

        let rows: Vec<(String, String, String)> = stmt
            .query_map(params![conversation.get()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context("Failed to fetch uploads")?;

        rows.into_iter()
            .map(|(file_name, extracted_text, uploaded_at)| {
                Ok(StoredUpload {
                    file_name,
                    extracted_text,
                    uploaded_at: parse_timestamp(&uploaded_at)?,
                })
            })
            .collect()
    }
}

impl PersistenceSink for Database {
    fn create_conversation(&self, title: &str) -> Result<ConversationId> {
        Database::create_conversation(self, title)
    }

    /// System turns are not transcript content and are skipped
    fn record_turn(&self, conversation: ConversationId, role: Role, turn: &Turn) -> Result<()> {
        match turn.role {
            TurnRole::System => Ok(()),
            TurnRole::User | TurnRole::Assistant => self.save_message(
                conversation,
                turn.role == TurnRole::User,
                Some(role),
                &turn.text,
                turn.timestamp,
            ),
        }
    }

    fn record_attachment(
        &self,
        conversation: ConversationId,
        attachment: &AttachmentState,
    ) -> Result<()> {
        self.record_upload(
            conversation,
            &attachment.file_name,
            &attachment.extracted_text,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db() -> Database {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        db.initialize().expect("Failed to initialize schema");
        db
    }

    #[test]
    fn test_open_in_memory() {
        let db = db();
        let conn = db.connection_for_test();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"conversations".to_string()));
        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"uploaded_files".to_string()));
    }

    impl Database {
        fn connection_for_test(&self) -> PooledConnection<SqliteConnectionManager> {
            self.conn().unwrap()
        }
    }

    #[test]
    fn test_messages_roundtrip_in_order() {
        let db = db();
        let id = db.create_conversation("Neuer Chat").unwrap();

        db.save_message(id, true, Some(Role::Analytical), "Zähle", Utc::now())
            .unwrap();
        db.save_message(id, false, Some(Role::Analytical), "3", Utc::now())
            .unwrap();
        db.save_message(id, false, None, "alt", Utc::now()).unwrap();

        let messages = db.load_messages(id).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].is_user);
        assert_eq!(messages[0].backend, Some(Role::Analytical));
        assert_eq!(messages[1].text, "3");
        assert_eq!(messages[2].backend, None);

        let other = db.create_conversation("leer").unwrap();
        assert!(db.load_messages(other).unwrap().is_empty());
    }

    #[test]
    fn test_list_conversations_newest_first() {
        let db = db();
        let first = db.create_conversation("erste").unwrap();
        let second = db.create_conversation("zweite").unwrap();
        db.save_message(first, true, None, "hallo", Utc::now())
            .unwrap();

        let list = db.list_conversations().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[0].message_count, 0);
        assert_eq!(list[1].title, "erste");
        assert_eq!(list[1].message_count, 1);
        assert_eq!(db.latest_conversation().unwrap(), Some(second));
    }

    #[test]
    fn test_sink_skips_system_turns() {
        let db = db();
        let id = PersistenceSink::create_conversation(&db, "t").unwrap();

        db.record_turn(id, Role::Conversational, &Turn::system("sys"))
            .unwrap();
        db.record_turn(id, Role::Conversational, &Turn::user("hi"))
            .unwrap();
        db.record_turn(id, Role::Conversational, &Turn::assistant("hallo"))
            .unwrap();

        let messages = db.load_messages(id).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert!(!messages[1].is_user);
    }

    #[test]
    fn test_uploads_and_delete() {
        let db = db();
        let id = db.create_conversation("mit Datei").unwrap();
        db.record_attachment(
            id,
            &AttachmentState {
                file_name: "report.pdf".to_string(),
                extracted_text: "Inhalt".to_string(),
            },
        )
        .unwrap();
        db.save_message(id, true, None, "hi", Utc::now()).unwrap();

        let uploads = db.load_uploads(id).unwrap();
        assert_eq!(uploads[0].file_name, "report.pdf");

        assert!(db.delete_conversation(id).unwrap());
        assert!(!db.delete_conversation(id).unwrap());
        assert!(db.load_uploads(id).unwrap().is_empty());
        assert!(db.load_messages(id).unwrap().is_empty());
    }

    #[test]
    fn test_transaction_panic_safety() {
        let db = db();

        let result = db.transaction(|_conn| {
            panic!("Intentional panic for testing");
            #[allow(unreachable_code)]
            Ok(())
        });

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("panicked"));
        assert!(db.create_conversation("still usable").is_ok());
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/chat.db");

        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        db.create_conversation("datei").unwrap();

        assert!(path.exists());
    }
}
