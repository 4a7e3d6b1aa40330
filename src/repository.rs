use crate::config::DatabaseTarget;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

const SQLITE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename VARCHAR(255) NOT NULL,
    content TEXT NOT NULL,
    summary TEXT NULL,
    uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS ix_documents_id ON documents (id);
CREATE INDEX IF NOT EXISTS ix_documents_filename ON documents (filename);
";

const MYSQL_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    filename VARCHAR(255) NOT NULL,
    content LONGTEXT NOT NULL,
    summary LONGTEXT NULL,
    uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    INDEX ix_documents_id (id),
    INDEX ix_documents_filename (filename)
) DEFAULT CHARSET = utf8mb4
";

const SELECT_COLUMNS: &str = "SELECT id, filename, content, summary, uploaded_at FROM documents";

/// Errors returned by the document repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database driver or pool failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// `DATABASE_URL` uses a scheme other than `sqlite:` or `mysql:`.
    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedUrl(String),
    /// Row disappeared between insert and read-back.
    #[error("Document {0} missing immediately after insert")]
    MissingAfterInsert(i64),
}

/// A stored upload with its extracted text and optional summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Document {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Original client filename.
    pub filename: String,
    /// Extracted text; never empty.
    pub content: String,
    /// Generated summary, `None` when summarization exhausted its retries.
    pub summary: Option<String>,
    /// Insertion time assigned by the database.
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

/// Fields supplied by the caller when creating a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Original client filename.
    pub filename: String,
    /// Extracted text.
    pub content: String,
    /// Summary or `None`.
    pub summary: Option<String>,
}

/// Append-only access to the `documents` table.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a document in a single statement and return the stored row.
    async fn create(&self, document: NewDocument) -> Result<Document, RepositoryError>;

    /// Fetch a document by id.
    async fn get(&self, id: i64) -> Result<Option<Document>, RepositoryError>;

    /// Most recent documents first, at most `limit` rows.
    async fn list(&self, limit: u32) -> Result<Vec<Document>, RepositoryError>;
}

/// sqlx-backed repository for SQLite or MySQL.
#[derive(Debug, Clone)]
pub enum SqlDocumentRepository {
    /// Embedded SQLite database.
    Sqlite(SqlitePool),
    /// MySQL server.
    MySql(MySqlPool),
}

impl SqlDocumentRepository {
    /// Open a connection pool for `target`. SQLite files are created when missing.
    pub async fn connect(
        target: &DatabaseTarget,
        max_connections: u32,
    ) -> Result<Self, RepositoryError> {
        match target {
            DatabaseTarget::Url(url) => Self::connect_url(url, max_connections).await,
            DatabaseTarget::Sqlite { path } => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true);
                Self::connect_sqlite(options, max_connections).await
            }
            DatabaseTarget::MySql {
                user,
                password,
                host,
                port,
                database,
            } => {
                let options = MySqlConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password)
                    .database(database)
                    .charset("utf8mb4");
                Self::connect_mysql(options, max_connections).await
            }
        }
    }

    async fn connect_url(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let (scheme, rest) = url
            .split_once(':')
            .ok_or_else(|| RepositoryError::UnsupportedUrl(url.to_string()))?;
        // Driver suffixes such as `mysql+pymysql` name the same server protocol.
        let engine = scheme.split('+').next().unwrap_or(scheme);

        match engine {
            "sqlite" => {
                let options = SqliteConnectOptions::from_str(&format!("sqlite:{rest}"))?
                    .create_if_missing(true);
                let max_connections = if rest.contains(":memory:") {
                    1
                } else {
                    max_connections
                };
                Self::connect_sqlite(options, max_connections).await
            }
            "mysql" | "mariadb" => {
                let options = MySqlConnectOptions::from_str(&format!("mysql:{rest}"))?;
                Self::connect_mysql(options, max_connections).await
            }
            other => Err(RepositoryError::UnsupportedUrl(other.to_string())),
        }
    }

    async fn connect_sqlite(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, RepositoryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        tracing::debug!(max_connections, "Connected to SQLite");
        Ok(Self::Sqlite(pool))
    }

    async fn connect_mysql(
        options: MySqlConnectOptions,
        max_connections: u32,
    ) -> Result<Self, RepositoryError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        tracing::debug!(max_connections, "Connected to MySQL");
        Ok(Self::MySql(pool))
    }

    /// Create the `documents` table and its indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Sqlite(pool) => {
                sqlx::raw_sql(SQLITE_SCHEMA).execute(pool).await?;
            }
            Self::MySql(pool) => {
                sqlx::raw_sql(MYSQL_SCHEMA).execute(pool).await?;
            }
        }
        tracing::info!(backend = self.backend(), "Document schema ready");
        Ok(())
    }

    /// Short backend name for logs.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::MySql(_) => "mysql",
        }
    }
}

#[async_trait]
impl DocumentRepository for SqlDocumentRepository {
    async fn create(&self, document: NewDocument) -> Result<Document, RepositoryError> {
        let stored = match self {
            Self::Sqlite(pool) => {
                sqlx::query_as::<_, Document>(
                    "INSERT INTO documents (filename, content, summary) VALUES (?, ?, ?) \
                     RETURNING id, filename, content, summary, uploaded_at",
                )
                .bind(&document.filename)
                .bind(&document.content)
                .bind(&document.summary)
                .fetch_one(pool)
                .await?
            }
            Self::MySql(pool) => {
                let result =
                    sqlx::query("INSERT INTO documents (filename, content, summary) VALUES (?, ?, ?)")
                        .bind(&document.filename)
                        .bind(&document.content)
                        .bind(&document.summary)
                        .execute(pool)
                        .await?;
                let id = result.last_insert_id() as i64;
                sqlx::query_as::<_, Document>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
                    .ok_or(RepositoryError::MissingAfterInsert(id))?
            }
        };

        tracing::debug!(
            id = stored.id,
            filename = %stored.filename,
            has_summary = stored.summary.is_some(),
            "Document inserted"
        );
        Ok(stored)
    }

    async fn get(&self, id: i64) -> Result<Option<Document>, RepositoryError> {
        let query = format!("{SELECT_COLUMNS} WHERE id = ?");
        let document = match self {
            Self::Sqlite(pool) => {
                sqlx::query_as::<_, Document>(&query)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
            Self::MySql(pool) => {
                sqlx::query_as::<_, Document>(&query)
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
        };
        Ok(document)
    }

    async fn list(&self, limit: u32) -> Result<Vec<Document>, RepositoryError> {
        let query = format!("{SELECT_COLUMNS} ORDER BY uploaded_at DESC, id DESC LIMIT ?");
        let limit = i64::from(limit);
        let documents = match self {
            Self::Sqlite(pool) => {
                sqlx::query_as::<_, Document>(&query)
                    .bind(limit)
                    .fetch_all(pool)
                    .await?
            }
            Self::MySql(pool) => {
                sqlx::query_as::<_, Document>(&query)
                    .bind(limit)
                    .fetch_all(pool)
                    .await?
            }
        };
        Ok(documents)
    }
}
