//! SQLite-backed book store.
//!
//! The rest of the crate consumes persistence through two primitives only:
//! point lookup by unique key and insert with uniqueness enforcement. The
//! unique constraints on `open_library_key` and `slug` are the
//! serialization points for concurrent writers; there is no in-process
//! locking here.

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::models::Book;

/// Store result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation error (wraps sqlx::Error)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error while creating the database file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Insert failure, with unique-constraint violations split out per column
/// so callers can react to each
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// A row with this `open_library_key` already exists
    #[error("a book with this catalog key already exists")]
    DuplicateKey,

    /// A row with this `slug` already exists
    #[error("a book with this slug already exists")]
    DuplicateSlug,

    /// Any other persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fields for a not-yet-persisted book row
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub open_library_key: Option<String>,
    pub cover_url: Option<String>,
    pub published_year: Option<i64>,
    pub description: Option<String>,
    pub slug: String,
}

/// Handle to the books table
#[derive(Debug, Clone)]
pub struct BookStore {
    pool: SqlitePool,
}

impl BookStore {
    /// Open (creating if needed) the database at the given path and ensure
    /// the schema exists.
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

        // WAL allows concurrent readers during resolver writes
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::create_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// In-memory store for tests. Single connection, since every SQLite
    /// in-memory connection is its own database.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::create_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn create_schema(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                open_library_key TEXT UNIQUE,
                cover_url TEXT,
                published_year INTEGER,
                description TEXT,
                slug TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// The underlying pool, for callers outside this subsystem
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Point lookup by external catalog key.
    ///
    /// `Ok(None)` means "no such row"; only genuine store failures come
    /// back as errors.
    pub async fn find_by_key(&self, open_library_key: &str) -> StoreResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE open_library_key = ?",
        )
        .bind(open_library_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Point lookup by slug.
    pub async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    /// Insert a new row, relying on the store-enforced unique constraints.
    pub async fn insert(&self, new: NewBook) -> Result<Book, InsertError> {
        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            author: new.author,
            open_library_key: new.open_library_key,
            cover_url: new.cover_url,
            published_year: new.published_year,
            description: new.description,
            slug: new.slug,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO books
                (id, title, author, open_library_key, cover_url,
                 published_year, description, slug, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.open_library_key)
        .bind(&book.cover_url)
        .bind(book.published_year)
        .bind(&book.description)
        .bind(&book.slug)
        .bind(book.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(book),
            Err(err) => Err(classify_insert_error(err)),
        }
    }
}

/// Split unique-constraint violations out of a raw insert error, per
/// column. SQLite reports them as
/// `UNIQUE constraint failed: books.<column>`.
fn classify_insert_error(err: sqlx::Error) -> InsertError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if message.contains("books.open_library_key") {
                return InsertError::DuplicateKey;
            }
            if message.contains("books.slug") {
                return InsertError::DuplicateSlug;
            }
        }
    }

    InsertError::Store(StoreError::Database(err))
}
