//! Durable embedding store: CRUD plus cosine similarity search.
//!
//! One store per project index directory. Every write commits before the
//! call returns, so a search started after a write's return is guaranteed
//! to see it; a search already in flight when a write commits may still
//! observe the pre-write state.
//!
//! Concurrency discipline: a single-writer/multi-reader lock. Writes are
//! mutually exclusive with each other and with searches; searches run
//! concurrently with each other. A second process trying to open the same
//! index directory fails fast on the single-instance file lock.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use fs2::FileExt;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Result, StoreError};
use crate::filter::DocumentFilter;
use crate::models::{Document, DocumentMatch, KEY_LAST_INDEXED_DATE};

/// Lock file name inside an index directory.
const LOCK_FILE: &str = "index.lock";

/// Advisory exclusive lock on the index directory. Released on drop.
#[derive(Debug)]
struct IndexLock {
    file: std::fs::File,
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

impl IndexLock {
    /// Try to take the lock without blocking; contention is a hard error.
    fn acquire(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|source| StoreError::Locked {
            path: index_dir.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

/// Persistent vector store over [`Document`]s.
#[derive(Debug)]
pub struct EmbeddingStore {
    pool: SqlitePool,
    /// Guards the writer/searcher discipline, not the data itself: SQLite
    /// already serializes its own file access.
    rw: RwLock<()>,
    dims: usize,
    lock: Mutex<Option<IndexLock>>,
}

impl EmbeddingStore {
    /// Open the store at `index_dir` for vectors of `dims` length.
    ///
    /// Acquires the single-instance lock first: if another process holds
    /// the index open this fails immediately with [`StoreError::Locked`].
    pub async fn open(index_dir: impl AsRef<Path>, dims: usize) -> Result<Self> {
        let index_dir = index_dir.as_ref();
        std::fs::create_dir_all(index_dir)?;
        let lock = IndexLock::acquire(index_dir)?;

        let pool = db::connect(index_dir).await?;
        db::init_schema(&pool).await?;
        debug!(dir = %index_dir.display(), dims, "opened embedding store");

        Ok(Self {
            pool,
            rw: RwLock::new(()),
            dims,
            lock: Mutex::new(Some(lock)),
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Store a bare vector under a fresh random id. Commits before returning.
    pub async fn add(&self, vector: &[f32]) -> Result<String> {
        let doc = Document::with_id(Uuid::new_v4().to_string(), "", Default::default());
        let id = doc.id.clone();
        self.write_one(vector, &doc).await?;
        Ok(id)
    }

    /// Store a document with its vector. The document's id decides the row:
    /// re-adding under the same id overwrites the previous entry.
    /// Commits before returning.
    pub async fn add_with_document(&self, vector: &[f32], document: &Document) -> Result<String> {
        if document.is_blank() {
            return Err(StoreError::EmptyDocument {
                id: document.id.clone(),
            });
        }
        self.write_one(vector, document).await?;
        Ok(document.id.clone())
    }

    async fn write_one(&self, vector: &[f32], document: &Document) -> Result<()> {
        self.check_dims(vector)?;
        let _guard = self.rw.write().await;

        let stamp = write_stamp();
        let mut tx = self.pool.begin().await?;
        upsert_row(&mut tx, document, vector, &stamp).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Store a whole batch in one transaction (one durability cost for the
    /// batch). Returns ids in input order.
    pub async fn add_all(
        &self,
        vectors: Vec<Vec<f32>>,
        documents: Vec<Document>,
    ) -> Result<Vec<String>> {
        if vectors.len() != documents.len() {
            return Err(StoreError::BatchMismatch {
                vectors: vectors.len(),
                documents: documents.len(),
            });
        }
        for vector in &vectors {
            self.check_dims(vector)?;
        }
        for document in &documents {
            if document.is_blank() {
                return Err(StoreError::EmptyDocument {
                    id: document.id.clone(),
                });
            }
        }

        let _guard = self.rw.write().await;

        let stamp = write_stamp();
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(documents.len());
        for (vector, document) in vectors.iter().zip(documents.iter()) {
            upsert_row(&mut tx, document, vector, &stamp).await?;
            ids.push(document.id.clone());
        }
        tx.commit().await?;
        Ok(ids)
    }

    /// Delete every document. Used for full reset.
    pub async fn remove_all(&self) -> Result<()> {
        let _guard = self.rw.write().await;
        sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete by exact id match (logical OR across the given ids).
    pub async fn remove_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let _guard = self.rw.write().await;
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete by structured filter. Only [`DocumentFilter::IdPrefix`] is
    /// translatable; any other kind is rejected without touching the store.
    pub async fn remove_matching(&self, filter: &DocumentFilter) -> Result<()> {
        let prefix = match filter {
            DocumentFilter::IdPrefix(prefix) => prefix,
            other => return Err(StoreError::UnsupportedFilter(other.kind())),
        };

        let _guard = self.rw.write().await;
        sqlx::query("DELETE FROM documents WHERE id LIKE ? ESCAPE '\\'")
            .bind(like_prefix(prefix))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rank all committed documents by cosine similarity to `query` and
    /// return the top `max_results`.
    pub async fn search(&self, query: &[f32], max_results: usize) -> Result<Vec<DocumentMatch>> {
        self.check_dims(query)?;
        let _guard = self.rw.read().await;

        let rows = sqlx::query(
            "SELECT id, body, embedding, metadata_json, last_indexed_date FROM documents",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let body: String = row.get("body");
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let last_indexed: String = row.get("last_indexed_date");

            let mut metadata: std::collections::BTreeMap<String, String> =
                serde_json::from_str(&metadata_json).map_err(|source| {
                    StoreError::MetadataCorrupt {
                        id: id.clone(),
                        source,
                    }
                })?;
            metadata.insert(KEY_LAST_INDEXED_DATE.to_string(), last_indexed);

            let score = cosine_similarity(query, &blob_to_vec(&blob)) as f64;
            matches.push(DocumentMatch {
                score,
                id: id.clone(),
                document: Document::with_id(id, body, metadata),
            });
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(max_results);
        Ok(matches)
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<u64> {
        let _guard = self.rw.read().await;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    /// Flush and release the pool and the single-instance lock. Idempotent.
    pub async fn close(&self) -> Result<()> {
        let _guard = self.rw.write().await;
        self.pool.close().await;
        if let Ok(mut slot) = self.lock.lock() {
            slot.take();
        }
        Ok(())
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

async fn upsert_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    document: &Document,
    vector: &[f32],
    stamp: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, body, embedding, metadata_json, last_indexed_date)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            body = excluded.body,
            embedding = excluded.embedding,
            metadata_json = excluded.metadata_json,
            last_indexed_date = excluded.last_indexed_date
        "#,
    )
    .bind(&document.id)
    .bind(&document.text)
    .bind(vec_to_blob(vector))
    .bind(serialize_metadata(document))
    .bind(stamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Serialize the metadata map, degrading to an empty blob on failure
/// rather than failing the whole write. Serialization cannot fail while
/// metadata is a string-to-string map; the branch only fires if richer
/// value types are ever stored.
fn serialize_metadata(document: &Document) -> String {
    match serde_json::to_string(&document.metadata) {
        Ok(json) => json,
        Err(err) => {
            warn!(id = %document.id, %err, "metadata serialization failed, storing empty metadata");
            "{}".to_string()
        }
    }
}

fn write_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Build a `LIKE` pattern matching ids that start with `prefix`, escaping
/// the wildcard characters.
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if c == '%' || c == '_' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("/src/a"), "/src/a%");
        assert_eq!(like_prefix("a_b%c"), "a\\_b\\%c%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
    }
}
