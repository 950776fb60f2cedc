/// SQLite-backed implementation of DocumentCatalog
///
/// Uses sqlx with WAL mode and an FTS5 external-content table for the
/// full-text leg. Runs migrations automatically on initialization.

use async_trait::async_trait;
use sqlx::{
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
    Row,
};

use crate::errors::SignalError;
use crate::store::{Category, DocumentCatalog, DocumentRecord, Embedding, IndexHit};

/// SQLite-backed document catalog using an sqlx connection pool.
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (or create) the catalog at db_path and run pending migrations.
    ///
    /// `sqlite::memory:` gives a private in-memory catalog held by a single
    /// connection that is never recycled, so the data lives as long as the pool.
    pub async fn new(db_path: &str) -> Result<Self, SignalError> {
        // Strip "sqlite://" prefix if present for SqliteConnectOptions
        let path = db_path.strip_prefix("sqlite://").unwrap_or(db_path);
        let in_memory = path.contains(":memory:");

        let opts = path
            .parse::<SqliteConnectOptions>()
            .map_err(|e| SignalError::Storage(format!("Invalid db_path '{}': {}", db_path, e)))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        let opts = if in_memory {
            opts
        } else {
            opts.journal_mode(SqliteJournalMode::Wal)
        };

        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_opts
            .connect_with(opts)
            .await
            .map_err(|e| SignalError::Storage(format!("Failed to connect to database: {}", e)))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::debug!(db_path = %db_path, in_memory, "SQLite catalog ready");
        Ok(SqliteCatalog { pool })
    }
}

/// FTS5 MATCH expression: every token quoted, joined with OR.
fn fts_disjunction(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Map a documents row to a DocumentRecord manually (embedding is stored as JSON text).
fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentRecord, SignalError> {
    let doc_id: String = row.try_get("doc_id")?;
    let title: String = row.try_get("title")?;
    let full_text: String = row.try_get("text")?;
    let category_str: String = row.try_get("category")?;
    let embedding_str: String = row.try_get("embedding")?;

    let category = category_str.parse::<Category>().map_err(SignalError::Storage)?;
    let embedding: Embedding = serde_json::from_str(&embedding_str).map_err(|e| {
        SignalError::Storage(format!("Parse embedding for '{}': {}", doc_id, e))
    })?;

    Ok(DocumentRecord {
        doc_id,
        title,
        full_text,
        category,
        embedding,
    })
}

#[async_trait]
impl DocumentCatalog for SqliteCatalog {
    async fn get_by_doc_id(&self, doc_id: &str) -> Result<Option<DocumentRecord>, SignalError> {
        let row = sqlx::query(
            "SELECT doc_id, title, text, category, embedding FROM documents WHERE doc_id = ?",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn search(
        &self,
        tokens: &[String],
        max_results: usize,
    ) -> Result<Vec<IndexHit>, SignalError> {
        if tokens.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT d.doc_id, d.title, d.text, documents_fts.rank AS bm25_rank \
             FROM documents_fts \
             JOIN documents d ON d.rowid = documents_fts.rowid \
             WHERE documents_fts MATCH ? \
             ORDER BY documents_fts.rank \
             LIMIT ?",
        )
        .bind(fts_disjunction(tokens))
        .bind(max_results as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<IndexHit, SignalError> {
                Ok(IndexHit {
                    doc_id: row.try_get("doc_id")?,
                    title: row.try_get("title")?,
                    text: row.try_get("text")?,
                    rank: row.try_get("bm25_rank")?,
                })
            })
            .collect()
    }

    async fn insert(&self, doc: &DocumentRecord) -> Result<(), SignalError> {
        let embedding_json = serde_json::to_string(&doc.embedding)
            .map_err(|e| SignalError::Internal(format!("Serialize embedding: {}", e)))?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT rowid, title, text FROM documents WHERE doc_id = ?")
            .bind(&doc.doc_id)
            .fetch_optional(&mut *tx)
            .await?;

        let rowid: i64 = match existing {
            Some(row) => {
                let rowid: i64 = row.try_get("rowid")?;
                let old_title: String = row.try_get("title")?;
                let old_text: String = row.try_get("text")?;
                // External-content FTS tables need the old values to remove an entry.
                sqlx::query(
                    "INSERT INTO documents_fts(documents_fts, rowid, title, text) \
                     VALUES('delete', ?, ?, ?)",
                )
                .bind(rowid)
                .bind(old_title)
                .bind(old_text)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "UPDATE documents SET title = ?, text = ?, category = ?, embedding = ? \
                     WHERE doc_id = ?",
                )
                .bind(&doc.title)
                .bind(&doc.full_text)
                .bind(doc.category.as_str())
                .bind(&embedding_json)
                .bind(&doc.doc_id)
                .execute(&mut *tx)
                .await?;
                rowid
            }
            None => sqlx::query(
                "INSERT INTO documents (doc_id, title, text, category, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&doc.doc_id)
            .bind(&doc.title)
            .bind(&doc.full_text)
            .bind(doc.category.as_str())
            .bind(&embedding_json)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        sqlx::query("INSERT INTO documents_fts(rowid, title, text) VALUES (?, ?, ?)")
            .bind(rowid)
            .bind(&doc.title)
            .bind(&doc.full_text)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, SignalError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn clear(&self) -> Result<(), SignalError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO documents_fts(documents_fts) VALUES('delete-all')")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_catalog() -> SqliteCatalog {
        SqliteCatalog::new("sqlite::memory:")
            .await
            .expect("Failed to create in-memory catalog")
    }

    fn doc(id: &str, title: &str, text: &str, category: Category) -> DocumentRecord {
        DocumentRecord {
            doc_id: id.to_string(),
            title: title.to_string(),
            full_text: text.to_string(),
            category,
            embedding: [0.5, -0.5, 0.25, -0.25, 0.0, 1.0, -1.0, 0.125],
        }
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let catalog = create_test_catalog().await;
        let record = doc(
            "SEC001",
            "Firewalls",
            "Firewalls filter network traffic",
            Category::Cybersecurity,
        );
        catalog.insert(&record).await.expect("insert failed");

        let fetched = catalog.get_by_doc_id("SEC001").await.expect("get failed");
        assert_eq!(fetched, Some(record));
        assert_eq!(catalog.get_by_doc_id("NOPE").await.expect("get failed"), None);
        assert_eq!(catalog.count().await.expect("count failed"), 1);
    }

    #[tokio::test]
    async fn test_search_is_disjunctive_and_ranked() {
        let catalog = create_test_catalog().await;
        catalog
            .insert(&doc(
                "A",
                "Rust async",
                "tokio runtime and async rust futures",
                Category::WebDevelopment,
            ))
            .await
            .unwrap();
        catalog
            .insert(&doc("B", "Gardening", "tomatoes need sun", Category::DataScience))
            .await
            .unwrap();
        catalog
            .insert(&doc("C", "Tokio", "a runtime", Category::CloudComputing))
            .await
            .unwrap();

        let hits = catalog.search(&tokens(&["rust", "tokio"]), 10).await.expect("search failed");
        let ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(hits.len(), 2);
        assert!(ids.contains(&"A") && ids.contains(&"C"));
        assert!(hits.iter().all(|h| h.rank <= 0.0), "bm25 ranks are non-positive");
        assert!(hits[0].rank <= hits[1].rank, "best (most negative) rank first");
    }

    #[tokio::test]
    async fn test_search_respects_max_results_and_empty_tokens() {
        let catalog = create_test_catalog().await;
        for i in 0..5 {
            catalog
                .insert(&doc(
                    &format!("D{}", i),
                    "Kubernetes",
                    "kubernetes clusters",
                    Category::CloudComputing,
                ))
                .await
                .unwrap();
        }
        assert_eq!(catalog.search(&tokens(&["kubernetes"]), 3).await.unwrap().len(), 3);
        assert!(catalog.search(&[], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_tolerates_fts_keywords_and_quotes() {
        let catalog = create_test_catalog().await;
        catalog
            .insert(&doc("Q", "Near", "near and not or", Category::DataScience))
            .await
            .unwrap();
        let hits = catalog
            .search(&tokens(&["NEAR", "AND", "say \"hi\""]), 5)
            .await
            .expect("keywords must be quoted");
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_reinsert_replaces_index_entry() {
        let catalog = create_test_catalog().await;
        catalog
            .insert(&doc("X", "Old", "legacy mainframe", Category::CloudComputing))
            .await
            .unwrap();
        catalog
            .insert(&doc("X", "New", "serverless functions", Category::CloudComputing))
            .await
            .unwrap();

        assert_eq!(catalog.count().await.unwrap(), 1);
        assert!(catalog.search(&tokens(&["mainframe"]), 5).await.unwrap().is_empty());
        assert_eq!(catalog.search(&tokens(&["serverless"]), 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_documents_and_index() {
        let catalog = create_test_catalog().await;
        catalog
            .insert(&doc("Z", "Encryption", "encryption at rest", Category::Cybersecurity))
            .await
            .unwrap();
        catalog.clear().await.expect("clear failed");
        assert_eq!(catalog.count().await.unwrap(), 0);
        assert!(catalog.search(&tokens(&["encryption"]), 5).await.unwrap().is_empty());
    }
}
