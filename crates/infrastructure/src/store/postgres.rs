//! PostgreSQL document store.

use super::{DocumentStore, RowStream, RowWrite, StoredRow, Visibility, WriteBatch, WriteKind};
use crate::database::TransactionExt;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use recipe_hub_domain::UniqueKey;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SELECT_ACTIVE: &str = r#"
    SELECT id, created_at, updated_at, is_deleted, deleted_at, document
    FROM entities
    WHERE table_name = $1 AND NOT is_deleted
    ORDER BY created_at, id
"#;

const SELECT_ALL: &str = r#"
    SELECT id, created_at, updated_at, is_deleted, deleted_at, document
    FROM entities
    WHERE table_name = $1
    ORDER BY created_at, id
"#;

/// Entities stored as JSONB documents in a single `entities` table, with unique
/// keys kept in `entity_unique_keys`.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("entity schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_row(row: &PgRow) -> Result<StoredRow> {
    Ok(StoredRow {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        is_deleted: row.try_get("is_deleted")?,
        deleted_at: row.try_get("deleted_at")?,
        document: row.try_get("document")?,
    })
}

/// Translate integrity errors (SQLSTATE class 23) into store errors.
fn classify(err: sqlx::Error, table: &str, key: Option<&UniqueKey>) -> Error {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code().map(|c| c.into_owned());
        match (code.as_deref(), key) {
            (Some("23505"), Some(key)) => {
                return Error::UniqueViolation {
                    table: table.to_string(),
                    key: key.name.to_string(),
                    value: key.value.clone(),
                };
            }
            (Some(code), _) if code.starts_with("23") => {
                return Error::Constraint(db.message().to_string());
            }
            _ => {}
        }
    }
    Error::Database(err)
}

async fn release_keys(tx: &mut Transaction<'_, Postgres>, write: &RowWrite) -> Result<()> {
    sqlx::query("DELETE FROM entity_unique_keys WHERE table_name = $1 AND entity_id = $2")
        .bind(write.table)
        .bind(write.row.id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn write_row(tx: &mut Transaction<'_, Postgres>, write: &RowWrite) -> Result<()> {
    let row = &write.row;

    match write.kind {
        WriteKind::Insert => {
            sqlx::query(
                r#"
                INSERT INTO entities (table_name, id, created_at, updated_at, is_deleted, deleted_at, document)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(write.table)
            .bind(row.id)
            .bind(row.created_at)
            .bind(row.updated_at)
            .bind(row.is_deleted)
            .bind(row.deleted_at)
            .bind(&row.document)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, write.table, None))?;
        }
        WriteKind::Update => {
            let updated = sqlx::query(
                r#"
                UPDATE entities
                SET updated_at = $3, is_deleted = $4, deleted_at = $5, document = $6
                WHERE table_name = $1 AND id = $2
                "#,
            )
            .bind(write.table)
            .bind(row.id)
            .bind(row.updated_at)
            .bind(row.is_deleted)
            .bind(row.deleted_at)
            .bind(&row.document)
            .execute(&mut **tx)
            .await
            .map_err(|e| classify(e, write.table, None))?;

            if updated.rows_affected() == 0 {
                return Err(Error::NotFound(format!("{}/{}", write.table, row.id)));
            }
        }
    }

    Ok(())
}

async fn claim_keys(tx: &mut Transaction<'_, Postgres>, write: &RowWrite) -> Result<()> {
    let row = &write.row;
    if row.is_deleted {
        return Ok(());
    }

    for key in &write.unique_keys {
        sqlx::query(
            r#"
            INSERT INTO entity_unique_keys (table_name, key_name, key_value, entity_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(write.table)
        .bind(key.name)
        .bind(&key.value)
        .bind(row.id)
        .execute(&mut **tx)
        .await
        .map_err(|e| classify(e, write.table, Some(key)))?;
    }

    Ok(())
}

/// Keys of every updated row are released before any key is claimed, so a
/// batch that swaps keys between its own rows succeeds in any order.
async fn apply_batch(tx: &mut Transaction<'_, Postgres>, batch: &WriteBatch) -> Result<u64> {
    for write in batch.iter().filter(|w| w.kind == WriteKind::Update) {
        release_keys(tx, write).await?;
    }
    for write in batch.iter() {
        write_row(tx, write).await?;
    }
    for write in batch.iter() {
        claim_keys(tx, write).await?;
    }
    Ok(batch.len() as u64)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn scan(&self, table: &'static str, visibility: Visibility) -> RowStream<'_> {
        let sql = match visibility {
            Visibility::Active => SELECT_ACTIVE,
            Visibility::All => SELECT_ALL,
        };

        sqlx::query(sql)
            .bind(table)
            .fetch(&self.pool)
            .map_err(Error::Database)
            .and_then(|row| futures::future::ready(decode_row(&row)))
            .boxed()
    }

    #[instrument(skip(self))]
    async fn fetch(&self, table: &'static str, id: Uuid) -> Result<Option<StoredRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at, updated_at, is_deleted, deleted_at, document
            FROM entities
            WHERE table_name = $1 AND id = $2
            "#,
        )
        .bind(table)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_row).transpose()
    }

    /// Cancellation is honoured until COMMIT is sent; after that the batch
    /// is either fully applied or rolled back by the server.
    #[instrument(skip(self, batch, cancel), fields(writes = batch.len()))]
    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut tx = self.pool.begin().await?;
        let applied = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = apply_batch(&mut tx, &batch) => result,
        };

        let written = tx.commit_or_rollback(applied).await?;
        debug!(written, "postgres batch committed");
        Ok(written)
    }
}
