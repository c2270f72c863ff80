use async_trait::async_trait;
use relist_core::models::{ExpiredItem, MigrationPlan};
use relist_core::repository::{CatalogStore, ListLockStore, ListWriter, SearchEngine};
use relist_core::search::{SearchHit, SearchQuery};
use relist_core::{WizardError, WizardResult};
use sqlx::PgPool;
use uuid::Uuid;

fn internal(context: &str, err: impl std::fmt::Display) -> WizardError {
    tracing::error!("{context}: {err}");
    WizardError::Internal(context.to_string())
}

// ---------------------------------------------------------------------------
// Catalog reads
// ---------------------------------------------------------------------------

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ExpiredItemRow {
    item_id: Uuid,
    product_id: Uuid,
    name: String,
    brand: Option<String>,
    store_id: Uuid,
    price_cents: i64,
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn expired_items(&self, list_id: Uuid) -> WizardResult<Vec<ExpiredItem>> {
        // An item is expired when no live offer backs its product+store
        // pair: the nightly batch archives rotated offers, and validity
        // windows handle the rest.
        let rows: Vec<ExpiredItemRow> = sqlx::query_as(
            r#"
            SELECT li.id AS item_id, li.product_id, p.name, p.brand, li.store_id, li.price_cents
            FROM list_items li
            JOIN products p ON p.id = li.product_id
            LEFT JOIN offers o
                ON o.product_id = li.product_id
                AND o.store_id = li.store_id
                AND o.archived = FALSE
                AND NOW() BETWEEN o.valid_from AND o.valid_to
            WHERE li.list_id = $1 AND o.id IS NULL
            ORDER BY li.id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("expired item query failed", e))?;

        Ok(rows
            .into_iter()
            .map(|r| ExpiredItem {
                item_id: r.item_id,
                product_id: r.product_id,
                name: r.name,
                brand: r.brand,
                store_id: r.store_id,
                price_cents: r.price_cents,
            })
            .collect())
    }

    async fn offer_is_valid(
        &self,
        product_id: Uuid,
        store_id: Uuid,
        price_cents: i64,
    ) -> WizardResult<bool> {
        let valid: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM offers o
                WHERE o.product_id = $1
                  AND o.store_id = $2
                  AND o.price_cents = $3
                  AND o.archived = FALSE
                  AND NOW() BETWEEN o.valid_from AND o.valid_to
            )
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .bind(price_cents)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| internal("offer validity query failed", e))?;
        Ok(valid)
    }
}

// ---------------------------------------------------------------------------
// List lock
// ---------------------------------------------------------------------------

pub struct PgListLockStore {
    pool: PgPool,
}

impl PgListLockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListLockStore for PgListLockStore {
    async fn holder(&self, list_id: Uuid) -> WizardResult<Option<Uuid>> {
        let row: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT locked_by_session FROM shopping_lists WHERE id = $1")
                .bind(list_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| internal("list lock read failed", e))?;
        row.ok_or_else(|| WizardError::NotFound(format!("list {list_id}")))
    }

    async fn try_lock(&self, list_id: Uuid, session_id: Uuid) -> WizardResult<bool> {
        // Atomic set-if-unset: the WHERE clause is the whole race guard.
        // The owning session id rides along so an orphaned lock stays
        // attributable and reclaimable.
        let result = sqlx::query(
            "UPDATE shopping_lists \
             SET is_locked = TRUE, locked_by_session = $2, updated_at = NOW() \
             WHERE id = $1 AND is_locked = FALSE",
        )
        .bind(list_id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| internal("list lock acquire failed", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn unlock(&self, list_id: Uuid) -> WizardResult<()> {
        sqlx::query(
            "UPDATE shopping_lists \
             SET is_locked = FALSE, locked_by_session = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(list_id)
        .execute(&self.pool)
        .await
        .map_err(|e| internal("list unlock failed", e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Confirmation transaction
// ---------------------------------------------------------------------------

pub struct PgListWriter {
    pool: PgPool,
}

impl PgListWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListWriter for PgListWriter {
    /// Applies the whole plan inside one transaction. Any failed step
    /// drops the transaction, which rolls everything back: the list is
    /// either fully migrated or untouched.
    async fn apply_migration(&self, plan: &MigrationPlan) -> WizardResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| internal("begin migration transaction failed", e))?;

        for replacement in &plan.replacements {
            sqlx::query(
                r#"
                INSERT INTO offer_snapshots (id, session_id, item_id, product_id, store_id, price_cents, applied_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(plan.session_id)
            .bind(replacement.item_id)
            .bind(replacement.product_id)
            .bind(replacement.store_id)
            .bind(replacement.price_cents)
            .execute(&mut *tx)
            .await
            .map_err(|e| internal("offer snapshot insert failed", e))?;

            let updated = sqlx::query(
                r#"
                UPDATE list_items
                SET product_id = $1, store_id = $2, price_cents = $3, updated_at = NOW()
                WHERE id = $4 AND list_id = $5
                "#,
            )
            .bind(replacement.product_id)
            .bind(replacement.store_id)
            .bind(replacement.price_cents)
            .bind(replacement.item_id)
            .bind(plan.list_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| internal("list item update failed", e))?;
            if updated.rows_affected() != 1 {
                return Err(internal(
                    "list item update failed",
                    format!("item {} missing from list {}", replacement.item_id, plan.list_id),
                ));
            }
        }

        for item_id in &plan.removals {
            let deleted = sqlx::query("DELETE FROM list_items WHERE id = $1 AND list_id = $2")
                .bind(item_id)
                .bind(plan.list_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| internal("list item delete failed", e))?;
            if deleted.rows_affected() != 1 {
                return Err(internal(
                    "list item delete failed",
                    format!("item {} missing from list {}", item_id, plan.list_id),
                ));
            }
        }

        tx.commit()
            .await
            .map_err(|e| internal("commit migration transaction failed", e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Candidate search
// ---------------------------------------------------------------------------

/// pg_trgm-backed candidate search. The output order mirrors the wizard's
/// tie-break contract so scoring starts from a stable base.
pub struct PgSearchEngine {
    pool: PgPool,
}

impl PgSearchEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SearchHitRow {
    product_id: Uuid,
    store_id: Uuid,
    name: String,
    brand: Option<String>,
    price_cents: i64,
    similarity: f64,
}

#[async_trait]
impl SearchEngine for PgSearchEngine {
    async fn find_similar(&self, query: &SearchQuery) -> WizardResult<Vec<SearchHit>> {
        let rows: Vec<SearchHitRow> = sqlx::query_as(
            r#"
            SELECT p.id AS product_id, o.store_id, p.name, p.brand, o.price_cents,
                   similarity(p.normalized_name, $1)::float8 AS similarity
            FROM products p
            JOIN offers o
                ON o.product_id = p.id
                AND o.archived = FALSE
                AND NOW() BETWEEN o.valid_from AND o.valid_to
            WHERE p.normalized_name % $1
              AND ($2::text IS NULL OR LOWER(p.brand) = LOWER($2))
            ORDER BY similarity DESC, o.price_cents ASC, p.id ASC
            LIMIT $3
            "#,
        )
        .bind(&query.name)
        .bind(query.brand.as_deref())
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| internal("candidate search query failed", e))?;

        Ok(rows
            .into_iter()
            .map(|r| SearchHit {
                product_id: r.product_id,
                store_id: r.store_id,
                name: r.name,
                brand: r.brand,
                price_cents: r.price_cents,
                similarity: r.similarity,
            })
            .collect())
    }
}
