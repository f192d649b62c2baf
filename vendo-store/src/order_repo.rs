use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use vendo_order::models::Order;
use vendo_order::repository::{OrderRepoError, OrderRepository};

/// Postgres-backed order repository. The order aggregate is stored as a
/// JSONB document alongside a `version` column; every `save` is a
/// compare-and-swap on that column.
pub struct PgOrderRepository {
    pool: PgPool,
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    version: i64,
    document: serde_json::Value,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    fn hydrate(row: OrderRow) -> Result<Order, OrderRepoError> {
        let mut order: Order = serde_json::from_value(row.document)
            .map_err(|e| OrderRepoError::Storage(format!("corrupt order document: {e}")))?;
        // The column is authoritative; the document copy may lag behind.
        order.version = row.version as u64;
        Ok(order)
    }
}

fn storage_err(e: sqlx::Error) -> OrderRepoError {
    OrderRepoError::Storage(e.to_string())
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), OrderRepoError> {
        let document = serde_json::to_value(order)
            .map_err(|e| OrderRepoError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, version, document, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(order.version as i64)
        .bind(document)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderRepoError> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT version, document FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        row.map(Self::hydrate).transpose()
    }

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, OrderRepoError> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT version, document FROM orders WHERE order_number = $1")
                .bind(order_number)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        row.map(Self::hydrate).transpose()
    }

    async fn find_by_tracking(&self, key: &str) -> Result<Option<Order>, OrderRepoError> {
        // Matches the legacy top-level tracking number or any vendor
        // shipment's tracking number / shipment id.
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT version, document FROM orders
            WHERE document->>'tracking_number' = $1
               OR EXISTS (
                   SELECT 1 FROM jsonb_array_elements(document->'vendor_shipments') AS s
                   WHERE s->>'tracking_number' = $1 OR s->>'shipment_id' = $1
               )
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(Self::hydrate).transpose()
    }

    async fn save(&self, order: &Order) -> Result<u64, OrderRepoError> {
        let new_version = order.version + 1;
        let mut updated = order.clone();
        updated.version = new_version;
        let document = serde_json::to_value(&updated)
            .map_err(|e| OrderRepoError::Storage(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET version = $1, document = $2, updated_at = NOW()
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(new_version as i64)
        .bind(document)
        .bind(order.id)
        .bind(order.version as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a losing writer
            let exists: Option<i64> = sqlx::query("SELECT version FROM orders WHERE id = $1")
                .bind(order.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?
                .map(|row| row.get("version"));

            return match exists {
                Some(_) => Err(OrderRepoError::VersionConflict {
                    order_id: order.id,
                    expected: order.version,
                }),
                None => Err(OrderRepoError::NotFound(order.id.to_string())),
            };
        }

        Ok(new_version)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderRepoError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT version, document FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Self::hydrate).collect()
    }
}
