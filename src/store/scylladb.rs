use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use super::{OrderRepository, ReplaceOutcome};
use crate::domain::order::{Order, UserId};

// ============================================================================
// ScyllaDB Order Repository
// ============================================================================
//
// Tables:
// - orders          one JSON document per order, keyed by id
// - orders_by_user  lookup index for listing a user's orders, newest first
//
// Both tables are written in one batch on insert. Updates rewrite the
// document in place through a lightweight transaction conditioned on the
// updated_at the writer read; the index only carries immutable columns.
//
// ============================================================================

const CREATE_ORDERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS orders (
    id uuid PRIMARY KEY,
    user_id text,
    document text,
    created_at timestamp,
    updated_at timestamp
)";

const CREATE_ORDERS_BY_USER_TABLE: &str = "CREATE TABLE IF NOT EXISTS orders_by_user (
    user_id text,
    created_at timestamp,
    id uuid,
    PRIMARY KEY (user_id, created_at, id)
) WITH CLUSTERING ORDER BY (created_at DESC, id ASC)";

pub struct ScyllaOrderRepository {
    session: Arc<Session>,
}

impl ScyllaOrderRepository {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Open a session, then create the keyspace and tables if missing
    pub async fn connect(node: &str, keyspace: &str) -> Result<Self> {
        if !is_valid_identifier(keyspace) {
            bail!("Invalid keyspace name: {:?}", keyspace);
        }

        tracing::info!(node = node, keyspace = keyspace, "Connecting to ScyllaDB...");
        let session: Session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .with_context(|| format!("Failed to connect to ScyllaDB at {}", node))?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await?;
        session.use_keyspace(keyspace, false).await?;

        let repository = Self::new(Arc::new(session));
        repository.ensure_schema().await?;
        Ok(repository)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in [CREATE_ORDERS_TABLE, CREATE_ORDERS_BY_USER_TABLE] {
            self.session.query_unpaged(statement, &[]).await?;
        }
        tracing::debug!("Order tables ready");
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let result = self
            .session
            .query_unpaged("SELECT id FROM orders WHERE id = ?", (id,))
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(false),
        };

        Ok(matches!(rows_result.maybe_first_row::<(Uuid,)>(), Ok(Some(_))))
    }
}

#[async_trait]
impl OrderRepository for ScyllaOrderRepository {
    async fn insert(&self, order: &Order) -> Result<()> {
        let document = encode_document(order)?;

        let mut batch = Batch::default();
        batch.append_statement(
            "INSERT INTO orders (id, user_id, document, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        );
        batch.append_statement(
            "INSERT INTO orders_by_user (user_id, created_at, id) VALUES (?, ?, ?)",
        );

        self.session
            .batch(
                &batch,
                (
                    (
                        order.id,
                        order.user_id.as_str().to_string(),
                        document,
                        order.created_at,
                        order.updated_at,
                    ),
                    (order.user_id.as_str().to_string(), order.created_at, order.id),
                ),
            )
            .await?;

        tracing::debug!(order_id = %order.id, "Inserted order document");
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Order>> {
        let result = self
            .session
            .query_unpaged("SELECT document FROM orders WHERE id = ?", (id,))
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(String,)>()? {
            Some((document,)) => Ok(Some(decode_document(&document)?)),
            None => Ok(None),
        }
    }

    async fn replace(
        &self,
        order: &Order,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<ReplaceOutcome> {
        let document = encode_document(order)?;
        let result = self
            .session
            .query_unpaged(
                "UPDATE orders SET document = ?, updated_at = ? WHERE id = ? IF updated_at = ?",
                (document, order.updated_at, order.id, expected_updated_at),
            )
            .await?;

        let rows_result = result
            .into_rows_result()
            .context("Conditional update returned no result row")?;
        let applied = match rows_result.maybe_first_row::<Row>()? {
            Some(row) => matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true)))),
            None => bail!("Conditional update returned no result row"),
        };

        if applied {
            tracing::debug!(order_id = %order.id, "Replaced order document");
            Ok(ReplaceOutcome::Replaced)
        } else if self.exists(order.id).await? {
            Ok(ReplaceOutcome::Conflict)
        } else {
            Ok(ReplaceOutcome::Missing)
        }
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id FROM orders_by_user WHERE user_id = ?",
                (user_id.as_str().to_string(),),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(Vec::new()),
        };

        let mut ids = Vec::new();
        for row in rows_result.rows::<(Uuid,)>()? {
            let (id,) = row?;
            ids.push(id);
        }

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fetch(id).await? {
                Some(order) => orders.push(order),
                None => tracing::warn!(order_id = %id, "Index entry without order document"),
            }
        }
        Ok(orders)
    }

    fn backend_name(&self) -> &'static str {
        "scylla"
    }
}

// ============================================================================
// Document Encoding
// ============================================================================

fn encode_document(order: &Order) -> Result<String> {
    Ok(serde_json::to_string(order)?)
}

fn decode_document(document: &str) -> Result<Order> {
    serde_json::from_str(document).context("Corrupt order document")
}

/// CQL identifiers interpolated into DDL must be plain names
fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 48
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}
