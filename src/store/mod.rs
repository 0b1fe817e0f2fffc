// ============================================================================
// Order Persistence
// ============================================================================
//
// One document per order, keyed by its id. Repositories only persist what the
// domain layer hands them; validation and timestamping happen before a record
// reaches this layer.
//
// ============================================================================

mod memory;
mod scylladb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::{Order, UserId};

pub use memory::InMemoryOrderRepository;
pub use scylladb::ScyllaOrderRepository;

/// Result of a conditional [`OrderRepository::replace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    /// No record has that id
    Missing,
    /// Another writer changed the record since it was read
    Conflict,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store a new record
    async fn insert(&self, order: &Order) -> anyhow::Result<()>;

    async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<Order>>;

    /// Overwrite an existing record, but only if its stored `updated_at` is
    /// still `expected_updated_at` (the value the caller read).
    async fn replace(
        &self,
        order: &Order,
        expected_updated_at: DateTime<Utc>,
    ) -> anyhow::Result<ReplaceOutcome>;

    /// Orders referencing `user_id`, newest first
    async fn list_for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Order>>;

    /// Name used in logs
    fn backend_name(&self) -> &'static str;
}
