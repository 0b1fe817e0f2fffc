use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderRepository, ReplaceOutcome};
use crate::domain::order::{Order, UserId};

/// Process-local repository. The `updated_at` precondition of `replace` is
/// checked under the write lock, so a stale writer can never overwrite a
/// newer record.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> anyhow::Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            anyhow::bail!("Order {} already exists", order.id);
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn replace(
        &self,
        order: &Order,
        expected_updated_at: DateTime<Utc>,
    ) -> anyhow::Result<ReplaceOutcome> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id) {
            Some(slot) if slot.updated_at != expected_updated_at => Ok(ReplaceOutcome::Conflict),
            Some(slot) => {
                *slot = order.clone();
                Ok(ReplaceOutcome::Replaced)
            }
            None => Ok(ReplaceOutcome::Missing),
        }
    }

    async fn list_for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| &order.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
