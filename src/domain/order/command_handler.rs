use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::store::{OrderRepository, ReplaceOutcome};
use crate::utils::Clock;

use super::aggregate::Order;
use super::commands::{OrderDraft, OrderPatch};
use super::errors::{OrderError, ValidationErrors, ViolationKind};
use super::value_objects::{StatusPolicy, UserId};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Validation → Timestamping → Repository
//
// Updates are read-modify-write. The write is conditional on the updatedAt
// that was read; on a conflict the patch is re-applied to the fresh record.
//
// ============================================================================

const MAX_UPDATE_ATTEMPTS: usize = 5;

pub struct OrderCommandHandler {
    repository: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
    policy: StatusPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl OrderCommandHandler {
    pub fn new(repository: Arc<dyn OrderRepository>, clock: Arc<dyn Clock>, policy: StatusPolicy) -> Self {
        Self {
            repository,
            clock,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Validate and persist a new order
    pub async fn create(&self, draft: OrderDraft) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.create_inner(&draft).await;
        self.observe("create", started, &result);

        if let Ok(order) = &result {
            if let Some(metrics) = &self.metrics {
                metrics.orders_created.inc();
            }
            tracing::info!(
                order_id = %order.id,
                user_id = %order.user_id,
                total_amount = %order.total_amount,
                payment_method = %order.payment_method,
                "Order created"
            );
        }
        result
    }

    async fn create_inner(&self, draft: &OrderDraft) -> Result<Order, OrderError> {
        let order = Order::create(Uuid::new_v4(), draft, self.clock.now())?;
        self.repository.insert(&order).await?;
        Ok(order)
    }

    /// Apply a partial update. The stored record is untouched on any failure.
    pub async fn update(&self, id: Uuid, patch: OrderPatch) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.update_inner(id, &patch).await;
        self.observe("update", started, &result);

        if let Ok(order) = &result {
            if let Some(metrics) = &self.metrics {
                metrics.orders_updated.inc();
            }
            tracing::info!(
                order_id = %order.id,
                status = %order.status,
                payment_status = %order.payment_status,
                "Order updated"
            );
        }
        result
    }

    async fn update_inner(&self, id: Uuid, patch: &OrderPatch) -> Result<Order, OrderError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self
                .repository
                .fetch(id)
                .await?
                .ok_or(OrderError::NotFound(id))?;

            // Validation and the status policy always run against the latest record
            let next = current.apply_patch(patch, self.policy, self.clock.now())?;

            match self.repository.replace(&next, current.updated_at).await? {
                ReplaceOutcome::Replaced => return Ok(next),
                ReplaceOutcome::Missing => return Err(OrderError::NotFound(id)),
                ReplaceOutcome::Conflict => {
                    tracing::debug!(order_id = %id, attempt = attempt, "Order changed underneath update, retrying");
                }
            }
        }
        Err(OrderError::ConcurrentModification(id))
    }

    pub async fn read(&self, id: Uuid) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = match self.repository.fetch(id).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(OrderError::NotFound(id)),
            Err(e) => Err(OrderError::Storage(e)),
        };
        self.observe("read", started, &result);
        result
    }

    /// All orders placed by `user_id`, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        let started = Instant::now();
        let result = match UserId::new(user_id) {
            Some(user_id) => self
                .repository
                .list_for_user(&user_id)
                .await
                .map_err(OrderError::Storage),
            None => {
                let mut errors = ValidationErrors::default();
                errors.push("userId", ViolationKind::Missing);
                Err(OrderError::Validation(errors))
            }
        };
        self.observe("list", started, &result);
        result
    }

    fn observe<T>(&self, operation: &str, started: Instant, result: &Result<T, OrderError>) {
        let failure = result.as_ref().err().map(OrderError::reason);

        if let Some(metrics) = &self.metrics {
            metrics.record_operation(operation, started.elapsed().as_secs_f64(), failure);
        }

        if let Err(error) = result {
            match error {
                OrderError::Storage(cause) => tracing::error!(
                    operation = operation,
                    backend = self.repository.backend_name(),
                    error = %cause,
                    "Order storage failure"
                ),
                other => tracing::warn!(
                    operation = operation,
                    reason = other.reason(),
                    error = %other,
                    "Order operation rejected"
                ),
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{AddressInput, OrderStatus, PaymentMethod, PaymentStatus};
    use crate::store::InMemoryOrderRepository;
    use crate::utils::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    struct Fixture {
        handler: OrderCommandHandler,
        clock: Arc<ManualClock>,
        metrics: Arc<Metrics>,
    }

    fn fixture(policy: StatusPolicy) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderCommandHandler::new(
            Arc::new(InMemoryOrderRepository::new()),
            clock.clone(),
            policy,
        )
        .with_metrics(metrics.clone());
        Fixture {
            handler,
            clock,
            metrics,
        }
    }

    fn checkout_draft() -> OrderDraft {
        OrderDraft {
            user_id: Some("user-1".to_string()),
            full_name: Some("Nguyen Van A".to_string()),
            phone: Some("0901234567".to_string()),
            address: Some(AddressInput {
                province: Some("Ho Chi Minh".to_string()),
                district: Some("Quan 3".to_string()),
                ward: Some("Vo Thi Sau".to_string()),
                detail: Some("45 Pasteur".to_string()),
            }),
            total_amount: Some(json!(250000)),
            ..OrderDraft::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let f = fixture(StatusPolicy::Forward);
        let created = f.handler.create(checkout_draft()).await.unwrap();

        assert_eq!(created.status, OrderStatus::Pending);
        assert_eq!(created.payment_status, PaymentStatus::Unpaid);
        assert_eq!(created.payment_method, PaymentMethod::Cod);
        assert_eq!(created.total_amount, serde_json::Number::from(250000));

        let read = f.handler.read(created.id).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(f.metrics.orders_created.get(), 1);
    }

    #[tokio::test]
    async fn test_update_status_to_shipping() {
        let f = fixture(StatusPolicy::Forward);
        let created = f.handler.create(checkout_draft()).await.unwrap();

        f.clock.advance(Duration::minutes(30));
        f.handler
            .update(created.id, OrderPatch::status("shipping"))
            .await
            .unwrap();

        let read = f.handler.read(created.id).await.unwrap();
        assert_eq!(read.status, OrderStatus::Shipping);
        assert!(read.updated_at > created.updated_at);
        assert_eq!(read.created_at, created.created_at);
        assert_eq!(f.metrics.orders_updated.get(), 1);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record_unchanged() {
        let f = fixture(StatusPolicy::Forward);
        let created = f.handler.create(checkout_draft()).await.unwrap();

        f.clock.advance(Duration::minutes(1));
        let err = f
            .handler
            .update(created.id, OrderPatch::status("returned"))
            .await
            .unwrap_err();
        assert!(matches!(&err, OrderError::Validation(errors) if errors.contains("status")));

        assert_eq!(f.handler.read(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_unknown_payment_status_update_is_rejected() {
        let f = fixture(StatusPolicy::Forward);
        let created = f.handler.create(checkout_draft()).await.unwrap();

        let patch = OrderPatch {
            payment_status: Some("refunded".to_string()),
            ..OrderPatch::default()
        };
        let err = f.handler.update(created.id, patch).await.unwrap_err();
        assert!(matches!(&err, OrderError::Validation(errors) if errors.fields() == vec!["paymentStatus"]));
        assert_eq!(f.handler.read(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_unknown_payment_method_update_is_rejected() {
        let f = fixture(StatusPolicy::Forward);
        let created = f.handler.create(checkout_draft()).await.unwrap();

        let patch = OrderPatch {
            payment_method: Some("paypal".to_string()),
            ..OrderPatch::default()
        };
        let err = f.handler.update(created.id, patch).await.unwrap_err();
        assert!(matches!(&err, OrderError::Validation(errors) if errors.fields() == vec!["paymentMethod"]));
        assert_eq!(f.handler.read(created.id).await.unwrap(), created);
        assert_eq!(f.metrics.orders_updated.get(), 0);
    }

    #[tokio::test]
    async fn test_created_at_stable_across_many_updates() {
        let f = fixture(StatusPolicy::Forward);
        let created = f.handler.create(checkout_draft()).await.unwrap();

        let mut last = created.updated_at;
        for status in ["processed", "shipping", "shipped", "delivered"] {
            // Clock deliberately frozen: updatedAt must still move
            let updated = f.handler.update(created.id, OrderPatch::status(status)).await.unwrap();
            assert!(updated.updated_at > last);
            assert_eq!(updated.created_at, created.created_at);
            last = updated.updated_at;
        }
    }

    #[tokio::test]
    async fn test_missing_order() {
        let f = fixture(StatusPolicy::Forward);
        let id = Uuid::new_v4();

        assert!(matches!(f.handler.read(id).await, Err(OrderError::NotFound(missing)) if missing == id));
        assert!(matches!(
            f.handler.update(id, OrderPatch::status("shipping")).await,
            Err(OrderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_create_is_not_persisted() {
        let f = fixture(StatusPolicy::Forward);
        let draft = OrderDraft {
            phone: None,
            ..checkout_draft()
        };

        let err = f.handler.create(draft).await.unwrap_err();
        assert!(matches!(&err, OrderError::Validation(errors) if errors.fields() == vec!["phone"]));
        assert!(f.handler.list_for_user("user-1").await.unwrap().is_empty());
        assert_eq!(f.metrics.orders_created.get(), 0);
    }

    #[tokio::test]
    async fn test_policy_controls_reversal() {
        let guarded = fixture(StatusPolicy::Forward);
        let order = guarded.handler.create(checkout_draft()).await.unwrap();
        guarded.handler.update(order.id, OrderPatch::status("cancelled")).await.unwrap();
        assert!(matches!(
            guarded.handler.update(order.id, OrderPatch::status("pending")).await,
            Err(OrderError::InvalidStatusTransition { .. })
        ));

        let open = fixture(StatusPolicy::Unguarded);
        let order = open.handler.create(checkout_draft()).await.unwrap();
        open.handler.update(order.id, OrderPatch::status("cancelled")).await.unwrap();
        let reopened = open.handler.update(order.id, OrderPatch::status("pending")).await.unwrap();
        assert_eq!(reopened.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let f = fixture(StatusPolicy::Forward);
        let first = f.handler.create(checkout_draft()).await.unwrap();
        f.clock.advance(Duration::seconds(5));
        let second = f.handler.create(checkout_draft()).await.unwrap();
        f.handler
            .create(OrderDraft {
                user_id: Some("user-2".to_string()),
                ..checkout_draft()
            })
            .await
            .unwrap();

        let listed = f.handler.list_for_user("user-1").await.unwrap();
        assert_eq!(listed.iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        assert!(matches!(
            f.handler.list_for_user("  ").await,
            Err(OrderError::Validation(_))
        ));
    }

    struct FailingRepository;

    #[async_trait]
    impl OrderRepository for FailingRepository {
        async fn insert(&self, _order: &Order) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }
        async fn fetch(&self, _id: Uuid) -> anyhow::Result<Option<Order>> {
            anyhow::bail!("connection reset")
        }
        async fn replace(&self, _order: &Order, _expected: DateTime<Utc>) -> anyhow::Result<ReplaceOutcome> {
            anyhow::bail!("connection reset")
        }
        async fn list_for_user(&self, _user_id: &UserId) -> anyhow::Result<Vec<Order>> {
            anyhow::bail!("connection reset")
        }
        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_storage_failures_surface_as_storage_errors() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderCommandHandler::new(
            Arc::new(FailingRepository),
            Arc::new(crate::utils::SystemClock),
            StatusPolicy::Forward,
        )
        .with_metrics(metrics.clone());

        assert!(matches!(handler.create(checkout_draft()).await, Err(OrderError::Storage(_))));
        assert!(matches!(handler.read(Uuid::new_v4()).await, Err(OrderError::Storage(_))));
        assert_eq!(
            metrics
                .operations_failed
                .with_label_values(&["create", "storage"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .operations_failed
                .with_label_values(&["read", "storage"])
                .get(),
            1
        );
    }

    /// Holds the first `gated` fetches until all of them have read, so
    /// concurrent updates start from the same snapshot.
    struct GatedRepository {
        inner: InMemoryOrderRepository,
        barrier: Barrier,
        gated: usize,
        fetches: AtomicUsize,
    }

    impl GatedRepository {
        fn new(gated: usize) -> Self {
            Self {
                inner: InMemoryOrderRepository::new(),
                barrier: Barrier::new(gated),
                gated,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OrderRepository for GatedRepository {
        async fn insert(&self, order: &Order) -> anyhow::Result<()> {
            self.inner.insert(order).await
        }
        async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
            let found = self.inner.fetch(id).await?;
            if self.fetches.fetch_add(1, Ordering::SeqCst) < self.gated {
                self.barrier.wait().await;
            }
            Ok(found)
        }
        async fn replace(&self, order: &Order, expected: DateTime<Utc>) -> anyhow::Result<ReplaceOutcome> {
            self.inner.replace(order, expected).await
        }
        async fn list_for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Order>> {
            self.inner.list_for_user(user_id).await
        }
        fn backend_name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_cannot_reverse_status() {
        let repository = Arc::new(GatedRepository::new(2));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()));
        let handler = OrderCommandHandler::new(repository.clone(), clock, StatusPolicy::Forward);

        let created = handler.create(checkout_draft()).await.unwrap();

        let (delivered, processed) = tokio::join!(
            handler.update(created.id, OrderPatch::status("delivered")),
            handler.update(created.id, OrderPatch::status("processed")),
        );

        assert_eq!(delivered.unwrap().status, OrderStatus::Delivered);
        // Either it landed first and delivered followed, or it saw delivered
        match processed {
            Ok(order) => assert_eq!(order.status, OrderStatus::Processed),
            Err(err) => assert!(matches!(err, OrderError::InvalidStatusTransition { .. })),
        }

        let stored = handler.read(created.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert!(stored.updated_at > created.updated_at);
        // The losing writer went back for a fresh copy
        assert!(repository.fetches.load(Ordering::SeqCst) >= 3);
    }

    /// Every conditional write loses
    struct ContendedRepository(InMemoryOrderRepository);

    #[async_trait]
    impl OrderRepository for ContendedRepository {
        async fn insert(&self, order: &Order) -> anyhow::Result<()> {
            self.0.insert(order).await
        }
        async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
            self.0.fetch(id).await
        }
        async fn replace(&self, _order: &Order, _expected: DateTime<Utc>) -> anyhow::Result<ReplaceOutcome> {
            Ok(ReplaceOutcome::Conflict)
        }
        async fn list_for_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Order>> {
            self.0.list_for_user(user_id).await
        }
        fn backend_name(&self) -> &'static str {
            "contended"
        }
    }

    #[tokio::test]
    async fn test_update_gives_up_after_repeated_conflicts() {
        let handler = OrderCommandHandler::new(
            Arc::new(ContendedRepository(InMemoryOrderRepository::new())),
            Arc::new(crate::utils::SystemClock),
            StatusPolicy::Forward,
        );
        let created = handler.create(checkout_draft()).await.unwrap();

        let err = handler
            .update(created.id, OrderPatch::status("shipping"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ConcurrentModification(id) if id == created.id));
        assert_eq!(handler.read(created.id).await.unwrap(), created);
    }
}
