use std::fmt;
use uuid::Uuid;

use super::value_objects::{OrderStatus, UnknownValue};

// ============================================================================
// Order Validation
// ============================================================================

/// Why a single field was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Missing,
    NotAllowed(UnknownValue),
    NotANumber,
    Negative,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => f.write_str("is required"),
            ViolationKind::NotAllowed(unknown) => write!(f, "{}", unknown),
            ViolationKind::NotANumber => f.write_str("must be a finite number"),
            ViolationKind::Negative => f.write_str("must not be negative"),
        }
    }
}

/// A rejected field, named by its wire path (e.g. `address.ward`)
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub kind: ViolationKind,
}

impl FieldViolation {
    pub fn new(field: &'static str, kind: ViolationKind) -> Self {
        Self { field, kind }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.kind)
    }
}

/// Every violation found in one write attempt
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, kind: ViolationKind) {
        self.0.push(FieldViolation::new(field, kind));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|v| v.field).collect()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), OrderError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(OrderError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

// ============================================================================
// Order Store Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Writers kept racing on the same order and every retry lost
    #[error("Order {0} was modified concurrently, retry the update")]
    ConcurrentModification(Uuid),

    #[error("Order storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl OrderError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::NotFound(_) => "not_found",
            OrderError::InvalidStatusTransition { .. } => "invalid_transition",
            OrderError::ConcurrentModification(_) => "conflict",
            OrderError::Storage(_) => "storage",
        }
    }
}
