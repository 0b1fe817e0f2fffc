// ============================================================================
// Order Domain - Business Logic for the Order Record
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderStatus, PaymentStatus, PaymentMethod, ShippingAddress)
// - Commands (OrderDraft, OrderPatch)
// - Errors (OrderError, ValidationErrors)
// - Aggregate (Order record with validation and patching)
// - Command Handler (OrderCommandHandler: create / update / read / list)
//
// Storage backends live in crate::store and know nothing about validation.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
