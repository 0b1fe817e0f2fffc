// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// ============================================================================

pub mod order;
