// ============================================================================
// Order Records
// ============================================================================
//
// Order record store for an e-commerce back end: validation, defaults and
// timestamps for customer orders, persisted through a pluggable repository
// and exposed over HTTP.
//
// ============================================================================

pub mod api;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod store;
pub mod utils;
