use anyhow::{anyhow, Result};
use std::env;
use std::net::SocketAddr;

use crate::domain::order::StatusPolicy;

// ============================================================================
// Service Configuration
// ============================================================================
//
// Read from ORDERS_* environment variables. Every setting has a default so
// the service starts with an in-memory store and no setup.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    Scylla { node: String, keyspace: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub backend: StoreBackend,
    pub status_policy: StatusPolicy,
    pub connect_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| -> String {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bind_raw = var("ORDERS_BIND", "0.0.0.0:8080");
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("ORDERS_BIND={:?} is not a socket address: {}", bind_raw, e))?;

        let backend = match var("ORDERS_STORE_BACKEND", "memory").as_str() {
            "memory" => StoreBackend::Memory,
            "scylla" => StoreBackend::Scylla {
                node: var("ORDERS_SCYLLA_NODE", "127.0.0.1:9042"),
                keyspace: var("ORDERS_SCYLLA_KEYSPACE", "orders_ks"),
            },
            other => {
                return Err(anyhow!(
                    "ORDERS_STORE_BACKEND={:?} is not one of [\"memory\", \"scylla\"]",
                    other
                ))
            }
        };

        let status_policy = var("ORDERS_STATUS_POLICY", "forward")
            .parse::<StatusPolicy>()
            .map_err(|e| anyhow!("ORDERS_STATUS_POLICY: {}", e))?;

        let attempts_raw = var("ORDERS_CONNECT_ATTEMPTS", "5");
        let connect_attempts = attempts_raw
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| anyhow!("ORDERS_CONNECT_ATTEMPTS={:?} must be a positive integer", attempts_raw))?;

        Ok(Self {
            bind,
            backend,
            status_policy,
            connect_attempts,
        })
    }
}
