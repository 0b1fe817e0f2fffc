use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Raised when a string does not name a member of a closed enumeration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("`{value}` is not one of {allowed:?}")]
pub struct UnknownValue {
    pub value: String,
    pub allowed: &'static [&'static str],
}

/// Opaque reference to a user owned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns `None` for a blank identifier
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shipping address, every part required
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub province: String,
    pub district: String,
    pub ward: String,
    pub detail: String,
}

/// Fulfillment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processed,
    Shipping,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALLOWED: &'static [&'static str] = &[
        "pending",
        "processed",
        "shipping",
        "shipped",
        "delivered",
        "cancelled",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processed => "processed",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Position in the fulfillment sequence. Cancelled sits outside it.
    fn stage(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processed => Some(1),
            OrderStatus::Shipping => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward-only transition table.
    ///
    /// Fulfillment stages may be skipped but never reversed, any open order
    /// can be cancelled, and terminal statuses have no successors. Re-applying
    /// the current status is always accepted.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.stage(), next.stage()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processed" => Ok(OrderStatus::Processed),
            "shipping" => Ok(OrderStatus::Shipping),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownValue {
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
}

impl PaymentStatus {
    pub const ALLOWED: &'static [&'static str] = &["paid", "unpaid"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(UnknownValue {
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// How the customer pays: cash on delivery or the VNPay gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Vnpay,
}

impl PaymentMethod {
    pub const ALLOWED: &'static [&'static str] = &["cod", "vnpay"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Vnpay => "vnpay",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(PaymentMethod::Cod),
            "vnpay" => Ok(PaymentMethod::Vnpay),
            other => Err(UnknownValue {
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// Which status changes the store accepts on update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Enforce [`OrderStatus::can_transition_to`]
    #[default]
    Forward,
    /// Any status may follow any other
    Unguarded,
}

impl StatusPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPolicy::Forward => "forward",
            StatusPolicy::Unguarded => "unguarded",
        }
    }

    pub fn permits(&self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            StatusPolicy::Forward => from.can_transition_to(to),
            StatusPolicy::Unguarded => true,
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(StatusPolicy::Forward),
            "unguarded" => Ok(StatusPolicy::Unguarded),
            other => Err(UnknownValue {
                value: other.to_string(),
                allowed: &["forward", "unguarded"],
            }),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
