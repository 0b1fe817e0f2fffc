use serde::{Deserialize, Deserializer};

// ============================================================================
// Order Commands - Unvalidated write requests
// ============================================================================
//
// Every field is optional here so that one pass of validation can report all
// offending fields at once instead of failing on the first bad one.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AddressInput {
    pub province: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub detail: Option<String>,
}

/// Request to create an order, as submitted by checkout
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressInput>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub total_amount: Option<serde_json::Value>,
}

/// Partial update. Absent fields keep their stored value; `userId`, `id` and
/// `createdAt` are not patchable and are ignored if sent.
///
/// A `null` text or enum field is treated as absent. A `null` `totalAmount`
/// is kept so validation can reject it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<AddressInput>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub total_amount: Option<serde_json::Value>,
}

/// Distinguishes an explicit `null` from an absent key: only present keys
/// reach this, and they always yield `Some`
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl OrderPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    /// What a payment webhook sends once the gateway confirms
    pub fn mark_paid() -> Self {
        Self {
            payment_status: Some("paid".to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
