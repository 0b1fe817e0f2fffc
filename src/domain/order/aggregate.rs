use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::commands::{AddressInput, OrderDraft, OrderPatch};
use super::errors::{OrderError, ValidationErrors, ViolationKind};
use super::value_objects::{
    OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, StatusPolicy, UnknownValue, UserId,
};

// ============================================================================
// Order Record - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub user_id: UserId,

    // Shipping
    pub full_name: String,
    pub phone: String,
    pub address: ShippingAddress,

    // Payment & fulfillment
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    /// Kept as the submitted JSON number so integers round-trip exactly
    pub total_amount: serde_json::Number,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate a draft and build the record it describes.
    ///
    /// Both timestamps are set to `now`. All violations are collected before
    /// failing.
    pub fn create(id: Uuid, draft: &OrderDraft, now: DateTime<Utc>) -> Result<Self, OrderError> {
        let mut errors = ValidationErrors::default();

        let user_id = match draft.user_id.as_deref().and_then(UserId::new) {
            Some(user_id) => Some(user_id),
            None => {
                errors.push("userId", ViolationKind::Missing);
                None
            }
        };
        let full_name = required_text(&mut errors, "fullName", draft.full_name.as_ref());
        let phone = required_text(&mut errors, "phone", draft.phone.as_ref());
        let address = required_address(&mut errors, draft.address.as_ref());
        let payment_status = optional_enum::<PaymentStatus>(
            &mut errors,
            "paymentStatus",
            draft.payment_status.as_deref(),
        );
        let payment_method = optional_enum::<PaymentMethod>(
            &mut errors,
            "paymentMethod",
            draft.payment_method.as_deref(),
        );
        let status = optional_enum::<OrderStatus>(&mut errors, "status", draft.status.as_deref());
        let total_amount = match &draft.total_amount {
            Some(value) => amount(&mut errors, "totalAmount", value),
            None => {
                errors.push("totalAmount", ViolationKind::Missing);
                None
            }
        };

        match (user_id, full_name, phone, address, total_amount, payment_status, payment_method, status) {
            (
                Some(user_id),
                Some(full_name),
                Some(phone),
                Some(address),
                Some(total_amount),
                Ok(payment_status),
                Ok(payment_method),
                Ok(status),
            ) if errors.is_empty() => Ok(Self {
                id,
                user_id,
                full_name,
                phone,
                address,
                payment_status: payment_status.unwrap_or_default(),
                payment_method: payment_method.unwrap_or_default(),
                status: status.unwrap_or_default(),
                total_amount,
                created_at: now,
                updated_at: now,
            }),
            _ => Err(OrderError::Validation(errors)),
        }
    }

    /// Produce the record that results from applying `patch`.
    ///
    /// `self` is never modified, so a rejected patch leaves the stored record
    /// untouched. Field validation runs before the status policy check.
    pub fn apply_patch(
        &self,
        patch: &OrderPatch,
        policy: StatusPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        let mut errors = ValidationErrors::default();
        let mut next = self.clone();

        if let Some(full_name) = &patch.full_name {
            if let Some(value) = required_text(&mut errors, "fullName", Some(full_name)) {
                next.full_name = value;
            }
        }
        if let Some(phone) = &patch.phone {
            if let Some(value) = required_text(&mut errors, "phone", Some(phone)) {
                next.phone = value;
            }
        }
        if let Some(address) = &patch.address {
            patch_address(&mut errors, &mut next.address, address);
        }
        if let Ok(Some(value)) = optional_enum::<PaymentStatus>(
            &mut errors,
            "paymentStatus",
            patch.payment_status.as_deref(),
        ) {
            next.payment_status = value;
        }
        if let Ok(Some(value)) = optional_enum::<PaymentMethod>(
            &mut errors,
            "paymentMethod",
            patch.payment_method.as_deref(),
        ) {
            next.payment_method = value;
        }
        if let Ok(Some(value)) =
            optional_enum::<OrderStatus>(&mut errors, "status", patch.status.as_deref())
        {
            next.status = value;
        }
        if let Some(value) = &patch.total_amount {
            if let Some(total) = amount(&mut errors, "totalAmount", value) {
                next.total_amount = total;
            }
        }

        errors.into_result()?;

        if !policy.permits(self.status, next.status) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next.status,
            });
        }

        next.updated_at = next_update_stamp(self.updated_at, now);
        Ok(next)
    }
}

/// Timestamp for a mutation of a record last stamped at `previous`.
///
/// Strictly later than `previous` even if the clock has not moved, at
/// millisecond resolution so the ordering survives a CQL `timestamp` column.
pub fn next_update_stamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::milliseconds(1);
    if now >= floor {
        now
    } else {
        floor
    }
}

// ============================================================================
// Field Validation Helpers
// ============================================================================

fn required_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&String>,
) -> Option<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Some(text.clone()),
        _ => {
            errors.push(field, ViolationKind::Missing);
            None
        }
    }
}

fn required_address(
    errors: &mut ValidationErrors,
    input: Option<&AddressInput>,
) -> Option<ShippingAddress> {
    let empty = AddressInput::default();
    let input = input.unwrap_or(&empty);

    let province = required_text(errors, "address.province", input.province.as_ref());
    let district = required_text(errors, "address.district", input.district.as_ref());
    let ward = required_text(errors, "address.ward", input.ward.as_ref());
    let detail = required_text(errors, "address.detail", input.detail.as_ref());

    Some(ShippingAddress {
        province: province?,
        district: district?,
        ward: ward?,
        detail: detail?,
    })
}

fn patch_address(errors: &mut ValidationErrors, address: &mut ShippingAddress, input: &AddressInput) {
    let parts = [
        ("address.province", &input.province, &mut address.province),
        ("address.district", &input.district, &mut address.district),
        ("address.ward", &input.ward, &mut address.ward),
        ("address.detail", &input.detail, &mut address.detail),
    ];
    for (field, value, slot) in parts {
        if value.is_some() {
            if let Some(text) = required_text(errors, field, value.as_ref()) {
                *slot = text;
            }
        }
    }
}

/// `Ok(None)` when absent, `Err(())` once the violation has been recorded
fn optional_enum<T: FromStr<Err = UnknownValue>>(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, ()> {
    match value.map(str::parse::<T>) {
        None => Ok(None),
        Some(Ok(parsed)) => Ok(Some(parsed)),
        Some(Err(unknown)) => {
            errors.push(field, ViolationKind::NotAllowed(unknown));
            Err(())
        }
    }
}

/// An explicit `null` counts as missing, even in a patch
fn amount(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &serde_json::Value,
) -> Option<serde_json::Number> {
    let number = match value {
        serde_json::Value::Null => {
            errors.push(field, ViolationKind::Missing);
            return None;
        }
        serde_json::Value::Number(number) => number,
        _ => {
            errors.push(field, ViolationKind::NotANumber);
            return None;
        }
    };

    match number.as_f64() {
        Some(n) if !n.is_finite() => {
            errors.push(field, ViolationKind::NotANumber);
            None
        }
        Some(n) if n < 0.0 => {
            errors.push(field, ViolationKind::Negative);
            None
        }
        Some(_) => Some(number.clone()),
        None => {
            errors.push(field, ViolationKind::NotANumber);
            None
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
