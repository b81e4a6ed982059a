//! Treatment package models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clinical quantities are persisted as whole thousandths of a unit.
pub const QUANTITY_SCALE: i64 = 1000;

/// Convert a quantity to thousandths, or `None` if it is not finite or
/// carries more precision than a thousandth.
pub fn quantity_to_milli(quantity: f64) -> Option<i64> {
    if !quantity.is_finite() {
        return None;
    }
    let scaled = quantity * QUANTITY_SCALE as f64;
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 || rounded.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    Some(rounded as i64)
}

pub fn quantity_from_milli(milli: i64) -> f64 {
    milli as f64 / QUANTITY_SCALE as f64
}

/// A purchased quantity of one treatment for one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: String,
    pub patient_id: String,
    pub treatment_id: String,
    /// Quantity purchased
    pub total_amount: f64,
    /// Quantity not yet applied (`0 <= remaining_amount <= total_amount`)
    pub remaining_amount: f64,
    pub purchase_date: String,
    /// Suggested re-application cadence in days
    pub frequency_in_days: Option<u32>,
    /// Suggested weekday, 1 = Monday .. 7 = Sunday
    pub suggested_day_of_week: Option<u8>,
}

/// One line of a package sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageItem {
    pub treatment_id: String,
    pub quantity: f64,
    pub frequency_days: Option<u32>,
    pub day_of_week: Option<u8>,
}

/// An active package as shown when registering an attendance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivePackage {
    #[serde(flatten)]
    pub package: Package,
    pub treatment_name: String,
    pub treatment_unit: String,
    pub last_application_at: Option<String>,
    pub last_application_amount: Option<f64>,
    /// Derived on every read, never stored
    pub is_suggested: bool,
}

impl Package {
    /// Create a new, untouched package.
    pub fn new(patient_id: String, item: &PackageItem) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            treatment_id: item.treatment_id.clone(),
            total_amount: item.quantity,
            remaining_amount: item.quantity,
            purchase_date: crate::db::now_timestamp(),
            frequency_in_days: item.frequency_days,
            suggested_day_of_week: item.day_of_week,
        }
    }
}

/// Whether a package is due for another application.
///
/// With no prior application the package is always due. Otherwise it is
/// due once the whole days elapsed since the last application reach the
/// cadence; a package without a cadence is only due before its first use.
pub fn is_suggested(
    last_application: Option<DateTime<Utc>>,
    frequency_in_days: Option<u32>,
    now: DateTime<Utc>,
) -> bool {
    let Some(last) = last_application else {
        return true;
    };
    match frequency_in_days {
        Some(cadence) if cadence > 0 => (now - last).num_days() >= i64::from(cadence),
        _ => false,
    }
}
