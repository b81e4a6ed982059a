//! Clinical act models and batch recording reports.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A dose applied against a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: String,
    pub session_id: String,
    pub package_id: String,
    pub amount_applied: f64,
    pub created_at: String,
}

/// A dose applied without a package, billed at catalog price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdhocApplication {
    pub id: String,
    pub session_id: String,
    pub treatment_id: Option<String>,
    /// Denormalized so the clinical record survives catalog edits
    pub treatment_name: String,
    pub treatment_unit: String,
    pub amount_applied: f64,
    pub created_at: String,
}

/// Package dose requested in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDose {
    pub package_id: String,
    pub amount_applied: f64,
}

/// Ad-hoc dose requested in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdhocDose {
    pub treatment_id: Option<String>,
    pub treatment_name: String,
    pub treatment_unit: String,
    pub amount_applied: f64,
}

/// Everything recorded at the end of one attendance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationBatch {
    pub patient_id: String,
    /// Open session to complete; resolved or created when absent
    pub session_id: Option<String>,
    pub weight: f64,
    #[serde(default)]
    pub package_doses: Vec<PackageDose>,
    #[serde(default)]
    pub adhoc_doses: Vec<AdhocDose>,
    pub signature_url: Option<String>,
    pub attended_by: Option<String>,
}

/// Which list of the batch an item came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Package,
    Adhoc,
}

/// A batch item that was recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemReceipt {
    Package {
        index: usize,
        package_id: String,
        application_id: String,
        remaining_amount: f64,
    },
    Adhoc {
        index: usize,
        adhoc_id: String,
        /// Amount billed; `None` when the treatment is unpriced
        charged: Option<Decimal>,
        ledger_entry_id: Option<String>,
    },
}

/// A batch item that was rolled back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemFailure {
    pub kind: ItemKind,
    pub index: usize,
    /// Package ID or treatment name, for display
    pub reference: String,
    /// Stable error code (see `ClinicError::code`)
    pub code: String,
    pub message: String,
}

/// Per-item outcome of a batch, so the caller can reconcile partial failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub session_id: String,
    pub succeeded: Vec<ItemReceipt>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Sum of all ad-hoc charges produced by the batch.
    pub fn total_charged(&self) -> Decimal {
        self.succeeded
            .iter()
            .filter_map(|receipt| match receipt {
                ItemReceipt::Adhoc { charged, .. } => *charged,
                ItemReceipt::Package { .. } => None,
            })
            .sum()
    }
}
