//! Clinic Core Library
//!
//! Patient registry, visit queue, treatment packages, dose recording and a
//! signed financial ledger over a single SQLite database.
//!
//! # Architecture
//!
//! ```text
//!   front desk                 nursing                     billing
//!       │                         │                           │
//!  PatientRegistry          SessionManager              FinancialLedger
//!       │                  (visit state machine)              ▲
//!       │                         │                           │ charges
//!       │                 ApplicationRecorder ───────────────┤
//!       │                   │            │                    │
//!       │             PackageLedger   CatalogReader ──────────┘
//!       │            (atomic debit)   (names, prices)
//!       │                   │            │
//!       └───────────────────┴─── Database ┴──── [STAGING: pending_submissions]
//! ```
//!
//! # Core Principle
//!
//! **Balances only move inside write-locking transactions.** Package debits
//! are a single conditional update, and every read-validate-write sequence
//! runs under `BEGIN IMMEDIATE`, so concurrent writers on any connection to
//! the same database file are serialized.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Patient, Session, Package, LedgerEntry, etc.)
//! - [`registry`]: Patient registration and CPF validation
//! - [`catalog`]: Treatment catalog reader
//! - [`queue`]: Session/queue state machine
//! - [`packages`]: Package sales and balance debits
//! - [`recorder`]: Attendance recording with per-dose outcomes
//! - [`finance`]: Charges, payments and statements
//! - [`drafts`]: Pending submissions

pub mod catalog;
pub mod db;
pub mod drafts;
pub mod error;
pub mod finance;
pub mod models;
pub mod packages;
pub mod queue;
pub mod recorder;
pub mod registry;

// Re-export commonly used types
pub use catalog::CatalogReader;
pub use db::{Database, DbError};
pub use drafts::DraftStore;
pub use error::{ClinicError, ClinicResult};
pub use finance::FinancialLedger;
pub use models::{
    ActivePackage, ApplicationBatch, BatchReport, CatalogSeed, LedgerEntry, NewPatient, Package,
    PackageItem, Patient, PatientSummary, PaymentPart, PendingSubmission, Session, SessionStatus,
    Statement,
};
pub use packages::PackageLedger;
pub use queue::SessionManager;
pub use recorder::ApplicationRecorder;
pub use registry::PatientRegistry;
