//! Package ledger: sales, active listing and balance debits.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::CatalogReader;
use crate::db::Database;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{
    quantity_to_milli, ActivePackage, EntryType, LedgerEntry, Package, PackageItem,
};

pub struct PackageLedger<'a> {
    db: &'a Database,
}

impl<'a> PackageLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Sell one package per item.
    ///
    /// Each item whose treatment has a positive price also produces a
    /// `charge` of that unit price. Packages and charges commit together or
    /// not at all.
    pub fn create_packages(
        &self,
        patient_id: &str,
        items: &[PackageItem],
    ) -> ClinicResult<Vec<Package>> {
        if items.is_empty() {
            return Err(ClinicError::validation("At least one package item is required"));
        }
        for item in items {
            validate_item(item)?;
        }

        let tx = self.db.immediate()?;
        if !self.db.patient_exists(patient_id)? {
            return Err(ClinicError::NotFound(format!("Patient {}", patient_id)));
        }

        let mut packages = Vec::with_capacity(items.len());
        for item in items {
            let listing = CatalogReader::new(self.db).listing(&item.treatment_id)?;

            let package = Package::new(patient_id.to_string(), item);
            self.db.insert_package(&package)?;

            if let Some(price) = listing.billable_price() {
                let charge = LedgerEntry::new(
                    patient_id.to_string(),
                    EntryType::Charge,
                    price,
                    format!("Tratamento: {}", listing.name),
                );
                self.db.insert_ledger_entry(&charge)?;
            }
            packages.push(package);
        }
        tx.commit()?;

        info!(patient_id, count = packages.len(), "Packages sold");
        Ok(packages)
    }

    /// Packages with remaining balance, each flagged when due at `now`.
    pub fn list_active(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> ClinicResult<Vec<ActivePackage>> {
        if !self.db.patient_exists(patient_id)? {
            return Err(ClinicError::NotFound(format!("Patient {}", patient_id)));
        }
        Ok(self.db.active_packages(patient_id, now)?)
    }

    /// Atomically subtract `amount` from a package. Returns the new balance.
    pub fn debit(&self, package_id: &str, amount: f64) -> ClinicResult<f64> {
        let tx = self.db.immediate()?;
        let remaining = self.debit_locked(package_id, amount)?;
        tx.commit()?;
        Ok(remaining)
    }

    /// `debit` body; the caller holds the write lock.
    pub(crate) fn debit_locked(&self, package_id: &str, amount: f64) -> ClinicResult<f64> {
        validate_amount(amount)?;
        if self.db.debit_package(package_id, amount)? {
            let package = self
                .db
                .get_package(package_id)?
                .ok_or_else(|| ClinicError::NotFound(format!("Package {}", package_id)))?;
            return Ok(package.remaining_amount);
        }

        match self.db.get_package(package_id)? {
            None => Err(ClinicError::NotFound(format!("Package {}", package_id))),
            Some(package) => Err(ClinicError::InsufficientBalance {
                package_id: package_id.to_string(),
                available: package.remaining_amount,
                requested: amount,
            }),
        }
    }
}

fn validate_item(item: &PackageItem) -> ClinicResult<()> {
    if item.treatment_id.trim().is_empty() {
        return Err(ClinicError::validation("Package item has no treatment"));
    }
    if !quantity_to_milli(item.quantity).is_some_and(|milli| milli > 0) {
        return Err(ClinicError::Validation(format!(
            "Quantity for treatment {} must be positive with at most three decimals",
            item.treatment_id
        )));
    }
    if let Some(day) = item.day_of_week {
        if !(1..=7).contains(&day) {
            return Err(ClinicError::Validation(format!(
                "Day of week {} is outside 1..=7",
                day
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_amount(amount: f64) -> ClinicResult<()> {
    if !quantity_to_milli(amount).is_some_and(|milli| milli > 0) {
        return Err(ClinicError::Validation(format!(
            "Applied amount must be positive with at most three decimals, got {}",
            amount
        )));
    }
    Ok(())
}
