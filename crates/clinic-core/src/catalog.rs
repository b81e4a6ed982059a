//! Catalog reader: treatment names, units and prices.

use tracing::info;

use crate::db::Database;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{CatalogSeed, TreatmentListing};

pub struct CatalogReader<'a> {
    db: &'a Database,
}

impl<'a> CatalogReader<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Every treatment with its medication name, ordered by case-folded
    /// name and then by ID.
    ///
    /// Fails as a whole if any treatment's medication is missing.
    pub fn list_treatments(&self) -> ClinicResult<Vec<TreatmentListing>> {
        let mut listings = self.db.list_treatment_listings()?;
        listings.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(listings)
    }

    /// Treatment with its display name.
    pub fn listing(&self, id: &str) -> ClinicResult<TreatmentListing> {
        self.db
            .get_treatment_listing(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Treatment {}", id)))
    }

    /// Load medications and treatments, replacing existing rows by ID.
    pub fn seed(&self, seed: &CatalogSeed) -> ClinicResult<()> {
        let tx = self.db.immediate()?;
        for medication in &seed.medications {
            self.db.upsert_medication(medication)?;
        }
        for treatment in &seed.treatments {
            if treatment.unit.trim().is_empty() {
                return Err(ClinicError::Validation(format!(
                    "Treatment {} has no unit",
                    treatment.id
                )));
            }
            self.db.upsert_treatment(treatment)?;
        }
        tx.commit()?;

        info!(
            medications = seed.medications.len(),
            treatments = seed.treatments.len(),
            "Catalog seeded"
        );
        Ok(())
    }
}
