//! Catalog database operations (medications and treatments).

use rusqlite::{params, OptionalExtension};

use super::{parse_decimal, Database, DbError, DbResult};
use crate::models::{Medication, Treatment, TreatmentListing};

impl Database {
    /// Insert or replace a medication.
    pub fn upsert_medication(&self, medication: &Medication) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medications (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![medication.id, medication.name],
        )?;
        Ok(())
    }

    /// Insert or replace a treatment.
    pub fn upsert_treatment(&self, treatment: &Treatment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO treatments (id, medication_id, unit, price)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                medication_id = excluded.medication_id,
                unit = excluded.unit,
                price = excluded.price
            "#,
            params![
                treatment.id,
                treatment.medication_id,
                treatment.unit,
                treatment.price.map(|p| p.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Get a treatment by ID.
    pub fn get_treatment(&self, id: &str) -> DbResult<Option<Treatment>> {
        self.conn
            .query_row(
                "SELECT id, medication_id, unit, price FROM treatments WHERE id = ?",
                [id],
                |row| {
                    Ok(TreatmentRow {
                        id: row.get(0)?,
                        medication_id: row.get(1)?,
                        unit: row.get(2)?,
                        price: row.get(3)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a treatment with its medication name.
    pub fn get_treatment_listing(&self, id: &str) -> DbResult<Option<TreatmentListing>> {
        self.conn
            .query_row(
                r#"
                SELECT t.id, m.name, t.unit, t.price, t.medication_id
                FROM treatments t
                LEFT JOIN medications m ON m.id = t.medication_id
                WHERE t.id = ?
                "#,
                [id],
                listing_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List every treatment with its medication name, unordered.
    ///
    /// A treatment whose medication cannot be found fails the whole call
    /// rather than being listed without a name.
    pub fn list_treatment_listings(&self) -> DbResult<Vec<TreatmentListing>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.id, m.name, t.unit, t.price, t.medication_id
            FROM treatments t
            LEFT JOIN medications m ON m.id = t.medication_id
            "#,
        )?;

        let rows = stmt.query_map([], listing_row)?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?.try_into()?);
        }
        Ok(listings)
    }
}

/// Intermediate row struct for database mapping.
struct TreatmentRow {
    id: String,
    medication_id: String,
    unit: String,
    price: Option<String>,
}

impl TryFrom<TreatmentRow> for Treatment {
    type Error = DbError;

    fn try_from(row: TreatmentRow) -> Result<Self, Self::Error> {
        let price = row
            .price
            .as_deref()
            .map(|p| parse_decimal("treatments.price", p))
            .transpose()?;

        Ok(Treatment {
            id: row.id,
            medication_id: row.medication_id,
            unit: row.unit,
            price,
        })
    }
}

struct ListingRow {
    id: String,
    name: Option<String>,
    unit: String,
    price: Option<String>,
    medication_id: String,
}

fn listing_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        name: row.get(1)?,
        unit: row.get(2)?,
        price: row.get(3)?,
        medication_id: row.get(4)?,
    })
}

impl TryFrom<ListingRow> for TreatmentListing {
    type Error = DbError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let name = row.name.ok_or_else(|| {
            DbError::NotFound(format!(
                "Medication {} for treatment {}",
                row.medication_id, row.id
            ))
        })?;
        let price = row
            .price
            .as_deref()
            .map(|p| parse_decimal("treatments.price", p))
            .transpose()?;

        Ok(TreatmentListing {
            id: row.id,
            name,
            unit: row.unit,
            price,
        })
    }
}
