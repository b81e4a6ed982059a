//! Treatment catalog models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A medication (active substance) as named in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: String,
    pub name: String,
}

/// A sellable treatment: one medication in one unit, optionally priced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Treatment {
    /// Treatment ID (referenced by packages)
    pub id: String,
    /// Medication this treatment administers
    pub medication_id: String,
    /// Dose unit (e.g., "ml", "mg", "aplicação")
    pub unit: String,
    /// Unit price; `None` when the treatment is not billed
    pub price: Option<Decimal>,
}

/// A treatment joined with its medication's display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreatmentListing {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub price: Option<Decimal>,
}

/// Catalog document loaded at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogSeed {
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub treatments: Vec<Treatment>,
}

impl TreatmentListing {
    /// Price that should be billed, if any. Zero or negative prices are
    /// treated as unpriced.
    pub fn billable_price(&self) -> Option<Decimal> {
        self.price.filter(|p| *p > Decimal::ZERO)
    }
}

/// Units such as "aplicação" are dosed in whole numbers.
pub fn is_counted_unit(unit: &str) -> bool {
    let unit = unit.to_lowercase();
    unit.contains("aplicação") || unit.contains("aplicacao")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn listing(price: Option<Decimal>) -> TreatmentListing {
        TreatmentListing {
            id: "t1".into(),
            name: "Ferro".into(),
            unit: "ml".into(),
            price,
        }
    }

    #[test]
    fn test_billable_price() {
        assert_eq!(listing(Some(dec!(20.00))).billable_price(), Some(dec!(20.00)));
        assert_eq!(listing(Some(Decimal::ZERO)).billable_price(), None);
        assert_eq!(listing(Some(dec!(-1))).billable_price(), None);
        assert_eq!(listing(None).billable_price(), None);
    }

    #[test]
    fn test_counted_unit() {
        assert!(!is_counted_unit("ml"));
        assert!(is_counted_unit("Aplicação"));
        assert!(is_counted_unit("aplicacao"));
    }

    #[test]
    fn test_seed_defaults() {
        let seed: CatalogSeed = serde_json::from_str(r#"{"medications": []}"#).unwrap();
        assert!(seed.treatments.is_empty());
    }
}
