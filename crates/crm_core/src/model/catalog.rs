//! Catalog records: products and their lookup tables.

use super::{require_text, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name-only lookup tables shared by the catalog and client records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Category,
    Brand,
    ProfessionalDomain,
}

impl LookupKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Brand => "brand",
            Self::ProfessionalDomain => "professional domain",
        }
    }
}

/// One category, brand or professional domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
    pub uuid: RecordId,
    pub kind: LookupKind,
    pub name: String,
}

impl LookupRecord {
    pub fn new(kind: LookupKind, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind,
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("lookup name", &self.name)
    }
}

/// Sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub uuid: RecordId,
    /// Operator-facing unique reference (SKU).
    pub reference: String,
    pub name: String,
    pub category_id: Option<RecordId>,
    pub brand_id: Option<RecordId>,
    pub unit_price_cents: i64,
    pub stock_quantity: i64,
}

impl Product {
    pub fn new(reference: impl Into<String>, name: impl Into<String>, unit_price_cents: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            reference: reference.into(),
            name: name.into(),
            category_id: None,
            brand_id: None,
            unit_price_cents,
            stock_quantity: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("product reference", &self.reference)?;
        require_text("product name", &self.name)?;
        if self.unit_price_cents < 0 {
            return Err(ModelValidationError::NegativeAmount("unit price"));
        }
        if self.stock_quantity < 0 {
            return Err(ModelValidationError::NegativeAmount("stock quantity"));
        }
        Ok(())
    }
}
