//! Provider invoice records (stock purchases).

use super::{require_date, require_text, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub product_id: RecordId,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub uuid: RecordId,
    pub provider_id: RecordId,
    /// Provider-issued invoice number; unique per provider.
    pub number: String,
    /// Calendar date printed on the invoice.
    pub issued_on: String,
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    pub fn new(
        provider_id: RecordId,
        number: impl Into<String>,
        issued_on: impl Into<String>,
        items: Vec<InvoiceItem>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            provider_id,
            number: number.into(),
            issued_on: issued_on.into(),
            items,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("invoice number", &self.number)?;
        require_date(&self.issued_on)?;
        if self.items.is_empty() {
            return Err(ModelValidationError::NoItems);
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ModelValidationError::NonPositiveQuantity(item.product_id));
            }
            if item.unit_cost_cents < 0 {
                return Err(ModelValidationError::NegativeAmount("unit cost"));
            }
        }
        Ok(())
    }

    pub fn total_cents(&self) -> i64 {
        self.items.iter().fold(0_i64, |total, item| {
            total.saturating_add(item.quantity.saturating_mul(item.unit_cost_cents))
        })
    }
}
