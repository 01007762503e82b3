//! Client and provider records.
//!
//! # Invariants
//! - `name` is never blank.
//! - `email`, when present, has exactly one `@` with non-empty sides.
//! - `ccp`, when present, normalizes to a 10-digit postal account.

use super::{require_optional_ccp, require_optional_email, require_text};
use super::{ModelValidationError, RecordId};
use crate::ccp::{compute_ccp, CcpRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer buying from the distributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub uuid: RecordId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Optional link to a `LookupKind::ProfessionalDomain` record.
    pub professional_domain_id: Option<RecordId>,
    /// Postal current account, as typed by the operator.
    pub ccp: Option<String>,
}

impl Client {
    /// Creates a client with a generated stable ID and no contact details.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            professional_domain_id: None,
            ccp: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("client name", &self.name)?;
        require_optional_email(self.email.as_deref())?;
        require_optional_ccp(self.ccp.as_deref())
    }

    /// Derived postal identifiers, when a CCP is on file.
    pub fn ccp_record(&self) -> Option<CcpRecord> {
        self.ccp.as_deref().map(compute_ccp)
    }
}

/// Supplier the distributor buys stock from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub uuid: RecordId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub ccp: Option<String>,
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            ccp: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("provider name", &self.name)?;
        require_optional_email(self.email.as_deref())?;
        require_optional_ccp(self.ccp.as_deref())
    }

    pub fn ccp_record(&self) -> Option<CcpRecord> {
        self.ccp.as_deref().map(compute_ccp)
    }
}

#[cfg(test)]
mod tests {
    use super::{Client, Provider};
    use crate::model::ModelValidationError;

    #[test]
    fn blank_client_name_is_rejected() {
        let client = Client::new("   ");
        assert_eq!(
            client.validate(),
            Err(ModelValidationError::BlankField("client name"))
        );
    }

    #[test]
    fn client_ccp_record_is_derived() {
        let mut client = Client::new("Epicerie Nour");
        client.ccp = Some("1234567890".to_string());
        assert!(client.validate().is_ok());
        let record = client.ccp_record().expect("ccp on file");
        assert_eq!(record.cle, "45");
    }

    #[test]
    fn provider_with_bad_ccp_is_rejected() {
        let mut provider = Provider::new("Sarl Atlas");
        provider.ccp = Some("12-34".to_string());
        assert!(matches!(
            provider.validate(),
            Err(ModelValidationError::InvalidCcp(_))
        ));
    }
}
