//! Business record model for the distribution CRM.
//!
//! # Responsibility
//! - Define the flat records persisted by the core (parties, catalog,
//!   orders, invoices, daily logs).
//! - Own record-level validation and lifecycle transitions.
//!
//! # Invariants
//! - Every record is identified by a stable `Uuid`.
//! - Repositories call `validate()` before every write and after every read.
//! - Money is stored as integer cents; dates as `YYYY-MM-DD` text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod catalog;
pub mod daily_log;
pub mod invoice;
pub mod order;
pub mod party;

/// Stable identifier shared by every record kind.
pub type RecordId = Uuid;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid date regex"));

/// Record-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// A required text field is empty or whitespace.
    BlankField(&'static str),
    InvalidEmail(String),
    InvalidCcp(String),
    /// Calendar date not in `YYYY-MM-DD` form or out of range.
    InvalidDate(String),
    NegativeAmount(&'static str),
    NonPositiveQuantity(RecordId),
    /// Orders and invoices need at least one line.
    NoItems,
    DuplicateEntry(RecordId),
    /// `closed_at` disagrees with the daily log status.
    ClosedStateMismatch,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email `{value}`"),
            Self::InvalidCcp(value) => write!(f, "invalid CCP number `{value}`"),
            Self::InvalidDate(value) => {
                write!(f, "invalid date `{value}`; expected YYYY-MM-DD")
            }
            Self::NegativeAmount(field) => write!(f, "{field} must not be negative"),
            Self::NonPositiveQuantity(product_id) => {
                write!(f, "quantity for product {product_id} must be positive")
            }
            Self::NoItems => write!(f, "at least one line item is required"),
            Self::DuplicateEntry(subject_id) => {
                write!(f, "daily log already contains {subject_id}")
            }
            Self::ClosedStateMismatch => {
                write!(f, "closed_at must be set exactly when the log is closed")
            }
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_optional_email(value: Option<&str>) -> Result<(), ModelValidationError> {
    let Some(email) = value else {
        return Ok(());
    };
    let mut parts = email.split('@');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None)
            if !local.trim().is_empty() && !domain.trim().is_empty()
    );
    if valid {
        Ok(())
    } else {
        Err(ModelValidationError::InvalidEmail(email.to_string()))
    }
}

pub(crate) fn require_optional_ccp(value: Option<&str>) -> Result<(), ModelValidationError> {
    match value {
        Some(ccp) if crate::ccp::normalize_ccp(ccp).is_none() => {
            Err(ModelValidationError::InvalidCcp(ccp.to_string()))
        }
        _ => Ok(()),
    }
}

/// Returns whether `value` is a `YYYY-MM-DD` date with month 1..=12 and
/// day 1..=31.
pub fn is_valid_date(value: &str) -> bool {
    let Some(caps) = DATE_RE.captures(value) else {
        return false;
    };
    let month = caps[2].parse::<u32>().unwrap_or(0);
    let day = caps[3].parse::<u32>().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

pub(crate) fn require_date(value: &str) -> Result<(), ModelValidationError> {
    if is_valid_date(value) {
        Ok(())
    } else {
        Err(ModelValidationError::InvalidDate(value.to_string()))
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
pub(crate) fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_date, require_optional_ccp, require_optional_email};

    #[test]
    fn date_check_accepts_calendar_shape() {
        assert!(is_valid_date("2024-02-29"));
        assert!(is_valid_date("1999-12-31"));
        assert!(!is_valid_date("2024-13-01"));
        assert!(!is_valid_date("2024-00-10"));
        assert!(!is_valid_date("2024-01-32"));
        assert!(!is_valid_date("24-01-01"));
        assert!(!is_valid_date("2024/01/01"));
    }

    #[test]
    fn email_check_requires_single_at() {
        assert!(require_optional_email(None).is_ok());
        assert!(require_optional_email(Some("sales@distrib.dz")).is_ok());
        assert!(require_optional_email(Some("no-at-sign")).is_err());
        assert!(require_optional_email(Some("a@b@c")).is_err());
        assert!(require_optional_email(Some("@domain")).is_err());
    }

    #[test]
    fn ccp_check_uses_normalization() {
        assert!(require_optional_ccp(Some("0012345678")).is_ok());
        assert!(require_optional_ccp(Some("12ab")).is_err());
    }
}
