//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Record created clients and orders in the matching daily log.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Writes are confirmed by reading the record back.

use crate::model::RecordId;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod client_service;
pub mod daily_log_service;
pub mod order_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for CRM use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Persistence-layer failure.
    Repo(RepoError),
    UnknownClient(RecordId),
    UnknownProduct(RecordId),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::UnknownClient(id) => write!(f, "client not found: {id}"),
            Self::UnknownProduct(id) => write!(f, "product not found: {id}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
