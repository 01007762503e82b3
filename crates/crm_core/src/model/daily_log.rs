//! Daily log model: per-day rollups of clients or orders processed.
//!
//! # Responsibility
//! - Group the clients (or orders) added on one calendar date.
//! - Own the one-way `open -> closed` lifecycle.
//!
//! # Invariants
//! - At most one log exists per `(kind, log_date)`; enforced by storage.
//! - `closed_at` is set exactly when `status == Closed`.
//! - A closed log accepts no further entries.
//! - A subject appears at most once in `entries`.

use super::{require_date, ModelValidationError, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// What the log entries point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyLogKind {
    Client,
    Order,
}

impl DailyLogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Order => "order",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(Self::Client),
            "order" => Some(Self::Order),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyLogStatus {
    Open,
    /// Terminal.
    Closed,
}

impl DailyLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLogEntry {
    /// Client or order ID, depending on the log kind.
    pub subject_id: RecordId,
    /// Unix epoch milliseconds.
    pub added_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub uuid: RecordId,
    pub kind: DailyLogKind,
    pub log_date: String,
    pub status: DailyLogStatus,
    /// Unix epoch milliseconds; present only once closed.
    pub closed_at: Option<i64>,
    /// Ordered by insertion.
    pub entries: Vec<DailyLogEntry>,
}

/// Lifecycle violation on a daily log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyLogError {
    AlreadyClosed(RecordId),
    Closed(RecordId),
}

impl Display for DailyLogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyClosed(id) => write!(f, "daily log {id} is already closed"),
            Self::Closed(id) => write!(f, "daily log {id} is closed and accepts no entries"),
        }
    }
}

impl Error for DailyLogError {}

impl DailyLog {
    /// Creates an open, empty log with a generated stable ID.
    pub fn new(kind: DailyLogKind, log_date: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind,
            log_date: log_date.into(),
            status: DailyLogStatus::Open,
            closed_at: None,
            entries: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == DailyLogStatus::Open
    }

    pub fn contains(&self, subject_id: RecordId) -> bool {
        self.entries.iter().any(|entry| entry.subject_id == subject_id)
    }

    /// Appends an entry. Returns `Ok(false)` when the subject is already
    /// logged.
    pub fn push_entry(&mut self, subject_id: RecordId, added_at: i64) -> Result<bool, DailyLogError> {
        if !self.is_open() {
            return Err(DailyLogError::Closed(self.uuid));
        }
        if self.contains(subject_id) {
            return Ok(false);
        }
        self.entries.push(DailyLogEntry {
            subject_id,
            added_at,
        });
        Ok(true)
    }

    /// Closes the log and stamps `closed_at`.
    pub fn close(&mut self, closed_at: i64) -> Result<(), DailyLogError> {
        if !self.is_open() {
            return Err(DailyLogError::AlreadyClosed(self.uuid));
        }
        self.status = DailyLogStatus::Closed;
        self.closed_at = Some(closed_at);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_date(&self.log_date)?;
        if self.closed_at.is_some() != (self.status == DailyLogStatus::Closed) {
            return Err(ModelValidationError::ClosedStateMismatch);
        }
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.subject_id) {
                return Err(ModelValidationError::DuplicateEntry(entry.subject_id));
            }
        }
        Ok(())
    }
}
