//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQLite query details from service/business orchestration.
//! - Translate SQLite constraint failures into semantic errors.
//!
//! # Invariants
//! - Repository writes call `validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Multi-row writes run inside one transaction.

use crate::db::DbError;
use crate::model::daily_log::DailyLogError;
use crate::model::{ModelValidationError, RecordId};
use rusqlite::types::Value;
use rusqlite::{ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod client_repo;
pub mod daily_log_repo;
pub mod invoice_repo;
pub mod lookup_repo;
pub mod order_repo;
pub mod product_repo;
pub mod provider_repo;

pub const LIST_DEFAULT_LIMIT: u32 = 25;
pub const LIST_LIMIT_MAX: u32 = 200;

const CLOSED_LOG_MESSAGE: &str = "daily log is closed";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by every aggregate.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: RecordId,
    },
    InvalidData(String),
    /// Delete blocked because another record still points at this one.
    Referenced {
        entity: &'static str,
        id: RecordId,
    },
    /// Write points at a record that does not exist.
    UnknownReference {
        entity: &'static str,
        id: RecordId,
    },
    /// Unique constraint violation, with an operator-facing message.
    Duplicate(String),
    /// Stock change would leave the product below zero.
    InsufficientStock(RecordId),
    /// Lifecycle change not allowed from the current state.
    InvalidTransition(String),
    LogClosed(RecordId),
    AlreadyClosed(RecordId),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Referenced { entity, id } => write!(
                f,
                "{entity} {id} is still referenced by other records and cannot be deleted"
            ),
            Self::UnknownReference { entity, id } => write!(
                f,
                "{entity} {id} refers to a record that does not exist"
            ),
            Self::Duplicate(message) => write!(f, "{message}"),
            Self::InsufficientStock(id) => write!(f, "insufficient stock for product {id}"),
            Self::InvalidTransition(message) => write!(f, "{message}"),
            Self::LogClosed(id) => write!(f, "daily log {id} is closed and accepts no entries"),
            Self::AlreadyClosed(id) => write!(f, "daily log {id} is already closed"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<DailyLogError> for RepoError {
    fn from(value: DailyLogError) -> Self {
        match value {
            DailyLogError::AlreadyClosed(id) => Self::AlreadyClosed(id),
            DailyLogError::Closed(id) => Self::LogClosed(id),
        }
    }
}

/// Sort options for list screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    /// Renders an `ORDER BY` body; `uuid` breaks ties so pages are stable.
    pub(crate) fn order_by(self, name_column: &str) -> String {
        match self {
            Self::NewestFirst => "created_at DESC, uuid ASC".to_string(),
            Self::OldestFirst => "created_at ASC, uuid ASC".to_string(),
            Self::NameAsc => format!("{name_column} COLLATE NOCASE ASC, uuid ASC"),
            Self::NameDesc => format!("{name_column} COLLATE NOCASE DESC, uuid ASC"),
        }
    }
}

/// Query options shared by list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Case-insensitive substring filter on the display column.
    pub search: Option<String>,
    pub sort: SortOrder,
    /// Defaults to 25 and clamps to 200.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    pub(crate) fn normalized_search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
    }
}

/// Normalizes list limit with default and upper bound.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => LIST_DEFAULT_LIMIT,
        Some(value) => value.min(LIST_LIMIT_MAX),
    }
}

/// Builds `SELECT ... WHERE ... ORDER BY ... LIMIT ? OFFSET ?` for a flat
/// table listing.
pub(crate) fn build_list_sql(
    select_sql: &str,
    base_filter: Option<&str>,
    name_column: &str,
    query: &ListQuery,
    bind_values: &mut Vec<Value>,
) -> String {
    let mut sql = format!("{select_sql} WHERE 1 = 1");
    if let Some(filter) = base_filter {
        sql.push_str(" AND ");
        sql.push_str(filter);
    }
    if let Some(search) = query.normalized_search() {
        sql.push_str(&format!(" AND instr(lower({name_column}), ?) > 0"));
        bind_values.push(Value::Text(search));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&query.sort.order_by(name_column));
    sql.push_str(" LIMIT ? OFFSET ?");
    bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
    bind_values.push(Value::Integer(i64::from(query.offset)));
    sql
}

/// Kind of write that produced a SQLite error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// Maps SQLite constraint failures to semantic repository errors.
///
/// Extended result codes are checked first; the error text is the fallback
/// for builds that do not expose them.
pub(crate) fn map_write_error(
    err: rusqlite::Error,
    op: WriteOp,
    entity: &'static str,
    id: RecordId,
) -> RepoError {
    let (code, extended, message) = match &err {
        rusqlite::Error::SqliteFailure(failure, message) => (
            failure.code,
            failure.extended_code,
            message.clone().unwrap_or_default(),
        ),
        _ => return RepoError::from(err),
    };
    if code != ErrorCode::ConstraintViolation {
        return RepoError::from(err);
    }

    let is_foreign_key = extended == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        || message.contains("FOREIGN KEY constraint failed");
    let is_unique = extended == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || extended == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        || message.contains("UNIQUE constraint failed");

    if message.contains(CLOSED_LOG_MESSAGE) {
        return RepoError::LogClosed(id);
    }
    if is_foreign_key {
        return match op {
            WriteOp::Delete => RepoError::Referenced { entity, id },
            WriteOp::Insert | WriteOp::Update => RepoError::UnknownReference { entity, id },
        };
    }
    if is_unique {
        let column = message
            .rsplit('.')
            .next()
            .filter(|_| message.contains('.'))
            .unwrap_or("key");
        return RepoError::Duplicate(format!(
            "a {entity} with the same {column} already exists"
        ));
    }
    RepoError::from(err)
}

pub(crate) fn parse_uuid(row: &Row<'_>, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

pub(crate) fn parse_optional_uuid(row: &Row<'_>, column: &str) -> RepoResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Uuid::parse_str(&text).map(Some).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}"))
        }),
        None => Ok(None),
    }
}

pub(crate) fn optional_uuid_text(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_list_limit, SortOrder, LIST_DEFAULT_LIMIT, LIST_LIMIT_MAX};

    #[test]
    fn list_limit_defaults_and_clamps() {
        assert_eq!(normalize_list_limit(None), LIST_DEFAULT_LIMIT);
        assert_eq!(normalize_list_limit(Some(0)), LIST_DEFAULT_LIMIT);
        assert_eq!(normalize_list_limit(Some(10)), 10);
        assert_eq!(normalize_list_limit(Some(5_000)), LIST_LIMIT_MAX);
    }

    #[test]
    fn sort_order_renders_name_column() {
        assert_eq!(
            SortOrder::NameDesc.order_by("reference"),
            "reference COLLATE NOCASE DESC, uuid ASC"
        );
        assert!(SortOrder::default().order_by("name").starts_with("created_at DESC"));
    }
}
