//! Gateway contract for daily-log storage and its in-process implementation.

use crate::db::DbError;
use crate::model::daily_log::{DailyLog, DailyLogKind};
use crate::model::RecordId;
use crate::repo::daily_log_repo::SqliteDailyLogRepository;
use crate::repo::{ListQuery, RepoError, RepoResult, LIST_LIMIT_MAX};
use crate::service::daily_log_service::DailyLogService;
use crate::service::ServiceError;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway call that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Create,
    Append,
    Fetch,
    List,
    Close,
}

impl SyncStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Append => "append",
            Self::Fetch => "fetch",
            Self::List => "list",
            Self::Close => "close",
        }
    }
}

/// Gateway failure envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub stage: SyncStage,
    /// Stable machine-readable code, e.g. `not_found`, `store_busy`.
    pub code: String,
    pub message: String,
    /// Whether repeating the same call may succeed.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(
        stage: SyncStage,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            stage,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed ({}): {}",
            self.stage.as_str(),
            self.code,
            self.message
        )
    }
}

impl Error for GatewayError {}

/// Remote-style access to daily logs.
pub trait DailyLogGateway {
    fn create_log(
        &self,
        kind: DailyLogKind,
        log_date: &str,
        first_subject: RecordId,
    ) -> GatewayResult<DailyLog>;
    fn add_entry(&self, log_id: RecordId, subject_id: RecordId) -> GatewayResult<()>;
    fn add_entries(&self, log_id: RecordId, subject_ids: &[RecordId]) -> GatewayResult<()>;
    fn fetch_log(&self, log_id: RecordId) -> GatewayResult<DailyLog>;
    fn fetch_logs(&self, kind: DailyLogKind) -> GatewayResult<Vec<DailyLog>>;
    fn close_log(&self, log_id: RecordId) -> GatewayResult<()>;
}

impl<G: DailyLogGateway + ?Sized> DailyLogGateway for &G {
    fn create_log(
        &self,
        kind: DailyLogKind,
        log_date: &str,
        first_subject: RecordId,
    ) -> GatewayResult<DailyLog> {
        (**self).create_log(kind, log_date, first_subject)
    }

    fn add_entry(&self, log_id: RecordId, subject_id: RecordId) -> GatewayResult<()> {
        (**self).add_entry(log_id, subject_id)
    }

    fn add_entries(&self, log_id: RecordId, subject_ids: &[RecordId]) -> GatewayResult<()> {
        (**self).add_entries(log_id, subject_ids)
    }

    fn fetch_log(&self, log_id: RecordId) -> GatewayResult<DailyLog> {
        (**self).fetch_log(log_id)
    }

    fn fetch_logs(&self, kind: DailyLogKind) -> GatewayResult<Vec<DailyLog>> {
        (**self).fetch_logs(kind)
    }

    fn close_log(&self, log_id: RecordId) -> GatewayResult<()> {
        (**self).close_log(log_id)
    }
}

/// Gateway backed by the local SQLite store.
pub struct LocalGateway<'conn> {
    service: DailyLogService<SqliteDailyLogRepository<'conn>>,
}

impl<'conn> LocalGateway<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self {
            service: DailyLogService::sqlite(conn)?,
        })
    }
}

impl DailyLogGateway for LocalGateway<'_> {
    fn create_log(
        &self,
        kind: DailyLogKind,
        log_date: &str,
        first_subject: RecordId,
    ) -> GatewayResult<DailyLog> {
        self.service
            .open_log(kind, log_date, first_subject)
            .map_err(|err| map_service_error(SyncStage::Create, err))
    }

    fn add_entry(&self, log_id: RecordId, subject_id: RecordId) -> GatewayResult<()> {
        self.service
            .add_entry(log_id, subject_id)
            .map(|_| ())
            .map_err(|err| map_service_error(SyncStage::Append, err))
    }

    fn add_entries(&self, log_id: RecordId, subject_ids: &[RecordId]) -> GatewayResult<()> {
        self.service
            .add_entries(log_id, subject_ids)
            .map(|_| ())
            .map_err(|err| map_service_error(SyncStage::Append, err))
    }

    fn fetch_log(&self, log_id: RecordId) -> GatewayResult<DailyLog> {
        match self.service.get_log(log_id) {
            Ok(Some(log)) => Ok(log),
            Ok(None) => Err(GatewayError::new(
                SyncStage::Fetch,
                "not_found",
                format!("daily log not found: {log_id}"),
                false,
            )),
            Err(err) => Err(map_repo_error(SyncStage::Fetch, err)),
        }
    }

    fn fetch_logs(&self, kind: DailyLogKind) -> GatewayResult<Vec<DailyLog>> {
        let mut logs = Vec::new();
        let mut offset = 0;
        loop {
            let query = ListQuery {
                limit: Some(LIST_LIMIT_MAX),
                offset,
                ..ListQuery::default()
            };
            let page = self
                .service
                .list_logs(Some(kind), &query)
                .map_err(|err| map_repo_error(SyncStage::List, err))?;
            let page_len = page.len();
            logs.extend(page);
            if page_len < LIST_LIMIT_MAX as usize {
                return Ok(logs);
            }
            offset += LIST_LIMIT_MAX;
        }
    }

    fn close_log(&self, log_id: RecordId) -> GatewayResult<()> {
        self.service
            .close_log(log_id)
            .map(|_| ())
            .map_err(|err| map_service_error(SyncStage::Close, err))
    }
}

fn map_service_error(stage: SyncStage, err: ServiceError) -> GatewayError {
    match err {
        ServiceError::Repo(err) => map_repo_error(stage, err),
        // Write landed but the read-back missed it; a later read may see it.
        ServiceError::InconsistentState(details) => {
            GatewayError::new(stage, "inconsistent", details, true)
        }
        other => GatewayError::new(stage, "rejected", other.to_string(), false),
    }
}

fn map_repo_error(stage: SyncStage, err: RepoError) -> GatewayError {
    let message = err.to_string();
    let (code, retryable) = match &err {
        RepoError::NotFound { .. } => ("not_found", false),
        RepoError::LogClosed(_) => ("log_closed", false),
        RepoError::AlreadyClosed(_) => ("already_closed", false),
        RepoError::Duplicate(_) => ("duplicate", false),
        RepoError::Validation(_) => ("invalid", false),
        RepoError::UnknownReference { .. } => ("unknown_reference", false),
        RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _)))
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            ("store_busy", true)
        }
        _ => ("store_error", false),
    };
    GatewayError::new(stage, code, message, retryable)
}
