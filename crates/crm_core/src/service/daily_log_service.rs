//! Daily log use-case service.
//!
//! # Responsibility
//! - Open logs with their first entry, append or remove entries, close logs.
//! - Route "record this client/order" calls to today's open log.
//!
//! # Invariants
//! - Every mutation returns the log as read back from storage.
//! - `record_today` never reopens a closed log.
//! - `record_today_or_skip` never fails the caller.

use crate::model::daily_log::{DailyLog, DailyLogKind};
use crate::model::{epoch_millis, RecordId};
use crate::repo::daily_log_repo::{DailyLogRepository, SqliteDailyLogRepository};
use crate::repo::{ListQuery, RepoError, RepoResult};
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};
use rusqlite::Connection;

pub struct DailyLogService<R: DailyLogRepository> {
    repo: R,
}

impl<'conn> DailyLogService<SqliteDailyLogRepository<'conn>> {
    /// Builds the service over a migrated SQLite connection.
    pub fn sqlite(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(SqliteDailyLogRepository::try_new(conn)?))
    }
}

impl<R: DailyLogRepository> DailyLogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a log for `log_date` holding `first_subject`.
    pub fn open_log(
        &self,
        kind: DailyLogKind,
        log_date: &str,
        first_subject: RecordId,
    ) -> ServiceResult<DailyLog> {
        let mut log = DailyLog::new(kind, log_date);
        log.push_entry(first_subject, epoch_millis())
            .map_err(RepoError::from)?;
        let log_id = self.repo.create_log(&log)?;
        info!(
            "event=daily_log_open module=service status=ok kind={} log_date={}",
            kind.as_str(),
            log_date
        );
        self.read_back(log_id, "opened daily log not found in read-back")
    }

    /// Appends one entry; already-present subjects are left as is.
    pub fn add_entry(&self, log_id: RecordId, subject_id: RecordId) -> ServiceResult<DailyLog> {
        self.repo.add_entry(log_id, subject_id)?;
        self.read_back(log_id, "daily log missing after entry append")
    }

    /// Appends a batch of entries in one transaction.
    pub fn add_entries(
        &self,
        log_id: RecordId,
        subject_ids: &[RecordId],
    ) -> ServiceResult<DailyLog> {
        self.repo.add_entries(log_id, subject_ids)?;
        self.read_back(log_id, "daily log missing after batch append")
    }

    /// Drops `subject_id` from an open log, e.g. before deleting the subject.
    pub fn remove_entry(
        &self,
        log_id: RecordId,
        subject_id: RecordId,
    ) -> ServiceResult<DailyLog> {
        if self.repo.remove_entry(log_id, subject_id)? {
            info!(
                "event=daily_log_entry_remove module=service status=ok log_id={}",
                log_id
            );
        }
        self.read_back(log_id, "daily log missing after entry removal")
    }

    pub fn close_log(&self, log_id: RecordId) -> ServiceResult<DailyLog> {
        let log = self.repo.close_log(log_id)?;
        info!(
            "event=daily_log_close module=service status=ok kind={} log_date={} entries={}",
            log.kind.as_str(),
            log.log_date,
            log.entries.len()
        );
        Ok(log)
    }

    pub fn get_log(&self, log_id: RecordId) -> RepoResult<Option<DailyLog>> {
        self.repo.get_log(log_id)
    }

    pub fn find_log(&self, kind: DailyLogKind, log_date: &str) -> RepoResult<Option<DailyLog>> {
        self.repo.find_log(kind, log_date)
    }

    pub fn list_logs(
        &self,
        kind: Option<DailyLogKind>,
        query: &ListQuery,
    ) -> RepoResult<Vec<DailyLog>> {
        self.repo.list_logs(kind, query)
    }

    pub fn today(&self) -> RepoResult<String> {
        self.repo.current_date()
    }

    /// Adds `subject_id` to today's log of `kind`, opening it when missing.
    ///
    /// Fails with `RepoError::LogClosed` when today's log is already closed.
    pub fn record_today(&self, kind: DailyLogKind, subject_id: RecordId) -> ServiceResult<DailyLog> {
        let today = self.repo.current_date()?;
        if let Some(log) = self.repo.find_log(kind, &today)? {
            return self.add_entry(log.uuid, subject_id);
        }

        match self.open_log(kind, &today, subject_id) {
            // Another writer opened the log between lookup and insert.
            Err(ServiceError::Repo(RepoError::Duplicate(_))) => {
                warn!(
                    "event=daily_log_open module=service status=retry kind={} log_date={} reason=duplicate",
                    kind.as_str(),
                    today
                );
                let log = self
                    .repo
                    .find_log(kind, &today)?
                    .ok_or(ServiceError::InconsistentState(
                        "daily log vanished after duplicate insert",
                    ))?;
                self.add_entry(log.uuid, subject_id)
            }
            other => other,
        }
    }

    /// Records `subject_id` in today's log of `kind` after the subject itself
    /// was stored. A failure is logged and skipped so it never undoes or fails
    /// the stored record; returns the log when the entry went in.
    pub fn record_today_or_skip(
        &self,
        kind: DailyLogKind,
        subject_id: RecordId,
    ) -> Option<DailyLog> {
        match self.record_today(kind, subject_id) {
            Ok(log) => Some(log),
            Err(ServiceError::Repo(RepoError::LogClosed(log_id))) => {
                warn!(
                    "event=daily_log_record module=service status=skipped kind={} log_id={} reason=log_closed",
                    kind.as_str(),
                    log_id
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=daily_log_record module=service status=skipped kind={} reason=error error={}",
                    kind.as_str(),
                    err
                );
                None
            }
        }
    }

    fn read_back(&self, log_id: RecordId, details: &'static str) -> ServiceResult<DailyLog> {
        self.repo
            .get_log(log_id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}
