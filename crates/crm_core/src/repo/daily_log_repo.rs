//! Daily log repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist client/order daily logs and their entries.
//! - Enforce the one-way `open -> closed` transition at the storage edge.
//!
//! # Invariants
//! - One log per `(kind, log_date)`; a second create is `Duplicate`.
//! - Entry writes and removals are idempotent per subject and rejected on
//!   closed logs.
//! - Batch appends run in one immediate transaction: all or nothing.
//! - Entries are returned in insertion order.

use crate::db::ensure_schema_ready;
use crate::model::daily_log::{DailyLog, DailyLogEntry, DailyLogKind, DailyLogStatus};
use crate::model::{epoch_millis, RecordId};
use crate::repo::{
    build_list_sql, map_write_error, parse_uuid, ListQuery, RepoError, RepoResult, WriteOp,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const ENTITY: &str = "daily log";
const ENTRY_ENTITY: &str = "daily log entry";

const LOG_SELECT_SQL: &str = "SELECT uuid, kind, log_date, status, closed_at FROM daily_logs";

pub trait DailyLogRepository {
    /// Inserts an open log together with its initial entries.
    fn create_log(&self, log: &DailyLog) -> RepoResult<RecordId>;
    /// Appends one entry; returns `false` when the subject is already logged.
    fn add_entry(&self, log_id: RecordId, subject_id: RecordId) -> RepoResult<bool>;
    /// Appends many entries atomically; returns how many were new.
    fn add_entries(&self, log_id: RecordId, subject_ids: &[RecordId]) -> RepoResult<usize>;
    /// Drops a subject from an open log; returns `false` when it was not
    /// logged there.
    fn remove_entry(&self, log_id: RecordId, subject_id: RecordId) -> RepoResult<bool>;
    fn get_log(&self, id: RecordId) -> RepoResult<Option<DailyLog>>;
    fn find_log(&self, kind: DailyLogKind, log_date: &str) -> RepoResult<Option<DailyLog>>;
    /// `query.search` matches the log date text.
    fn list_logs(&self, kind: Option<DailyLogKind>, query: &ListQuery)
        -> RepoResult<Vec<DailyLog>>;
    /// Closes an open log, stamping `closed_at` with the store clock.
    fn close_log(&self, id: RecordId) -> RepoResult<DailyLog>;
    /// Calendar date of the store clock, `YYYY-MM-DD`, local time.
    fn current_date(&self) -> RepoResult<String>;
}

pub struct SqliteDailyLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDailyLogRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DailyLogRepository for SqliteDailyLogRepository<'_> {
    fn create_log(&self, log: &DailyLog) -> RepoResult<RecordId> {
        log.validate()?;
        if !log.is_open() {
            return Err(RepoError::LogClosed(log.uuid));
        }

        let log_id = log.uuid.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO daily_logs (uuid, kind, log_date, status, closed_at)
             VALUES (?1, ?2, ?3, ?4, NULL);",
            params![
                log_id.as_str(),
                log.kind.as_str(),
                log.log_date.as_str(),
                log.status.as_str(),
            ],
        )
        .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, log.uuid))?;

        let (table, column) = entry_table(log.kind);
        for entry in &log.entries {
            tx.execute(
                &format!("INSERT INTO {table} (log_id, {column}, added_at) VALUES (?1, ?2, ?3);"),
                params![log_id.as_str(), entry.subject_id.to_string(), entry.added_at],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, ENTRY_ENTITY, entry.subject_id))?;
        }

        tx.commit()?;
        debug!(
            "event=daily_log_create module=repo status=ok kind={} entries={}",
            log.kind.as_str(),
            log.entries.len()
        );
        Ok(log.uuid)
    }

    fn add_entry(&self, log_id: RecordId, subject_id: RecordId) -> RepoResult<bool> {
        self.add_entries(log_id, &[subject_id]).map(|added| added == 1)
    }

    fn add_entries(&self, log_id: RecordId, subject_ids: &[RecordId]) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (kind, status) = load_header_state(&tx, log_id)?;
        if status == DailyLogStatus::Closed {
            return Err(RepoError::LogClosed(log_id));
        }

        let (table, column) = entry_table(kind);
        let insert_sql = format!(
            "INSERT OR IGNORE INTO {table} (log_id, {column}, added_at) VALUES (?1, ?2, ?3);"
        );
        let added_at = epoch_millis();
        let mut added = 0;
        for subject_id in subject_ids {
            added += tx
                .execute(
                    &insert_sql,
                    params![log_id.to_string(), subject_id.to_string(), added_at],
                )
                .map_err(|err| map_write_error(err, WriteOp::Insert, ENTRY_ENTITY, *subject_id))?;
        }

        if added > 0 {
            tx.execute(
                "UPDATE daily_logs
                 SET updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                [log_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(added)
    }

    fn remove_entry(&self, log_id: RecordId, subject_id: RecordId) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (kind, status) = load_header_state(&tx, log_id)?;
        if status == DailyLogStatus::Closed {
            return Err(RepoError::LogClosed(log_id));
        }

        let (table, column) = entry_table(kind);
        let removed = tx
            .execute(
                &format!("DELETE FROM {table} WHERE log_id = ?1 AND {column} = ?2;"),
                params![log_id.to_string(), subject_id.to_string()],
            )
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTRY_ENTITY, log_id))?;
        if removed > 0 {
            tx.execute(
                "UPDATE daily_logs
                 SET updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                [log_id.to_string()],
            )?;
        }
        tx.commit()?;
        debug!(
            "event=daily_log_entry_remove module=repo status=ok kind={} removed={}",
            kind.as_str(),
            removed
        );
        Ok(removed > 0)
    }

    fn get_log(&self, id: RecordId) -> RepoResult<Option<DailyLog>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LOG_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => load_full_log(self.conn, row).map(Some),
            None => Ok(None),
        }
    }

    fn find_log(&self, kind: DailyLogKind, log_date: &str) -> RepoResult<Option<DailyLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LOG_SELECT_SQL} WHERE kind = ?1 AND log_date = ?2;"
        ))?;
        let mut rows = stmt.query(params![kind.as_str(), log_date])?;
        match rows.next()? {
            Some(row) => load_full_log(self.conn, row).map(Some),
            None => Ok(None),
        }
    }

    fn list_logs(
        &self,
        kind: Option<DailyLogKind>,
        query: &ListQuery,
    ) -> RepoResult<Vec<DailyLog>> {
        let mut bind_values: Vec<Value> = Vec::new();
        let base_filter = kind.map(|kind| {
            bind_values.push(Value::Text(kind.as_str().to_string()));
            "kind = ?"
        });
        let sql = build_list_sql(LOG_SELECT_SQL, base_filter, "log_date", query, &mut bind_values);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(load_full_log(self.conn, row)?);
        }
        Ok(logs)
    }

    fn close_log(&self, id: RecordId) -> RepoResult<DailyLog> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (_, status) = load_header_state(&tx, id)?;
        if status == DailyLogStatus::Closed {
            return Err(RepoError::AlreadyClosed(id));
        }
        tx.execute(
            "UPDATE daily_logs
             SET
                status = 'closed',
                closed_at = (strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status = 'open';",
            [id.to_string()],
        )?;
        tx.commit()?;

        self.get_log(id)?.ok_or(RepoError::NotFound { entity: ENTITY, id })
    }

    fn current_date(&self) -> RepoResult<String> {
        let date = self
            .conn
            .query_row("SELECT date('now', 'localtime');", [], |row| row.get(0))?;
        Ok(date)
    }
}

fn entry_table(kind: DailyLogKind) -> (&'static str, &'static str) {
    match kind {
        DailyLogKind::Client => ("client_log_entries", "client_id"),
        DailyLogKind::Order => ("order_log_entries", "order_id"),
    }
}

fn load_header_state(
    conn: &Connection,
    id: RecordId,
) -> RepoResult<(DailyLogKind, DailyLogStatus)> {
    let mut stmt = conn.prepare("SELECT kind, status FROM daily_logs WHERE uuid = ?1;")?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Err(RepoError::NotFound { entity: ENTITY, id });
    };
    Ok((parse_kind(row)?, parse_status(row)?))
}

fn load_full_log(conn: &Connection, row: &Row<'_>) -> RepoResult<DailyLog> {
    let mut log = DailyLog {
        uuid: parse_uuid(row, "uuid")?,
        kind: parse_kind(row)?,
        log_date: row.get("log_date")?,
        status: parse_status(row)?,
        closed_at: row.get("closed_at")?,
        entries: Vec::new(),
    };

    let (table, column) = entry_table(log.kind);
    let mut stmt = conn.prepare(&format!(
        "SELECT {column} AS subject_id, added_at
         FROM {table}
         WHERE log_id = ?1
         ORDER BY rowid ASC;"
    ))?;
    let mut rows = stmt.query([log.uuid.to_string()])?;
    while let Some(entry_row) = rows.next()? {
        log.entries.push(DailyLogEntry {
            subject_id: parse_uuid(entry_row, "subject_id")?,
            added_at: entry_row.get("added_at")?,
        });
    }

    log.validate()?;
    Ok(log)
}

fn parse_kind(row: &Row<'_>) -> RepoResult<DailyLogKind> {
    let text: String = row.get("kind")?;
    DailyLogKind::parse(&text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid daily log kind `{text}` in daily_logs.kind"))
    })
}

fn parse_status(row: &Row<'_>) -> RepoResult<DailyLogStatus> {
    let text: String = row.get("status")?;
    DailyLogStatus::parse(&text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid daily log status `{text}` in daily_logs.status"
        ))
    })
}
