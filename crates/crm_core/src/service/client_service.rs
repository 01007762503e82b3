//! Client use-case service.
//!
//! # Invariants
//! - Every created client is recorded in today's client daily log unless
//!   that log is already closed or the append fails; either case is logged
//!   and the stored client is still returned.
//! - A client listed in any daily log is `Referenced` and cannot be deleted.

use crate::ccp::CcpRecord;
use crate::model::daily_log::{DailyLog, DailyLogKind};
use crate::model::party::Client;
use crate::model::RecordId;
use crate::repo::client_repo::{ClientRepository, SqliteClientRepository};
use crate::repo::daily_log_repo::{DailyLogRepository, SqliteDailyLogRepository};
use crate::repo::{ListQuery, RepoResult};
use crate::service::daily_log_service::DailyLogService;
use crate::service::{ServiceError, ServiceResult};
use rusqlite::Connection;

pub struct ClientService<C: ClientRepository, L: DailyLogRepository> {
    clients: C,
    logs: DailyLogService<L>,
}

impl<'conn> ClientService<SqliteClientRepository<'conn>, SqliteDailyLogRepository<'conn>> {
    pub fn sqlite(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteClientRepository::try_new(conn)?,
            SqliteDailyLogRepository::try_new(conn)?,
        ))
    }
}

impl<C: ClientRepository, L: DailyLogRepository> ClientService<C, L> {
    pub fn new(clients: C, logs: L) -> Self {
        Self {
            clients,
            logs: DailyLogService::new(logs),
        }
    }

    /// Persists a client and appends it to today's client log.
    pub fn create_client(&self, client: &Client) -> ServiceResult<Client> {
        let client_id = self.clients.create_client(client)?;
        self.logs.record_today_or_skip(DailyLogKind::Client, client_id);
        self.clients
            .get_client(client_id)?
            .ok_or(ServiceError::InconsistentState(
                "created client not found in read-back",
            ))
    }

    pub fn update_client(&self, client: &Client) -> ServiceResult<Client> {
        self.clients.update_client(client)?;
        self.clients
            .get_client(client.uuid)?
            .ok_or(ServiceError::InconsistentState(
                "updated client not found in read-back",
            ))
    }

    pub fn get_client(&self, id: RecordId) -> RepoResult<Option<Client>> {
        self.clients.get_client(id)
    }

    pub fn list_clients(&self, query: &ListQuery) -> RepoResult<Vec<Client>> {
        self.clients.list_clients(query)
    }

    /// Deletes a client; fails with `Referenced` while orders or daily logs
    /// still point at it.
    ///
    /// `create_client` logs every new client, so a client is only deletable
    /// after `DailyLogService::remove_entry` took it out of its open log.
    /// Clients in a closed log stay on record for good.
    pub fn delete_client(&self, id: RecordId) -> RepoResult<()> {
        self.clients.delete_client(id)
    }

    /// Postal identifiers for a client; invalid when no CCP is on file.
    pub fn client_ccp(&self, id: RecordId) -> ServiceResult<CcpRecord> {
        let client = self
            .clients
            .get_client(id)?
            .ok_or(ServiceError::UnknownClient(id))?;
        Ok(client.ccp_record().unwrap_or_else(CcpRecord::invalid))
    }

    /// Today's client log, if one was opened.
    pub fn todays_log(&self) -> RepoResult<Option<DailyLog>> {
        let today = self.logs.today()?;
        self.logs.find_log(DailyLogKind::Client, &today)
    }
}

#[cfg(test)]
mod tests {
    use super::ClientService;
    use crate::db::open_db_in_memory;
    use crate::model::daily_log::{DailyLog, DailyLogKind};
    use crate::model::party::Client;
    use crate::model::RecordId;
    use crate::repo::client_repo::SqliteClientRepository;
    use crate::repo::daily_log_repo::DailyLogRepository;
    use crate::repo::{ListQuery, RepoError, RepoResult};

    /// Log store whose clock is unreadable, so every `record_today` fails.
    struct BrokenClockLogs;

    fn broken<T>() -> RepoResult<T> {
        Err(RepoError::InvalidData("clock unavailable".to_string()))
    }

    impl DailyLogRepository for BrokenClockLogs {
        fn create_log(&self, _log: &DailyLog) -> RepoResult<RecordId> {
            broken()
        }
        fn add_entry(&self, _log_id: RecordId, _subject_id: RecordId) -> RepoResult<bool> {
            broken()
        }
        fn add_entries(&self, _log_id: RecordId, _subject_ids: &[RecordId]) -> RepoResult<usize> {
            broken()
        }
        fn remove_entry(&self, _log_id: RecordId, _subject_id: RecordId) -> RepoResult<bool> {
            broken()
        }
        fn get_log(&self, _id: RecordId) -> RepoResult<Option<DailyLog>> {
            Ok(None)
        }
        fn find_log(&self, _kind: DailyLogKind, _log_date: &str) -> RepoResult<Option<DailyLog>> {
            Ok(None)
        }
        fn list_logs(
            &self,
            _kind: Option<DailyLogKind>,
            _query: &ListQuery,
        ) -> RepoResult<Vec<DailyLog>> {
            Ok(Vec::new())
        }
        fn close_log(&self, _id: RecordId) -> RepoResult<DailyLog> {
            broken()
        }
        fn current_date(&self) -> RepoResult<String> {
            broken()
        }
    }

    #[test]
    fn failed_log_append_still_returns_the_stored_client() {
        let conn = open_db_in_memory().unwrap();
        let service =
            ClientService::new(SqliteClientRepository::try_new(&conn).unwrap(), BrokenClockLogs);

        let mut client = Client::new("Superette Yasmine");
        client.email = Some("contact@yasmine.dz".to_string());
        let created = service.create_client(&client).unwrap();
        assert_eq!(created.uuid, client.uuid);
        assert!(service.get_client(created.uuid).unwrap().is_some());
    }
}
