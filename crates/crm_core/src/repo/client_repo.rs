//! Client repository contract and SQLite implementation.
//!
//! # Invariants
//! - `email` is unique across clients; collisions surface as `Duplicate`.
//! - A client referenced by orders or daily-log entries cannot be deleted.

use crate::db::ensure_schema_ready;
use crate::model::party::Client;
use crate::model::RecordId;
use crate::repo::{
    build_list_sql, map_write_error, optional_uuid_text, parse_optional_uuid, parse_uuid,
    ListQuery, RepoError, RepoResult, WriteOp,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ENTITY: &str = "client";

const CLIENT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    phone,
    address,
    professional_domain_id,
    ccp
FROM clients";

/// Repository interface for client records.
pub trait ClientRepository {
    fn create_client(&self, client: &Client) -> RepoResult<RecordId>;
    fn update_client(&self, client: &Client) -> RepoResult<()>;
    fn get_client(&self, id: RecordId) -> RepoResult<Option<Client>>;
    fn list_clients(&self, query: &ListQuery) -> RepoResult<Vec<Client>>;
    fn delete_client(&self, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed client repository.
pub struct SqliteClientRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClientRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn create_client(&self, client: &Client) -> RepoResult<RecordId> {
        client.validate()?;

        self.conn
            .execute(
                "INSERT INTO clients (
                    uuid,
                    name,
                    email,
                    phone,
                    address,
                    professional_domain_id,
                    ccp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    client.uuid.to_string(),
                    client.name.trim(),
                    client.email.as_deref(),
                    client.phone.as_deref(),
                    client.address.as_deref(),
                    optional_uuid_text(client.professional_domain_id),
                    client.ccp.as_deref(),
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, client.uuid))?;

        Ok(client.uuid)
    }

    fn update_client(&self, client: &Client) -> RepoResult<()> {
        client.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE clients
                 SET
                    name = ?1,
                    email = ?2,
                    phone = ?3,
                    address = ?4,
                    professional_domain_id = ?5,
                    ccp = ?6,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?7;",
                params![
                    client.name.trim(),
                    client.email.as_deref(),
                    client.phone.as_deref(),
                    client.address.as_deref(),
                    optional_uuid_text(client.professional_domain_id),
                    client.ccp.as_deref(),
                    client.uuid.to_string(),
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Update, ENTITY, client.uuid))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                id: client.uuid,
            });
        }
        Ok(())
    }

    fn get_client(&self, id: RecordId) -> RepoResult<Option<Client>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CLIENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let client = stmt
            .query_row([id.to_string()], |row| Ok(parse_client_row(row)))
            .optional()?;
        client.transpose()
    }

    fn list_clients(&self, query: &ListQuery) -> RepoResult<Vec<Client>> {
        let mut bind_values: Vec<Value> = Vec::new();
        let sql = build_list_sql(CLIENT_SELECT_SQL, None, "name", query, &mut bind_values);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next()? {
            clients.push(parse_client_row(row)?);
        }
        Ok(clients)
    }

    fn delete_client(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM clients WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTITY, id))?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

fn parse_client_row(row: &Row<'_>) -> RepoResult<Client> {
    let client = Client {
        uuid: parse_uuid(row, "uuid")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        professional_domain_id: parse_optional_uuid(row, "professional_domain_id")?,
        ccp: row.get("ccp")?,
    };
    client.validate()?;
    Ok(client)
}
