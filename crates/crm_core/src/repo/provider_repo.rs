//! Provider repository contract and SQLite implementation.
//!
//! # Invariants
//! - A provider referenced by an invoice cannot be deleted.

use crate::db::ensure_schema_ready;
use crate::model::party::Provider;
use crate::model::RecordId;
use crate::repo::{
    build_list_sql, map_write_error, parse_uuid, ListQuery, RepoError, RepoResult, WriteOp,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ENTITY: &str = "provider";

const PROVIDER_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    phone,
    address,
    ccp
FROM providers";

/// Repository interface for provider records.
pub trait ProviderRepository {
    fn create_provider(&self, provider: &Provider) -> RepoResult<RecordId>;
    fn update_provider(&self, provider: &Provider) -> RepoResult<()>;
    fn get_provider(&self, id: RecordId) -> RepoResult<Option<Provider>>;
    fn list_providers(&self, query: &ListQuery) -> RepoResult<Vec<Provider>>;
    fn delete_provider(&self, id: RecordId) -> RepoResult<()>;
}

/// SQLite-backed provider repository.
pub struct SqliteProviderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProviderRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ProviderRepository for SqliteProviderRepository<'_> {
    fn create_provider(&self, provider: &Provider) -> RepoResult<RecordId> {
        provider.validate()?;

        self.conn
            .execute(
                "INSERT INTO providers (uuid, name, email, phone, address, ccp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    provider.uuid.to_string(),
                    provider.name.trim(),
                    provider.email.as_deref(),
                    provider.phone.as_deref(),
                    provider.address.as_deref(),
                    provider.ccp.as_deref(),
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, provider.uuid))?;

        Ok(provider.uuid)
    }

    fn update_provider(&self, provider: &Provider) -> RepoResult<()> {
        provider.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE providers
                 SET
                    name = ?1,
                    email = ?2,
                    phone = ?3,
                    address = ?4,
                    ccp = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?6;",
                params![
                    provider.name.trim(),
                    provider.email.as_deref(),
                    provider.phone.as_deref(),
                    provider.address.as_deref(),
                    provider.ccp.as_deref(),
                    provider.uuid.to_string(),
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Update, ENTITY, provider.uuid))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                id: provider.uuid,
            });
        }
        Ok(())
    }

    fn get_provider(&self, id: RecordId) -> RepoResult<Option<Provider>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROVIDER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_provider_row(row)?));
        }
        Ok(None)
    }

    fn list_providers(&self, query: &ListQuery) -> RepoResult<Vec<Provider>> {
        let mut bind_values: Vec<Value> = Vec::new();
        let sql = build_list_sql(PROVIDER_SELECT_SQL, None, "name", query, &mut bind_values);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut providers = Vec::new();
        while let Some(row) = rows.next()? {
            providers.push(parse_provider_row(row)?);
        }
        Ok(providers)
    }

    fn delete_provider(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM providers WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTITY, id))?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

fn parse_provider_row(row: &Row<'_>) -> RepoResult<Provider> {
    let provider = Provider {
        uuid: parse_uuid(row, "uuid")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        ccp: row.get("ccp")?,
    };
    provider.validate()?;
    Ok(provider)
}
