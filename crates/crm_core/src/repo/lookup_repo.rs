//! Lookup tables: categories, brands and professional domains.
//!
//! All three share one `lookups` table keyed by `kind`; names are unique
//! per kind.

use crate::db::ensure_schema_ready;
use crate::model::catalog::{LookupKind, LookupRecord};
use crate::model::RecordId;
use crate::repo::{
    build_list_sql, map_write_error, parse_uuid, ListQuery, RepoError, RepoResult, WriteOp,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ENTITY: &str = "lookup";

pub trait LookupRepository {
    fn create_lookup(&self, record: &LookupRecord) -> RepoResult<RecordId>;
    fn rename_lookup(&self, id: RecordId, name: &str) -> RepoResult<()>;
    fn list_lookups(&self, kind: LookupKind, query: &ListQuery) -> RepoResult<Vec<LookupRecord>>;
    fn delete_lookup(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteLookupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLookupRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LookupRepository for SqliteLookupRepository<'_> {
    fn create_lookup(&self, record: &LookupRecord) -> RepoResult<RecordId> {
        record.validate()?;
        self.conn
            .execute(
                "INSERT INTO lookups (uuid, kind, name) VALUES (?1, ?2, ?3);",
                params![
                    record.uuid.to_string(),
                    lookup_kind_to_db(record.kind),
                    record.name.trim()
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, record.kind.label(), record.uuid))?;
        Ok(record.uuid)
    }

    fn rename_lookup(&self, id: RecordId, name: &str) -> RepoResult<()> {
        if name.trim().is_empty() {
            return Err(RepoError::Validation(
                crate::model::ModelValidationError::BlankField("lookup name"),
            ));
        }
        let changed = self
            .conn
            .execute(
                "UPDATE lookups SET name = ?1 WHERE uuid = ?2;",
                params![name.trim(), id.to_string()],
            )
            .map_err(|err| map_write_error(err, WriteOp::Update, ENTITY, id))?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }

    fn list_lookups(&self, kind: LookupKind, query: &ListQuery) -> RepoResult<Vec<LookupRecord>> {
        let mut bind_values = vec![Value::Text(lookup_kind_to_db(kind).to_string())];
        let sql = build_list_sql(
            "SELECT uuid, kind, name FROM lookups",
            Some("kind = ?"),
            "name",
            query,
            &mut bind_values,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_lookup_row(row)?);
        }
        Ok(records)
    }

    fn delete_lookup(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM lookups WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTITY, id))?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

fn parse_lookup_row(row: &Row<'_>) -> RepoResult<LookupRecord> {
    let kind_text: String = row.get("kind")?;
    let kind = parse_lookup_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid lookup kind `{kind_text}` in lookups.kind"))
    })?;
    let record = LookupRecord {
        uuid: parse_uuid(row, "uuid")?,
        kind,
        name: row.get("name")?,
    };
    record.validate()?;
    Ok(record)
}

fn lookup_kind_to_db(kind: LookupKind) -> &'static str {
    match kind {
        LookupKind::Category => "category",
        LookupKind::Brand => "brand",
        LookupKind::ProfessionalDomain => "professional_domain",
    }
}

fn parse_lookup_kind(value: &str) -> Option<LookupKind> {
    match value {
        "category" => Some(LookupKind::Category),
        "brand" => Some(LookupKind::Brand),
        "professional_domain" => Some(LookupKind::ProfessionalDomain),
        _ => None,
    }
}
