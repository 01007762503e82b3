//! Provider invoice repository contract and SQLite implementation.
//!
//! # Invariants
//! - Invoice header, items and the matching stock receipt are written in
//!   one immediate transaction.
//! - Invoice numbers are unique per provider.
//! - Deleting an invoice reverses its stock receipt or fails as a whole.

use crate::db::ensure_schema_ready;
use crate::model::invoice::{Invoice, InvoiceItem};
use crate::model::RecordId;
use crate::repo::product_repo::adjust_stock_on;
use crate::repo::{
    build_list_sql, map_write_error, parse_uuid, ListQuery, RepoError, RepoResult, WriteOp,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const ENTITY: &str = "invoice";

const INVOICE_SELECT_SQL: &str = "SELECT uuid, provider_id, number, issued_on FROM invoices";

pub trait InvoiceRepository {
    fn create_invoice(&self, invoice: &Invoice) -> RepoResult<RecordId>;
    fn get_invoice(&self, id: RecordId) -> RepoResult<Option<Invoice>>;
    /// `query.search` matches the invoice number.
    fn list_invoices(
        &self,
        provider_id: Option<RecordId>,
        query: &ListQuery,
    ) -> RepoResult<Vec<Invoice>>;
    fn delete_invoice(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteInvoiceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvoiceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl InvoiceRepository for SqliteInvoiceRepository<'_> {
    fn create_invoice(&self, invoice: &Invoice) -> RepoResult<RecordId> {
        invoice.validate()?;

        let invoice_id = invoice.uuid.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO invoices (uuid, provider_id, number, issued_on)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                invoice_id.as_str(),
                invoice.provider_id.to_string(),
                invoice.number.trim(),
                invoice.issued_on.as_str(),
            ],
        )
        .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, invoice.uuid))?;

        for (position, item) in invoice.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO invoice_items (
                    invoice_id,
                    position,
                    product_id,
                    quantity,
                    unit_cost_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    invoice_id.as_str(),
                    position as i64,
                    item.product_id.to_string(),
                    item.quantity,
                    item.unit_cost_cents,
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, invoice.uuid))?;
            adjust_stock_on(&tx, item.product_id, item.quantity)?;
        }

        tx.commit()?;
        Ok(invoice.uuid)
    }

    fn get_invoice(&self, id: RecordId) -> RepoResult<Option<Invoice>> {
        load_invoice(self.conn, id)
    }

    fn list_invoices(
        &self,
        provider_id: Option<RecordId>,
        query: &ListQuery,
    ) -> RepoResult<Vec<Invoice>> {
        let mut bind_values: Vec<Value> = Vec::new();
        let base_filter = provider_id.map(|id| {
            bind_values.push(Value::Text(id.to_string()));
            "provider_id = ?"
        });
        let sql = build_list_sql(
            INVOICE_SELECT_SQL,
            base_filter,
            "number",
            query,
            &mut bind_values,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            let mut invoice = parse_invoice_header(row)?;
            invoice.items = load_invoice_items(self.conn, invoice.uuid)?;
            invoice.validate()?;
            invoices.push(invoice);
        }
        Ok(invoices)
    }

    fn delete_invoice(&self, id: RecordId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let invoice = load_invoice(&tx, id)?.ok_or(RepoError::NotFound { entity: ENTITY, id })?;
        for item in &invoice.items {
            adjust_stock_on(&tx, item.product_id, -item.quantity)?;
        }
        tx.execute("DELETE FROM invoices WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTITY, id))?;
        tx.commit()?;
        Ok(())
    }
}

fn load_invoice(conn: &Connection, id: RecordId) -> RepoResult<Option<Invoice>> {
    let mut stmt = conn.prepare(&format!("{INVOICE_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut invoice = parse_invoice_header(row)?;
    invoice.items = load_invoice_items(conn, invoice.uuid)?;
    invoice.validate()?;
    Ok(Some(invoice))
}

fn load_invoice_items(conn: &Connection, invoice_id: RecordId) -> RepoResult<Vec<InvoiceItem>> {
    let mut stmt = conn.prepare(
        "SELECT product_id, quantity, unit_cost_cents
         FROM invoice_items
         WHERE invoice_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([invoice_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(InvoiceItem {
            product_id: parse_uuid(row, "product_id")?,
            quantity: row.get("quantity")?,
            unit_cost_cents: row.get("unit_cost_cents")?,
        });
    }
    Ok(items)
}

fn parse_invoice_header(row: &Row<'_>) -> RepoResult<Invoice> {
    Ok(Invoice {
        uuid: parse_uuid(row, "uuid")?,
        provider_id: parse_uuid(row, "provider_id")?,
        number: row.get("number")?,
        issued_on: row.get("issued_on")?,
        items: Vec::new(),
    })
}
