//! Product repository contract and SQLite implementation.
//!
//! # Invariants
//! - `reference` is unique across products.
//! - Stock never goes negative; `adjust_stock` refuses such deltas.

use crate::db::ensure_schema_ready;
use crate::model::catalog::Product;
use crate::model::RecordId;
use crate::repo::{
    build_list_sql, map_write_error, optional_uuid_text, parse_optional_uuid, parse_uuid,
    ListQuery, RepoError, RepoResult, WriteOp,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ENTITY: &str = "product";

const PRODUCT_SELECT_SQL: &str = "SELECT
    uuid,
    reference,
    name,
    category_id,
    brand_id,
    unit_price_cents,
    stock_quantity
FROM products";

pub trait ProductRepository {
    fn create_product(&self, product: &Product) -> RepoResult<RecordId>;
    fn update_product(&self, product: &Product) -> RepoResult<()>;
    fn get_product(&self, id: RecordId) -> RepoResult<Option<Product>>;
    fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Product>>;
    fn list_products(&self, query: &ListQuery) -> RepoResult<Vec<Product>>;
    /// Adds `delta` (possibly negative) to the stock and returns the new level.
    fn adjust_stock(&self, id: RecordId, delta: i64) -> RepoResult<i64>;
    fn delete_product(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_one(&self, filter: &str, value: String) -> RepoResult<Option<Product>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PRODUCT_SELECT_SQL} WHERE {filter} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => parse_product_row(row).map(Some),
            None => Ok(None),
        }
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn create_product(&self, product: &Product) -> RepoResult<RecordId> {
        product.validate()?;

        self.conn
            .execute(
                "INSERT INTO products (
                    uuid,
                    reference,
                    name,
                    category_id,
                    brand_id,
                    unit_price_cents,
                    stock_quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    product.uuid.to_string(),
                    product.reference.trim(),
                    product.name.trim(),
                    optional_uuid_text(product.category_id),
                    optional_uuid_text(product.brand_id),
                    product.unit_price_cents,
                    product.stock_quantity,
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, product.uuid))?;

        Ok(product.uuid)
    }

    fn update_product(&self, product: &Product) -> RepoResult<()> {
        product.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE products
                 SET
                    reference = ?1,
                    name = ?2,
                    category_id = ?3,
                    brand_id = ?4,
                    unit_price_cents = ?5,
                    stock_quantity = ?6,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?7;",
                params![
                    product.reference.trim(),
                    product.name.trim(),
                    optional_uuid_text(product.category_id),
                    optional_uuid_text(product.brand_id),
                    product.unit_price_cents,
                    product.stock_quantity,
                    product.uuid.to_string(),
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Update, ENTITY, product.uuid))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: ENTITY,
                id: product.uuid,
            });
        }
        Ok(())
    }

    fn get_product(&self, id: RecordId) -> RepoResult<Option<Product>> {
        self.query_one("uuid", id.to_string())
    }

    fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Product>> {
        self.query_one("reference", reference.trim().to_string())
    }

    fn list_products(&self, query: &ListQuery) -> RepoResult<Vec<Product>> {
        let mut bind_values: Vec<Value> = Vec::new();
        let sql = build_list_sql(PRODUCT_SELECT_SQL, None, "name", query, &mut bind_values);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row)?);
        }
        Ok(products)
    }

    fn adjust_stock(&self, id: RecordId, delta: i64) -> RepoResult<i64> {
        adjust_stock_on(self.conn, id, delta)
    }

    fn delete_product(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM products WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTITY, id))?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

/// Applies a stock delta on any connection or transaction.
///
/// Fails with `InsufficientStock` when the result would be negative.
pub(crate) fn adjust_stock_on(conn: &Connection, id: RecordId, delta: i64) -> RepoResult<i64> {
    let changed = conn.execute(
        "UPDATE products
         SET
            stock_quantity = stock_quantity + ?1,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?2
           AND stock_quantity + ?1 >= 0;",
        params![delta, id.to_string()],
    )?;

    if changed == 0 {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(RepoError::InsufficientStock(id));
        }
        return Err(RepoError::NotFound { entity: ENTITY, id });
    }

    let level = conn.query_row(
        "SELECT stock_quantity FROM products WHERE uuid = ?1;",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(level)
}

fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let product = Product {
        uuid: parse_uuid(row, "uuid")?,
        reference: row.get("reference")?,
        name: row.get("name")?,
        category_id: parse_optional_uuid(row, "category_id")?,
        brand_id: parse_optional_uuid(row, "brand_id")?,
        unit_price_cents: row.get("unit_price_cents")?,
        stock_quantity: row.get("stock_quantity")?,
    };
    product.validate()?;
    Ok(product)
}
