//! Order repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist orders together with their line items.
//! - Apply status transitions, releasing stock on delivery.
//!
//! # Invariants
//! - Order header and items are written in one immediate transaction.
//! - Items are returned in insertion order.
//! - Delivering an order decrements stock for every line or for none.

use crate::db::ensure_schema_ready;
use crate::model::order::{Order, OrderItem, OrderStatus};
use crate::model::RecordId;
use crate::repo::product_repo::adjust_stock_on;
use crate::repo::{
    build_list_sql, map_write_error, parse_uuid, ListQuery, RepoError, RepoResult, WriteOp,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const ENTITY: &str = "order";

const ORDER_SELECT_SQL: &str = "SELECT uuid, client_id, status, note FROM orders";

/// Filters for order listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderListQuery {
    pub client_id: Option<RecordId>,
    pub status: Option<OrderStatus>,
    /// `search` matches the order note.
    pub list: ListQuery,
}

pub trait OrderRepository {
    fn create_order(&self, order: &Order) -> RepoResult<RecordId>;
    fn get_order(&self, id: RecordId) -> RepoResult<Option<Order>>;
    fn list_orders(&self, query: &OrderListQuery) -> RepoResult<Vec<Order>>;
    fn update_note(&self, id: RecordId, note: Option<&str>) -> RepoResult<()>;
    /// Moves the order to `next`, returning the updated order.
    fn update_status(&self, id: RecordId, next: OrderStatus) -> RepoResult<Order>;
    fn delete_order(&self, id: RecordId) -> RepoResult<()>;
}

pub struct SqliteOrderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrderRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl OrderRepository for SqliteOrderRepository<'_> {
    fn create_order(&self, order: &Order) -> RepoResult<RecordId> {
        order.validate()?;

        let order_id = order.uuid.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO orders (uuid, client_id, status, note) VALUES (?1, ?2, ?3, ?4);",
            params![
                order_id.as_str(),
                order.client_id.to_string(),
                order.status.as_str(),
                order.note.as_deref(),
            ],
        )
        .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, order.uuid))?;

        for (position, item) in order.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO order_items (
                    order_id,
                    position,
                    product_id,
                    quantity,
                    unit_price_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    order_id.as_str(),
                    position as i64,
                    item.product_id.to_string(),
                    item.quantity,
                    item.unit_price_cents,
                ],
            )
            .map_err(|err| map_write_error(err, WriteOp::Insert, ENTITY, order.uuid))?;
        }

        tx.commit()?;
        Ok(order.uuid)
    }

    fn get_order(&self, id: RecordId) -> RepoResult<Option<Order>> {
        load_order(self.conn, id)
    }

    fn list_orders(&self, query: &OrderListQuery) -> RepoResult<Vec<Order>> {
        let mut filters = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(client_id) = query.client_id {
            filters.push("client_id = ?");
            bind_values.push(Value::Text(client_id.to_string()));
        }
        if let Some(status) = query.status {
            filters.push("status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        let base_filter = (!filters.is_empty()).then(|| filters.join(" AND "));
        let sql = build_list_sql(
            ORDER_SELECT_SQL,
            base_filter.as_deref(),
            "note",
            &query.list,
            &mut bind_values,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next()? {
            let mut order = parse_order_header(row)?;
            order.items = load_order_items(self.conn, order.uuid)?;
            order.validate()?;
            orders.push(order);
        }
        Ok(orders)
    }

    fn update_note(&self, id: RecordId, note: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE orders
             SET note = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![note, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }

    fn update_status(&self, id: RecordId, next: OrderStatus) -> RepoResult<Order> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut order =
            load_order(&tx, id)?.ok_or(RepoError::NotFound { entity: ENTITY, id })?;
        order
            .transition(next)
            .map_err(|err| RepoError::InvalidTransition(err.to_string()))?;

        if next == OrderStatus::Delivered {
            for item in &order.items {
                adjust_stock_on(&tx, item.product_id, -item.quantity)?;
            }
        }

        tx.execute(
            "UPDATE orders
             SET status = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![order.status.as_str(), id.to_string()],
        )?;
        tx.commit()?;
        Ok(order)
    }

    fn delete_order(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM orders WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_write_error(err, WriteOp::Delete, ENTITY, id))?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }
}

fn load_order(conn: &Connection, id: RecordId) -> RepoResult<Option<Order>> {
    let mut stmt = conn.prepare(&format!("{ORDER_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut order = parse_order_header(row)?;
    order.items = load_order_items(conn, order.uuid)?;
    order.validate()?;
    Ok(Some(order))
}

fn load_order_items(conn: &Connection, order_id: RecordId) -> RepoResult<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT product_id, quantity, unit_price_cents
         FROM order_items
         WHERE order_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([order_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(OrderItem {
            product_id: parse_uuid(row, "product_id")?,
            quantity: row.get("quantity")?,
            unit_price_cents: row.get("unit_price_cents")?,
        });
    }
    Ok(items)
}

fn parse_order_header(row: &Row<'_>) -> RepoResult<Order> {
    let status_text: String = row.get("status")?;
    let status = OrderStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid order status `{status_text}` in orders.status"))
    })?;
    Ok(Order {
        uuid: parse_uuid(row, "uuid")?,
        client_id: parse_uuid(row, "client_id")?,
        status,
        note: row.get("note")?,
        items: Vec::new(),
    })
}
