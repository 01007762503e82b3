//! Order use-case service.
//!
//! # Responsibility
//! - Place orders for known clients, snapshotting catalog prices.
//! - Drive order status changes.
//! - Record placed orders in today's order daily log.

use crate::model::daily_log::{DailyLog, DailyLogKind};
use crate::model::order::{Order, OrderItem, OrderStatus};
use crate::model::RecordId;
use crate::repo::client_repo::{ClientRepository, SqliteClientRepository};
use crate::repo::daily_log_repo::{DailyLogRepository, SqliteDailyLogRepository};
use crate::repo::order_repo::{OrderListQuery, OrderRepository, SqliteOrderRepository};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crate::repo::RepoResult;
use crate::service::daily_log_service::DailyLogService;
use crate::service::{ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

/// One requested order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: RecordId,
    pub quantity: i64,
    /// Overrides the catalog price when set.
    pub unit_price_cents: Option<i64>,
}

pub struct OrderService<O, P, C, L>
where
    O: OrderRepository,
    P: ProductRepository,
    C: ClientRepository,
    L: DailyLogRepository,
{
    orders: O,
    products: P,
    clients: C,
    logs: DailyLogService<L>,
}

impl<'conn>
    OrderService<
        SqliteOrderRepository<'conn>,
        SqliteProductRepository<'conn>,
        SqliteClientRepository<'conn>,
        SqliteDailyLogRepository<'conn>,
    >
{
    pub fn sqlite(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteOrderRepository::try_new(conn)?,
            SqliteProductRepository::try_new(conn)?,
            SqliteClientRepository::try_new(conn)?,
            SqliteDailyLogRepository::try_new(conn)?,
        ))
    }
}

impl<O, P, C, L> OrderService<O, P, C, L>
where
    O: OrderRepository,
    P: ProductRepository,
    C: ClientRepository,
    L: DailyLogRepository,
{
    pub fn new(orders: O, products: P, clients: C, logs: L) -> Self {
        Self {
            orders,
            products,
            clients,
            logs: DailyLogService::new(logs),
        }
    }

    /// Places a pending order and records it in today's order log.
    pub fn place_order(
        &self,
        client_id: RecordId,
        lines: &[OrderLine],
        note: Option<String>,
    ) -> ServiceResult<Order> {
        if self.clients.get_client(client_id)?.is_none() {
            return Err(ServiceError::UnknownClient(client_id));
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let unit_price_cents = match line.unit_price_cents {
                Some(price) => price,
                None => {
                    self.products
                        .get_product(line.product_id)?
                        .ok_or(ServiceError::UnknownProduct(line.product_id))?
                        .unit_price_cents
                }
            };
            items.push(OrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents,
            });
        }

        let mut order = Order::new(client_id, items);
        order.note = note;
        let order_id = self.orders.create_order(&order)?;
        info!(
            "event=order_place module=service status=ok items={} total_cents={}",
            order.items.len(),
            order.total_cents()
        );

        self.logs.record_today_or_skip(DailyLogKind::Order, order_id);

        self.orders
            .get_order(order_id)?
            .ok_or(ServiceError::InconsistentState(
                "placed order not found in read-back",
            ))
    }

    pub fn set_status(&self, order_id: RecordId, next: OrderStatus) -> ServiceResult<Order> {
        let order = self.orders.update_status(order_id, next)?;
        info!(
            "event=order_status module=service status=ok next={}",
            next.as_str()
        );
        Ok(order)
    }

    pub fn get_order(&self, order_id: RecordId) -> RepoResult<Option<Order>> {
        self.orders.get_order(order_id)
    }

    pub fn list_orders(&self, query: &OrderListQuery) -> RepoResult<Vec<Order>> {
        self.orders.list_orders(query)
    }

    /// Deletes an order; fails with `Referenced` once it sits in a daily log.
    /// Removing it from an open log with `DailyLogService::remove_entry`
    /// makes it deletable again.
    pub fn delete_order(&self, order_id: RecordId) -> RepoResult<()> {
        self.orders.delete_order(order_id)
    }

    pub fn todays_log(&self) -> RepoResult<Option<DailyLog>> {
        let today = self.logs.today()?;
        self.logs.find_log(DailyLogKind::Order, &today)
    }
}
