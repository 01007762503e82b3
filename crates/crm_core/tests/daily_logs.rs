use crm_core::db::open_db_in_memory;
use crm_core::model::catalog::Product;
use crm_core::model::daily_log::{DailyLog, DailyLogKind, DailyLogStatus};
use crm_core::model::order::OrderStatus;
use crm_core::model::party::Client;
use crm_core::repo::client_repo::{ClientRepository, SqliteClientRepository};
use crm_core::repo::daily_log_repo::{DailyLogRepository, SqliteDailyLogRepository};
use crm_core::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crm_core::{
    ClientService, DailyLogService, ListQuery, OrderLine, OrderService, RecordId, RepoError,
    ServiceError,
};
use rusqlite::Connection;

fn clients(conn: &Connection, count: usize) -> Vec<RecordId> {
    let repo = SqliteClientRepository::try_new(conn).unwrap();
    (0..count)
        .map(|index| repo.create_client(&Client::new(format!("Client {index}"))).unwrap())
        .collect()
}

fn subject_ids(log: &DailyLog) -> Vec<RecordId> {
    log.entries.iter().map(|entry| entry.subject_id).collect()
}

#[test]
fn open_log_holds_first_subject_and_appends_in_order() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 4);
    let service = DailyLogService::sqlite(&conn).unwrap();

    let log = service
        .open_log(DailyLogKind::Client, "2024-06-01", ids[0])
        .unwrap();
    assert_eq!(log.status, DailyLogStatus::Open);
    assert_eq!(subject_ids(&log), vec![ids[0]]);

    service.add_entry(log.uuid, ids[1]).unwrap();
    let log = service.add_entries(log.uuid, &ids[2..]).unwrap();
    assert_eq!(subject_ids(&log), ids);
}

#[test]
fn entries_are_idempotent_per_subject() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 2);
    let repo = SqliteDailyLogRepository::try_new(&conn).unwrap();
    let service = DailyLogService::sqlite(&conn).unwrap();

    let log = service
        .open_log(DailyLogKind::Client, "2024-06-02", ids[0])
        .unwrap();
    assert!(!repo.add_entry(log.uuid, ids[0]).unwrap());
    assert_eq!(repo.add_entries(log.uuid, &[ids[0], ids[1], ids[1]]).unwrap(), 1);
    assert_eq!(subject_ids(&repo.get_log(log.uuid).unwrap().unwrap()), ids);
}

#[test]
fn one_log_per_kind_and_date() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 2);
    let service = DailyLogService::sqlite(&conn).unwrap();

    service
        .open_log(DailyLogKind::Client, "2024-06-03", ids[0])
        .unwrap();
    let err = service
        .open_log(DailyLogKind::Client, "2024-06-03", ids[1])
        .unwrap_err();
    assert!(matches!(err, ServiceError::Repo(RepoError::Duplicate(_))));

    let found = service
        .find_log(DailyLogKind::Client, "2024-06-03")
        .unwrap()
        .unwrap();
    assert_eq!(subject_ids(&found), vec![ids[0]]);
}

#[test]
fn closing_is_terminal_and_blocks_entries() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 2);
    let service = DailyLogService::sqlite(&conn).unwrap();

    let log = service
        .open_log(DailyLogKind::Client, "2024-06-04", ids[0])
        .unwrap();
    let closed = service.close_log(log.uuid).unwrap();
    assert_eq!(closed.status, DailyLogStatus::Closed);
    assert!(closed.closed_at.is_some());

    assert!(matches!(
        service.close_log(log.uuid),
        Err(ServiceError::Repo(RepoError::AlreadyClosed(_)))
    ));
    assert!(matches!(
        service.add_entry(log.uuid, ids[1]),
        Err(ServiceError::Repo(RepoError::LogClosed(_)))
    ));
    assert_eq!(
        subject_ids(&service.get_log(log.uuid).unwrap().unwrap()),
        vec![ids[0]]
    );
}

#[test]
fn storage_rejects_entries_on_closed_logs_even_without_checks() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 2);
    let service = DailyLogService::sqlite(&conn).unwrap();
    let log = service
        .open_log(DailyLogKind::Client, "2024-06-05", ids[0])
        .unwrap();
    service.close_log(log.uuid).unwrap();

    let err = conn
        .execute(
            "INSERT INTO client_log_entries (log_id, client_id) VALUES (?1, ?2);",
            [log.uuid.to_string(), ids[1].to_string()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("daily log is closed"));

    let err = conn
        .execute(
            "UPDATE daily_logs SET status = 'open', closed_at = NULL WHERE uuid = ?1;",
            [log.uuid.to_string()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("daily log is closed"));

    let err = conn
        .execute(
            "DELETE FROM client_log_entries WHERE log_id = ?1;",
            [log.uuid.to_string()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("daily log is closed"));
}

#[test]
fn entries_leave_open_logs_but_not_closed_ones() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 3);
    let service = DailyLogService::sqlite(&conn).unwrap();
    let log = service
        .open_log(DailyLogKind::Client, "2024-06-06", ids[0])
        .unwrap();
    service.add_entries(log.uuid, &ids[1..]).unwrap();

    let log = service.remove_entry(log.uuid, ids[1]).unwrap();
    assert_eq!(subject_ids(&log), vec![ids[0], ids[2]]);
    let log = service.remove_entry(log.uuid, ids[1]).unwrap();
    assert_eq!(subject_ids(&log), vec![ids[0], ids[2]]);

    service.close_log(log.uuid).unwrap();
    assert!(matches!(
        service.remove_entry(log.uuid, ids[0]),
        Err(ServiceError::Repo(RepoError::LogClosed(id))) if id == log.uuid
    ));
    assert_eq!(
        subject_ids(&service.get_log(log.uuid).unwrap().unwrap()),
        vec![ids[0], ids[2]]
    );
}

#[test]
fn list_logs_filters_by_kind_and_date_text() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 3);
    let service = DailyLogService::sqlite(&conn).unwrap();
    for (index, date) in ["2024-05-30", "2024-06-01", "2024-06-02"].iter().enumerate() {
        service
            .open_log(DailyLogKind::Client, date, ids[index])
            .unwrap();
    }

    assert_eq!(
        service
            .list_logs(Some(DailyLogKind::Client), &ListQuery::default())
            .unwrap()
            .len(),
        3
    );
    assert!(service
        .list_logs(Some(DailyLogKind::Order), &ListQuery::default())
        .unwrap()
        .is_empty());
    let june = service
        .list_logs(
            None,
            &ListQuery {
                search: Some("2024-06".to_string()),
                ..ListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(june.len(), 2);
}

#[test]
fn record_today_opens_then_reuses_todays_log() {
    let conn = open_db_in_memory().unwrap();
    let ids = clients(&conn, 2);
    let service = DailyLogService::sqlite(&conn).unwrap();

    let first = service.record_today(DailyLogKind::Client, ids[0]).unwrap();
    let second = service.record_today(DailyLogKind::Client, ids[1]).unwrap();
    assert_eq!(first.uuid, second.uuid);
    assert_eq!(second.log_date, service.today().unwrap());
    assert_eq!(subject_ids(&second), ids);
}

#[test]
fn client_service_records_created_clients_in_todays_log() {
    let conn = open_db_in_memory().unwrap();
    let service = ClientService::sqlite(&conn).unwrap();

    let mut client = Client::new("Epicerie Nour");
    client.ccp = Some("1234567890".to_string());
    let created = service.create_client(&client).unwrap();

    let log = service.todays_log().unwrap().unwrap();
    assert_eq!(subject_ids(&log), vec![created.uuid]);

    let record = service.client_ccp(created.uuid).unwrap();
    assert!(record.valid);
    assert_eq!(record.cle, "45");
    assert_eq!(record.rip_cle, "06");
}

#[test]
fn client_creation_survives_a_closed_daily_log() {
    let conn = open_db_in_memory().unwrap();
    let service = ClientService::sqlite(&conn).unwrap();
    let logs = DailyLogService::sqlite(&conn).unwrap();

    let first = service.create_client(&Client::new("First")).unwrap();
    let log = service.todays_log().unwrap().unwrap();
    logs.close_log(log.uuid).unwrap();

    let second = service.create_client(&Client::new("Second")).unwrap();
    assert!(service.get_client(second.uuid).unwrap().is_some());
    let log = service.todays_log().unwrap().unwrap();
    assert_eq!(subject_ids(&log), vec![first.uuid]);
}

#[test]
fn logged_client_is_deletable_only_after_leaving_the_log() {
    let conn = open_db_in_memory().unwrap();
    let service = ClientService::sqlite(&conn).unwrap();
    let logs = DailyLogService::sqlite(&conn).unwrap();

    let client = service.create_client(&Client::new("Kiosque Amel")).unwrap();
    assert!(matches!(
        service.delete_client(client.uuid),
        Err(RepoError::Referenced { entity: "client", .. })
    ));

    let log = service.todays_log().unwrap().unwrap();
    let log = logs.remove_entry(log.uuid, client.uuid).unwrap();
    assert!(log.entries.is_empty());
    service.delete_client(client.uuid).unwrap();
    assert!(service.get_client(client.uuid).unwrap().is_none());
}

#[test]
fn client_without_ccp_has_invalid_record() {
    let conn = open_db_in_memory().unwrap();
    let service = ClientService::sqlite(&conn).unwrap();
    let created = service.create_client(&Client::new("No Account")).unwrap();

    assert!(!service.client_ccp(created.uuid).unwrap().valid);
}

#[test]
fn order_service_snapshots_prices_and_records_orders() {
    let conn = open_db_in_memory().unwrap();
    let client_id = clients(&conn, 1)[0];
    let products = SqliteProductRepository::try_new(&conn).unwrap();
    let product_id = products
        .create_product(&Product::new("HUI-5", "Huile 5L", 95_000))
        .unwrap();
    products.adjust_stock(product_id, 20).unwrap();
    let service = OrderService::sqlite(&conn).unwrap();

    let order = service
        .place_order(
            client_id,
            &[
                OrderLine {
                    product_id,
                    quantity: 2,
                    unit_price_cents: None,
                },
                OrderLine {
                    product_id,
                    quantity: 1,
                    unit_price_cents: Some(90_000),
                },
            ],
            Some("morning delivery".to_string()),
        )
        .unwrap();
    assert_eq!(order.items[0].unit_price_cents, 95_000);
    assert_eq!(order.total_cents(), 2 * 95_000 + 90_000);

    let log = service.todays_log().unwrap().unwrap();
    assert_eq!(log.kind, DailyLogKind::Order);
    assert_eq!(subject_ids(&log), vec![order.uuid]);

    service.set_status(order.uuid, OrderStatus::Confirmed).unwrap();
    service.set_status(order.uuid, OrderStatus::Delivered).unwrap();
    assert_eq!(
        products.get_product(product_id).unwrap().unwrap().stock_quantity,
        17
    );
}

#[test]
fn order_service_rejects_unknown_client_and_product() {
    let conn = open_db_in_memory().unwrap();
    let client_id = clients(&conn, 1)[0];
    let service = OrderService::sqlite(&conn).unwrap();
    let missing = uuid::Uuid::new_v4();

    let line = OrderLine {
        product_id: missing,
        quantity: 1,
        unit_price_cents: None,
    };
    assert!(matches!(
        service.place_order(missing, &[line.clone()], None),
        Err(ServiceError::UnknownClient(_))
    ));
    assert!(matches!(
        service.place_order(client_id, &[line], None),
        Err(ServiceError::UnknownProduct(id)) if id == missing
    ));
    assert!(service.todays_log().unwrap().is_none());
}

#[test]
fn logged_order_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let client_id = clients(&conn, 1)[0];
    let product_id = SqliteProductRepository::try_new(&conn)
        .unwrap()
        .create_product(&Product::new("SUC-1", "Sucre 1kg", 12_000))
        .unwrap();
    let service = OrderService::sqlite(&conn).unwrap();
    let order = service
        .place_order(
            client_id,
            &[OrderLine {
                product_id,
                quantity: 1,
                unit_price_cents: None,
            }],
            None,
        )
        .unwrap();

    assert!(matches!(
        service.delete_order(order.uuid),
        Err(RepoError::Referenced { .. })
    ));

    let logs = DailyLogService::sqlite(&conn).unwrap();
    let log = service.todays_log().unwrap().unwrap();
    logs.remove_entry(log.uuid, order.uuid).unwrap();
    service.delete_order(order.uuid).unwrap();
}
