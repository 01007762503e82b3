use crm_core::db::open_db_in_memory;
use crm_core::model::catalog::{LookupKind, LookupRecord, Product};
use crm_core::model::party::{Client, Provider};
use crm_core::repo::client_repo::{ClientRepository, SqliteClientRepository};
use crm_core::repo::lookup_repo::{LookupRepository, SqliteLookupRepository};
use crm_core::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crm_core::repo::provider_repo::{ProviderRepository, SqliteProviderRepository};
use crm_core::{ListQuery, ModelValidationError, RepoError, SortOrder};
use uuid::Uuid;

#[test]
fn client_create_get_update_delete() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let mut client = Client::new("Boulangerie Amrani");
    client.email = Some("contact@amrani.dz".to_string());
    client.ccp = Some("1234567890".to_string());
    let id = repo.create_client(&client).unwrap();

    let loaded = repo.get_client(id).unwrap().unwrap();
    assert_eq!(loaded, client);
    assert_eq!(loaded.ccp_record().unwrap().rip, "00799999123456789006");

    client.phone = Some("0550 12 34 56".to_string());
    repo.update_client(&client).unwrap();
    assert_eq!(
        repo.get_client(id).unwrap().unwrap().phone.as_deref(),
        Some("0550 12 34 56")
    );

    repo.delete_client(id).unwrap();
    assert!(repo.get_client(id).unwrap().is_none());
    assert!(matches!(
        repo.delete_client(id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn client_with_invalid_fields_is_rejected_before_write() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let mut bad_email = Client::new("Alpha");
    bad_email.email = Some("not-an-email".to_string());
    assert!(matches!(
        repo.create_client(&bad_email),
        Err(RepoError::Validation(ModelValidationError::InvalidEmail(_)))
    ));

    let mut bad_ccp = Client::new("Beta");
    bad_ccp.ccp = Some("12345678901".to_string());
    assert!(matches!(
        repo.create_client(&bad_ccp),
        Err(RepoError::Validation(ModelValidationError::InvalidCcp(_)))
    ));

    assert!(repo.list_clients(&ListQuery::default()).unwrap().is_empty());
}

#[test]
fn duplicate_client_email_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let mut first = Client::new("First");
    first.email = Some("shop@example.com".to_string());
    repo.create_client(&first).unwrap();

    let mut second = Client::new("Second");
    second.email = Some("shop@example.com".to_string());
    let err = repo.create_client(&second).unwrap_err();
    match err {
        RepoError::Duplicate(message) => assert!(message.contains("email")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn list_clients_filters_sorts_and_pages() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();
    for name in ["Delta Market", "alpha store", "Charlie Market", "Bravo Depot"] {
        repo.create_client(&Client::new(name)).unwrap();
    }

    let names = |query: &ListQuery| -> Vec<String> {
        repo.list_clients(query)
            .unwrap()
            .into_iter()
            .map(|client| client.name)
            .collect()
    };

    assert_eq!(
        names(&ListQuery {
            sort: SortOrder::NameAsc,
            ..ListQuery::default()
        }),
        vec!["alpha store", "Bravo Depot", "Charlie Market", "Delta Market"]
    );
    assert_eq!(
        names(&ListQuery {
            search: Some("  MARKET ".to_string()),
            sort: SortOrder::NameDesc,
            ..ListQuery::default()
        }),
        vec!["Delta Market", "Charlie Market"]
    );
    assert_eq!(
        names(&ListQuery {
            sort: SortOrder::NameAsc,
            limit: Some(2),
            offset: 1,
            ..ListQuery::default()
        }),
        vec!["Bravo Depot", "Charlie Market"]
    );
}

#[test]
fn client_pointing_at_unknown_domain_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let mut client = Client::new("Gamma");
    client.professional_domain_id = Some(Uuid::new_v4());
    assert!(matches!(
        repo.create_client(&client),
        Err(RepoError::UnknownReference { .. })
    ));
}

#[test]
fn lookup_in_use_cannot_be_deleted() {
    let conn = open_db_in_memory().unwrap();
    let lookups = SqliteLookupRepository::try_new(&conn).unwrap();
    let clients = SqliteClientRepository::try_new(&conn).unwrap();

    let domain = LookupRecord::new(LookupKind::ProfessionalDomain, "Pharmacy");
    let domain_id = lookups.create_lookup(&domain).unwrap();
    let mut client = Client::new("Pharmacie Centrale");
    client.professional_domain_id = Some(domain_id);
    clients.create_client(&client).unwrap();

    assert!(matches!(
        lookups.delete_lookup(domain_id),
        Err(RepoError::Referenced { .. })
    ));

    lookups.rename_lookup(domain_id, "Pharmacies").unwrap();
    let listed = lookups
        .list_lookups(LookupKind::ProfessionalDomain, &ListQuery::default())
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Pharmacies");
    assert!(lookups
        .list_lookups(LookupKind::Brand, &ListQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn lookup_names_are_unique_per_kind() {
    let conn = open_db_in_memory().unwrap();
    let lookups = SqliteLookupRepository::try_new(&conn).unwrap();

    lookups
        .create_lookup(&LookupRecord::new(LookupKind::Brand, "Ifri"))
        .unwrap();
    lookups
        .create_lookup(&LookupRecord::new(LookupKind::Category, "Ifri"))
        .unwrap();
    assert!(matches!(
        lookups.create_lookup(&LookupRecord::new(LookupKind::Brand, "Ifri")),
        Err(RepoError::Duplicate(_))
    ));
}

#[test]
fn provider_crud_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProviderRepository::try_new(&conn).unwrap();

    let mut provider = Provider::new("Sarl Distrib");
    provider.ccp = Some("12".to_string());
    let id = repo.create_provider(&provider).unwrap();
    assert_eq!(repo.get_provider(id).unwrap().unwrap(), provider);
    assert_eq!(provider.ccp_record().unwrap().cle, "13");

    provider.address = Some("Zone industrielle, Oran".to_string());
    repo.update_provider(&provider).unwrap();
    assert_eq!(
        repo.list_providers(&ListQuery::default()).unwrap(),
        vec![provider.clone()]
    );

    repo.delete_provider(id).unwrap();
    assert!(repo.get_provider(id).unwrap().is_none());
}

#[test]
fn product_update_list_and_delete() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProductRepository::try_new(&conn).unwrap();
    let brand_id = SqliteLookupRepository::try_new(&conn)
        .unwrap()
        .create_lookup(&LookupRecord::new(LookupKind::Brand, "Safina"))
        .unwrap();

    let mut huile = Product::new("HUI-5", "Huile 5L", 95_000);
    repo.create_product(&huile).unwrap();
    repo.create_product(&Product::new("CAF-250", "Cafe moulu 250g", 42_000))
        .unwrap();

    huile.name = "Huile tournesol 5L".to_string();
    huile.unit_price_cents = 98_500;
    huile.brand_id = Some(brand_id);
    repo.update_product(&huile).unwrap();
    let loaded = repo.get_product(huile.uuid).unwrap().unwrap();
    assert_eq!(loaded.name, "Huile tournesol 5L");
    assert_eq!(loaded.unit_price_cents, 98_500);
    assert_eq!(loaded.brand_id, Some(brand_id));

    let by_name = repo
        .list_products(&ListQuery {
            sort: SortOrder::NameAsc,
            ..ListQuery::default()
        })
        .unwrap();
    let names: Vec<&str> = by_name.iter().map(|product| product.name.as_str()).collect();
    assert_eq!(names, vec!["Cafe moulu 250g", "Huile tournesol 5L"]);
    let searched = repo
        .list_products(&ListQuery {
            search: Some("TOURNESOL".to_string()),
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].uuid, huile.uuid);

    huile.brand_id = Some(Uuid::new_v4());
    assert!(matches!(
        repo.update_product(&huile),
        Err(RepoError::UnknownReference { .. })
    ));
    assert!(matches!(
        repo.update_product(&Product::new("NONE-1", "Missing", 1)),
        Err(RepoError::NotFound { .. })
    ));

    repo.delete_product(huile.uuid).unwrap();
    assert!(repo.get_product(huile.uuid).unwrap().is_none());
    assert!(matches!(
        repo.delete_product(huile.uuid),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn product_stock_never_goes_negative() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProductRepository::try_new(&conn).unwrap();

    let product = Product::new("REF-001", "Semoule 25kg", 320_000);
    let id = repo.create_product(&product).unwrap();
    assert_eq!(repo.adjust_stock(id, 10).unwrap(), 10);
    assert_eq!(repo.adjust_stock(id, -4).unwrap(), 6);
    assert!(matches!(
        repo.adjust_stock(id, -7),
        Err(RepoError::InsufficientStock(_))
    ));
    assert_eq!(repo.get_product(id).unwrap().unwrap().stock_quantity, 6);
    assert!(matches!(
        repo.adjust_stock(Uuid::new_v4(), 1),
        Err(RepoError::NotFound { .. })
    ));

    let found = repo.find_by_reference("REF-001").unwrap().unwrap();
    assert_eq!(found.uuid, id);
    assert!(matches!(
        repo.create_product(&Product::new("REF-001", "Other", 1)),
        Err(RepoError::Duplicate(_))
    ));
}
