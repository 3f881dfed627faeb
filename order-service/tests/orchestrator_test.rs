//! Pipeline tests for order validation against stubbed dependencies.
//!
//! Exercises the creation algorithm's ordering and failure semantics:
//! owner validation first, product lookup second, availability third,
//! with dependency failures surfacing as `DependencyUnavailable` and
//! never as a logical error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use order_service::services::{CatalogGateway, IdentityGateway, Orchestrator};
use service_core::grpc::{Availability, ProductInfo, UserValidation};
use service_core::AppError;

struct StubIdentity {
    valid: bool,
    unavailable: bool,
    calls: AtomicU32,
}

impl StubIdentity {
    fn valid() -> Self {
        Self {
            valid: true,
            unavailable: false,
            calls: AtomicU32::new(0),
        }
    }

    fn unknown() -> Self {
        Self {
            valid: false,
            unavailable: false,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl IdentityGateway for StubIdentity {
    async fn validate_user(&self, account_id: i64) -> Result<UserValidation, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::DependencyUnavailable("identity down".into()));
        }
        Ok(UserValidation {
            valid: self.valid,
            user_id: account_id,
            username: "alice".into(),
            is_active: self.valid,
            error_message: String::new(),
        })
    }
}

#[derive(Clone)]
struct StubProduct {
    price: Decimal,
    inventory: i32,
    active: bool,
}

struct StubCatalog {
    products: HashMap<i64, StubProduct>,
    unavailable: bool,
    info_calls: AtomicU32,
    availability_calls: AtomicU32,
}

impl StubCatalog {
    fn with_products(products: Vec<(i64, &str, i32)>) -> Self {
        let products = products
            .into_iter()
            .map(|(id, price, inventory)| {
                (
                    id,
                    StubProduct {
                        price: price.parse().unwrap(),
                        inventory,
                        active: true,
                    },
                )
            })
            .collect();
        Self {
            products,
            unavailable: false,
            info_calls: AtomicU32::new(0),
            availability_calls: AtomicU32::new(0),
        }
    }

    fn down() -> Self {
        Self {
            products: HashMap::new(),
            unavailable: true,
            info_calls: AtomicU32::new(0),
            availability_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CatalogGateway for StubCatalog {
    async fn get_product_info(&self, product_id: i64) -> Result<ProductInfo, AppError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::DependencyUnavailable("catalog down".into()));
        }
        Ok(match self.products.get(&product_id) {
            Some(p) => ProductInfo {
                found: true,
                id: product_id,
                name: format!("product-{}", product_id),
                description: String::new(),
                price: p.price,
                inventory_count: p.inventory,
                is_active: p.active,
                error_message: String::new(),
            },
            None => ProductInfo {
                found: false,
                id: product_id,
                name: String::new(),
                description: String::new(),
                price: Decimal::ZERO,
                inventory_count: 0,
                is_active: false,
                error_message: format!("product {} not found", product_id),
            },
        })
    }

    async fn check_availability(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<Availability, AppError> {
        self.availability_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AppError::DependencyUnavailable("catalog down".into()));
        }
        Ok(match self.products.get(&product_id) {
            Some(p) => Availability {
                available: p.active && p.inventory >= quantity,
                current_inventory: p.inventory,
                error_message: String::new(),
            },
            None => Availability {
                available: false,
                current_inventory: 0,
                error_message: format!("product {} not found", product_id),
            },
        })
    }
}

fn orchestrator(
    identity: StubIdentity,
    catalog: StubCatalog,
) -> (Orchestrator, Arc<StubIdentity>, Arc<StubCatalog>) {
    let identity = Arc::new(identity);
    let catalog = Arc::new(catalog);
    (
        Orchestrator::new(identity.clone(), catalog.clone()),
        identity,
        catalog,
    )
}

#[tokio::test]
async fn happy_order_totals_with_fixed_point_arithmetic() {
    let (orch, _, _) = orchestrator(
        StubIdentity::valid(),
        StubCatalog::with_products(vec![(1, "10.00", 5), (2, "7.50", 2)]),
    );

    let validated = orch.validate(42, &[(1, 2), (2, 1)]).await.unwrap();

    assert_eq!(validated.owner_id, 42);
    assert_eq!(validated.total_amount, "27.50".parse::<Decimal>().unwrap());
    assert_eq!(validated.lines.len(), 2);
    assert_eq!(
        validated.lines[0].price_at_purchase,
        "10.00".parse::<Decimal>().unwrap()
    );
    assert_eq!(
        validated.lines[1].price_at_purchase,
        "7.50".parse::<Decimal>().unwrap()
    );
}

#[tokio::test]
async fn unknown_product_is_not_found_and_names_the_product() {
    let (orch, _, _) = orchestrator(
        StubIdentity::valid(),
        StubCatalog::with_products(vec![(1, "10.00", 5)]),
    );

    let err = orch.validate(42, &[(999, 1)]).await.unwrap_err();
    match err {
        AppError::NotFound(e) => assert!(e.to_string().contains("999")),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn shortfall_reports_the_available_count() {
    let (orch, _, _) = orchestrator(
        StubIdentity::valid(),
        StubCatalog::with_products(vec![(1, "10.00", 1)]),
    );

    let err = orch.validate(42, &[(1, 3)]).await.unwrap_err();
    match err {
        AppError::InsufficientInventory {
            product_id,
            available,
        } => {
            assert_eq!(product_id, 1);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientInventory, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_owner_stops_the_pipeline_before_catalog() {
    let (orch, identity, catalog) = orchestrator(
        StubIdentity::unknown(),
        StubCatalog::with_products(vec![(1, "10.00", 5)]),
    );

    let err = orch.validate(42, &[(1, 1)]).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
    assert_eq!(catalog.info_calls.load(Ordering::SeqCst), 0);
    assert_eq!(catalog.availability_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn catalog_outage_surfaces_as_dependency_unavailable() {
    let (orch, _, _) = orchestrator(StubIdentity::valid(), StubCatalog::down());

    let err = orch.validate(42, &[(1, 1)]).await.unwrap_err();
    assert!(matches!(err, AppError::DependencyUnavailable(_)));
}

#[tokio::test]
async fn duplicate_lines_merge_before_any_catalog_call() {
    let (orch, _, catalog) = orchestrator(
        StubIdentity::valid(),
        StubCatalog::with_products(vec![(1, "2.00", 10)]),
    );

    let validated = orch.validate(42, &[(1, 1), (1, 2)]).await.unwrap();

    assert_eq!(validated.lines.len(), 1);
    assert_eq!(validated.lines[0].quantity, 3);
    assert_eq!(validated.total_amount, "6.00".parse::<Decimal>().unwrap());
    // One merged line means exactly one lookup and one availability call.
    assert_eq!(catalog.info_calls.load(Ordering::SeqCst), 1);
    assert_eq!(catalog.availability_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_orders_are_rejected_without_any_rpc() {
    let (orch, identity, catalog) = orchestrator(
        StubIdentity::valid(),
        StubCatalog::with_products(vec![(1, "10.00", 5)]),
    );

    let err = orch.validate(42, &[]).await.unwrap_err();
    assert!(matches!(err, AppError::InputInvalid(_)));
    assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    assert_eq!(catalog.info_calls.load(Ordering::SeqCst), 0);
}
