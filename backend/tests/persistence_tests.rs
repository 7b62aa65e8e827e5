//! Database-backed tests for the order services
//!
//! Every test gets a fresh, migrated database from `#[sqlx::test]`. Run them
//! with `DATABASE_URL` pointing at a PostgreSQL server:
//! `cargo test -p pharma-warehouse-backend --test persistence_tests -- --ignored`

use chrono::{Duration, Months, NaiveDate, Utc};
use pharma_warehouse_backend::config::BillingConfig;
use pharma_warehouse_backend::error::AppError;
use pharma_warehouse_backend::services::batch::CreateBatchInput;
use pharma_warehouse_backend::services::export_order::{CreateExportOrderInput, RecordPickInput};
use pharma_warehouse_backend::services::import_order::CreateImportOrderInput;
use pharma_warehouse_backend::services::packaging::{
    NewBatchInput, PackageRowInput, PackagingInput,
};
use pharma_warehouse_backend::services::{
    BatchService, ExportOrderService, ImportOrderService, PackagingService,
};
use rust_decimal::Decimal;
use shared::{ExportOrderStatus, ImportOrderStatus, OrderLine, UserContext, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

// =============================================================================
// Fixtures
// =============================================================================

async fn user(pool: &PgPool, role: UserRole) -> UserContext {
    let id: Uuid = sqlx::query_scalar("INSERT INTO users (name, role) VALUES ($1, $2) RETURNING id")
        .bind(format!("{} account", role))
        .bind(role.as_str())
        .fetch_one(pool)
        .await
        .unwrap();
    UserContext::new(id, role)
}

async fn medicine(pool: &PgPool, code: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO medicines (code, name) VALUES ($1, $1) RETURNING id")
        .bind(code)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Contract covering `medicines` with a minimum order quantity of 5
async fn contract(pool: &PgPool, medicines: &[Uuid]) -> Uuid {
    let id: Uuid = sqlx::query_scalar("INSERT INTO contracts (contract_code) VALUES ($1) RETURNING id")
        .bind(format!("HD-{}", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

    for medicine_id in medicines {
        sqlx::query(
            "INSERT INTO contract_details (contract_id, medicine_id, min_order_quantity, unit_price) VALUES ($1, $2, 5, 12.50)",
        )
        .bind(id)
        .bind(medicine_id)
        .execute(pool)
        .await
        .unwrap();
    }
    id
}

async fn import_order(pool: &PgPool, created_by: &UserContext, status: ImportOrderStatus) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO import_orders (status, created_by, warehouse_manager_id) VALUES ($1, $2, $2) RETURNING id",
    )
    .bind(status.as_str())
    .bind(created_by.user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn inspection(pool: &PgPool, order_id: Uuid, medicine_id: Uuid, actual: i32, by: &UserContext) {
    sqlx::query(
        "INSERT INTO inspections (import_order_id, medicine_id, actual_quantity, created_by) VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(medicine_id)
    .bind(actual)
    .bind(by.user_id)
    .execute(pool)
    .await
    .unwrap();
}

fn lot_dates() -> (NaiveDate, NaiveDate) {
    let today = Utc::now().date_naive();
    let expiry = today.checked_add_months(Months::new(24)).unwrap();
    (today - Duration::days(30), expiry)
}

async fn batch(pool: &PgPool, medicine_id: Uuid, code: &str) -> Uuid {
    let (production, expiry) = lot_dates();
    sqlx::query_scalar(
        "INSERT INTO batches (medicine_id, batch_code, production_date, expiry_date) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(medicine_id)
    .bind(code)
    .bind(production)
    .bind(expiry)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn location(pool: &PgPool) -> Uuid {
    let area: Uuid = sqlx::query_scalar("INSERT INTO areas (name) VALUES ($1) RETURNING id")
        .bind(format!("Area {}", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();
    sqlx::query_scalar(
        "INSERT INTO locations (area_id, bay, shelf_row, shelf_column) VALUES ($1, 'A', 1, 1) RETURNING id",
    )
    .bind(area)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn package(
    pool: &PgPool,
    order_id: Uuid,
    batch_id: Uuid,
    quantity: i32,
    location_id: Option<Uuid>,
) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO packages (import_order_id, batch_id, quantity, location_id) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(order_id)
    .bind(batch_id)
    .bind(quantity)
    .bind(location_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn import_status(pool: &PgPool, order_id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM import_orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
}

fn batch_input(medicine_id: Uuid, code: &str) -> CreateBatchInput {
    let (production_date, expiry_date) = lot_dates();
    CreateBatchInput {
        medicine_id,
        batch_code: code.to_string(),
        production_date,
        expiry_date,
        supplier_id: None,
    }
}

fn new_lot(key: &str, medicine_id: Uuid, code: &str) -> NewBatchInput {
    let (production_date, expiry_date) = lot_dates();
    NewBatchInput {
        key: key.to_string(),
        medicine_id,
        batch_code: code.to_string(),
        production_date,
        expiry_date,
        supplier_id: None,
    }
}

fn row(key: &str, quantity: i64) -> PackageRowInput {
    PackageRowInput {
        batch_id: None,
        batch_key: Some(key.to_string()),
        quantity,
    }
}

fn line(medicine_id: Uuid, quantity: i32) -> OrderLine {
    OrderLine {
        medicine_id,
        quantity,
        unit_price: None,
    }
}

// =============================================================================
// Batch codes
// =============================================================================

mod batch_codes {
    use super::*;

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn concurrent_declarations_of_one_code_store_one_batch(pool: PgPool) {
        let wm = user(&pool, UserRole::WarehouseManager).await;
        let m1 = medicine(&pool, "PARA-500").await;
        let service = BatchService::new(pool.clone());

        let (first, second) = tokio::join!(
            service.create_batch(&wm, batch_input(m1, "LOT-2026-001")),
            service.create_batch(&wm, batch_input(m1, "LOT-2026-001")),
        );
        let outcomes = [first, second];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::DuplicateEntry(_)))));

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batches WHERE batch_code = $1")
            .bind("LOT-2026-001")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn representatives_cannot_declare_batches(pool: PgPool) {
        let rep = user(&pool, UserRole::Representative).await;
        let m1 = medicine(&pool, "AMOX-250").await;

        let result = BatchService::new(pool.clone())
            .create_batch(&rep, batch_input(m1, "LOT-REP"))
            .await;

        assert!(matches!(result, Err(AppError::InsufficientPermissions(_))));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM batches WHERE medicine_id = $1", m1).await, 0);
    }
}

// =============================================================================
// Packaging step
// =============================================================================

mod packaging {
    use super::*;

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn mismatch_leaves_order_checked_and_writes_nothing(pool: PgPool) {
        let wm = user(&pool, UserRole::WarehouseManager).await;
        let m1 = medicine(&pool, "M1").await;
        let order_id = import_order(&pool, &wm, ImportOrderStatus::Checked).await;
        inspection(&pool, order_id, m1, 20, &wm).await;
        let service = PackagingService::new(pool.clone());

        let under = PackagingInput {
            new_batches: vec![new_lot("a", m1, "LOT-M1-A")],
            packages: vec![row("a", 15)],
        };
        match service.package_order(&wm, order_id, under).await {
            Err(AppError::Reconciliation(diagnostics)) => {
                assert_eq!(diagnostics[0].to_string(), "M1 is 5 unit under");
            }
            other => panic!("expected a reconciliation failure, got {:?}", other),
        }

        assert_eq!(import_status(&pool, order_id).await, "checked");
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM packages WHERE import_order_id = $1", order_id).await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM batches WHERE medicine_id = $1", m1).await, 0);

        let exact = PackagingInput {
            new_batches: vec![new_lot("a", m1, "LOT-M1-A")],
            packages: vec![row("a", 20)],
        };
        let result = service.package_order(&wm, order_id, exact).await.unwrap();
        assert_eq!(result.order.status, ImportOrderStatus::Arranged);
        assert_eq!(result.packages.len(), 1);
    }

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn taken_lot_code_aborts_the_whole_step(pool: PgPool) {
        let wm = user(&pool, UserRole::WarehouseManager).await;
        let m1 = medicine(&pool, "M1").await;
        let m2 = medicine(&pool, "M2").await;
        batch(&pool, m2, "LOT-TAKEN").await;
        let order_id = import_order(&pool, &wm, ImportOrderStatus::Checked).await;
        inspection(&pool, order_id, m1, 10, &wm).await;
        inspection(&pool, order_id, m2, 4, &wm).await;

        let input = PackagingInput {
            new_batches: vec![new_lot("a", m1, "LOT-FRESH"), new_lot("b", m2, "LOT-TAKEN")],
            packages: vec![row("a", 10), row("b", 4)],
        };
        let result = PackagingService::new(pool.clone())
            .package_order(&wm, order_id, input)
            .await;

        assert!(matches!(result, Err(AppError::DuplicateEntry(_))));
        assert_eq!(import_status(&pool, order_id).await, "checked");
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM batches WHERE medicine_id = $1", m1).await, 0);
    }
}

// =============================================================================
// Reading orders back
// =============================================================================

mod read_back {
    use super::*;

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn import_order_lines_come_back_in_submitted_order(pool: PgPool) {
        let rep = user(&pool, UserRole::Representative).await;
        let mut medicines = Vec::new();
        for code in ["M1", "M2", "M3", "M4", "M5", "M6"] {
            medicines.push(medicine(&pool, code).await);
        }
        let contract_id = contract(&pool, &medicines).await;
        let submitted = vec![medicines[4], medicines[0], medicines[5], medicines[2], medicines[1], medicines[3]];

        let service = ImportOrderService::new(pool.clone(), BillingConfig { payment_term_days: 30 });
        let created = service
            .create_order(
                &rep,
                CreateImportOrderInput {
                    contract_id: Some(contract_id),
                    details: submitted.iter().map(|m| line(*m, 10)).collect(),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.order.status, ImportOrderStatus::Draft);

        let first = service.get_order(&rep, created.order.id).await.unwrap();
        let second = service.get_order(&rep, created.order.id).await.unwrap();

        let read: Vec<Uuid> = first.details.iter().map(|d| d.medicine_id).collect();
        assert_eq!(read, submitted);
        assert!(first.details.iter().all(|d| d.unit_price == Decimal::new(1250, 2)));
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn export_order_lines_come_back_in_submitted_order(pool: PgPool) {
        let wm = user(&pool, UserRole::WarehouseManager).await;
        let m1 = medicine(&pool, "M1").await;
        let m2 = medicine(&pool, "M2").await;
        let m3 = medicine(&pool, "M3").await;
        let service = ExportOrderService::new(pool.clone());

        let created = service
            .create_order(
                &wm,
                CreateExportOrderInput {
                    contract_id: None,
                    details: vec![line(m3, 1), line(m1, 2), line(m2, 3)],
                },
            )
            .await
            .unwrap();

        let fetched = service.get_order(&wm, created.order.id).await.unwrap();
        let read: Vec<Uuid> = fetched.details.iter().map(|l| l.detail.medicine_id).collect();
        assert_eq!(read, vec![m3, m1, m2]);
        assert_eq!(fetched.order.status, ExportOrderStatus::Approved);
    }
}

// =============================================================================
// Picking and deletion
// =============================================================================

mod picking {
    use super::*;

    struct Stock {
        shelved: Uuid,
        unshelved: Uuid,
        still_arranging: Uuid,
    }

    async fn stock(pool: &PgPool, wm: &UserContext, m1: Uuid) -> Stock {
        let shelf = location(pool).await;
        let received = import_order(pool, wm, ImportOrderStatus::Completed).await;
        let arranging = import_order(pool, wm, ImportOrderStatus::Arranged).await;
        let lot = batch(pool, m1, "LOT-PICK").await;

        Stock {
            shelved: package(pool, received, lot, 10, Some(shelf)).await,
            unshelved: package(pool, received, lot, 10, None).await,
            still_arranging: package(pool, arranging, lot, 10, Some(shelf)).await,
        }
    }

    async fn export_line(service: &ExportOrderService, wm: &UserContext, m1: Uuid) -> (Uuid, Uuid) {
        let created = service
            .create_order(
                wm,
                CreateExportOrderInput {
                    contract_id: None,
                    details: vec![line(m1, 8)],
                },
            )
            .await
            .unwrap();
        (created.order.id, created.details[0].detail.id)
    }

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn only_shelved_stock_from_completed_receipts_is_pickable(pool: PgPool) {
        let wm = user(&pool, UserRole::WarehouseManager).await;
        let m1 = medicine(&pool, "M1").await;
        let stock = stock(&pool, &wm, m1).await;
        let service = ExportOrderService::new(pool.clone());
        let (order_id, detail_id) = export_line(&service, &wm, m1).await;

        let outstanding = service.outstanding(&wm, order_id).await.unwrap().outstanding;
        let offered: Vec<Uuid> = outstanding[0].packages.iter().map(|p| p.package_id).collect();
        assert_eq!(offered, vec![stock.shelved]);

        let pick = |package_id: Uuid| RecordPickInput {
            package_id,
            confirm_package_id: package_id,
            quantity: 2,
        };
        assert!(matches!(
            service.record_pick(&wm, order_id, detail_id, pick(stock.still_arranging)).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            service.record_pick(&wm, order_id, detail_id, pick(stock.unshelved)).await,
            Err(AppError::Validation { .. })
        ));
        assert!(service.record_pick(&wm, order_id, detail_id, pick(stock.shelved)).await.is_ok());
    }

    #[sqlx::test]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn cancelled_order_with_picks_keeps_its_record(pool: PgPool) {
        let wm = user(&pool, UserRole::WarehouseManager).await;
        let m1 = medicine(&pool, "M1").await;
        let stock = stock(&pool, &wm, m1).await;
        let service = ExportOrderService::new(pool.clone());

        let (picked_order, detail_id) = export_line(&service, &wm, m1).await;
        service
            .record_pick(
                &wm,
                picked_order,
                detail_id,
                RecordPickInput {
                    package_id: stock.shelved,
                    confirm_package_id: stock.shelved,
                    quantity: 3,
                },
            )
            .await
            .unwrap();
        let (untouched_order, _) = export_line(&service, &wm, m1).await;

        sqlx::query("UPDATE export_orders SET status = $1")
            .bind(ExportOrderStatus::Cancelled.as_str())
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(
            service.delete_order(&wm, picked_order).await,
            Err(AppError::InvalidState(_))
        ));
        assert_eq!(
            count(&pool, "SELECT COUNT(*) FROM export_order_picks WHERE package_id = $1", stock.shelved).await,
            1
        );
        let on_hand: i32 = sqlx::query_scalar("SELECT quantity FROM packages WHERE id = $1")
            .bind(stock.shelved)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(on_hand, 7);

        service.delete_order(&wm, untouched_order).await.unwrap();
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM export_orders WHERE id = $1", untouched_order).await, 0);
    }
}
