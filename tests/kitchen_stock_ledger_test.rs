mod common;

use assert_matches::assert_matches;
use common::TestApp;
use kitchen_ops::{
    cache::{CacheBackend, CacheNamespace},
    errors::ServiceError,
    events::Event,
    queries::ListQuery,
    services::kitchen_stock::CreateKitchenStock,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn receiving_stock_prices_the_batch() {
    let mut app = TestApp::new().await;
    let item = app.seed_item("Basmati Rice").await;

    let stock = app
        .services
        .kitchen_stock
        .create(CreateKitchenStock {
            kitchen_item_id: item.id,
            quantity: dec!(12),
            price: dec!(1.25),
            description: Some("weekly delivery".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(stock.quantity, dec!(12));
    assert_eq!(stock.total_price, dec!(15));
    assert!(stock.deleted_at.is_none());

    assert!(app.drain_events().iter().any(|e| matches!(
        e,
        Event::StockReceived { kitchen_stock_id, .. } if *kitchen_stock_id == stock.id
    )));
}

#[tokio::test]
async fn stock_requires_an_active_item() {
    let app = TestApp::new().await;
    let item = app.seed_item("Mustard Oil").await;
    app.services
        .kitchen_items
        .trash()
        .soft_delete(item.id)
        .await
        .unwrap();

    let err = app
        .services
        .kitchen_stock
        .adjust_stock(item.id, dec!(5), dec!(3))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let missing = app
        .services
        .kitchen_stock
        .adjust_stock(Uuid::new_v4(), dec!(5), dec!(3))
        .await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn negative_receipts_are_rejected() {
    let app = TestApp::new().await;
    let item = app.seed_item("Sugar").await;

    let err = app
        .services
        .kitchen_stock
        .adjust_stock(item.id, dec!(-1), dec!(3))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn deduct_never_goes_below_zero() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(3), dec!(2)).await;

    let after = app
        .services
        .kitchen_stock
        .deduct(stock.id, dec!(3))
        .await
        .unwrap();
    assert_eq!(after.quantity, dec!(0));
    assert_eq!(after.total_price, dec!(0));

    let err = app
        .services
        .kitchen_stock
        .deduct(stock.id, dec!(1))
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientStock(shortfalls) => {
            assert_eq!(shortfalls.len(), 1);
            assert_eq!(shortfalls[0].requested, dec!(1));
            assert_eq!(shortfalls[0].available, dec!(0));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(app.stock_row(stock.id).await.unwrap().quantity, dec!(0));
}

#[tokio::test]
async fn fractional_deductions_leave_exact_remainders() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(0.3), dec!(2.5)).await;
    let ledger = &app.services.kitchen_stock;

    let after = ledger.deduct(stock.id, dec!(0.1)).await.unwrap();
    assert_eq!(after.quantity, dec!(0.2));
    assert_eq!(after.total_price, dec!(0.5));

    let row = app.stock_row(stock.id).await.unwrap();
    assert_eq!(row.quantity, dec!(0.2));
    assert_eq!(row.version, stock.version + 1);

    // What is on hand covers a request for exactly that much.
    let emptied = ledger.deduct(stock.id, dec!(0.2)).await.unwrap();
    assert_eq!(emptied.quantity, dec!(0));
    assert_eq!(emptied.total_price, dec!(0));

    let row = app.stock_row(stock.id).await.unwrap();
    assert_eq!(row.quantity, dec!(0));
    assert_eq!(row.total_price, dec!(0));
}

#[tokio::test]
async fn overrides_bump_the_version_checked_by_deductions() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(4), dec!(1)).await;
    assert_eq!(stock.version, 0);

    let updated = app
        .services
        .kitchen_stock
        .update_quantity(stock.id, dec!(1.5))
        .await
        .unwrap();
    assert_eq!(updated.version, 1);

    let after = app
        .services
        .kitchen_stock
        .deduct(stock.id, dec!(1.5))
        .await
        .unwrap();
    assert_eq!(after.quantity, dec!(0));
    assert_eq!(after.version, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_deductions_on_separate_connections_never_overdraw() {
    let app = TestApp::file_backed(4).await;
    let stock = app.seed_stock(dec!(1), dec!(1)).await;
    let ledger = app.services.kitchen_stock.clone();
    let stock_id = stock.id;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.deduct(stock_id, dec!(0.3)).await
        }));
    }

    let mut granted: u32 = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(ServiceError::InsufficientStock(_)) | Err(ServiceError::ConcurrentModification(_)) => {}
            Err(other) => panic!("unexpected deduction failure: {other:?}"),
        }
    }

    assert!((1..=3).contains(&granted), "granted {granted}");
    let row = app.stock_row(stock.id).await.unwrap();
    assert_eq!(row.quantity, dec!(1) - dec!(0.3) * Decimal::from(granted));
    assert!(row.quantity >= dec!(0));
}

#[tokio::test]
async fn deduct_rejects_non_positive_amounts_and_trashed_batches() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(3), dec!(2)).await;

    assert_matches!(
        app.services.kitchen_stock.deduct(stock.id, dec!(0)).await,
        Err(ServiceError::ValidationError(_))
    );

    app.services
        .kitchen_stock
        .trash()
        .soft_delete(stock.id)
        .await
        .unwrap();
    assert_matches!(
        app.services.kitchen_stock.deduct(stock.id, dec!(1)).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(app.stock_row(stock.id).await.unwrap().quantity, dec!(3));
}

#[tokio::test]
async fn quantity_override_recomputes_total_and_refreshes_cache() {
    let mut app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(2)).await;

    // Populate both the id entry and a listing.
    let cached = app.services.kitchen_stock.find_by_id(stock.id).await.unwrap();
    assert_eq!(cached.quantity, dec!(10));
    app.services
        .kitchen_stock
        .list(&ListQuery::default(), None)
        .await
        .unwrap();

    let updated = app
        .services
        .kitchen_stock
        .update_quantity(stock.id, dec!(7))
        .await
        .unwrap();
    assert_eq!(updated.quantity, dec!(7));
    assert_eq!(updated.total_price, dec!(14));

    let fresh = app.services.kitchen_stock.find_by_id(stock.id).await.unwrap();
    assert_eq!(fresh.quantity, dec!(7));
    let page = app
        .services
        .kitchen_stock
        .list(&ListQuery::default(), None)
        .await
        .unwrap();
    assert_eq!(page.items[0].quantity, dec!(7));

    assert!(app.drain_events().iter().any(|e| matches!(
        e,
        Event::StockQuantityOverridden { old_quantity, new_quantity, .. }
            if *old_quantity == dec!(10) && *new_quantity == dec!(7)
    )));
}

#[tokio::test]
async fn negative_override_is_rejected() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(2)).await;

    let err = app
        .services
        .kitchen_stock
        .update_quantity(stock.id, dec!(-1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.stock_row(stock.id).await.unwrap().quantity, dec!(10));
}

#[tokio::test]
async fn approval_drops_cached_stock_entries() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;

    app.services.kitchen_stock.find_by_id(stock.id).await.unwrap();
    let key = CacheNamespace::KitchenStock.id_key(stock.id);
    assert!(app.cache.backend().exists(&key).await.unwrap());

    app.services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .unwrap();

    assert!(!app.cache.backend().exists(&key).await.unwrap());
    let fresh = app.services.kitchen_stock.find_by_id(stock.id).await.unwrap();
    assert_eq!(fresh.quantity, dec!(6));
}

#[tokio::test]
async fn listing_filters_by_item() {
    let app = TestApp::new().await;
    let item = app.seed_item("Lentils").await;
    app.services
        .kitchen_stock
        .adjust_stock(item.id, dec!(4), dec!(1))
        .await
        .unwrap();
    app.services
        .kitchen_stock
        .adjust_stock(item.id, dec!(6), dec!(1))
        .await
        .unwrap();
    app.seed_stock(dec!(1), dec!(1)).await;

    let all = app
        .services
        .kitchen_stock
        .list(&ListQuery::default(), None)
        .await
        .unwrap();
    assert_eq!(all.total, 3);

    let for_item = app
        .services
        .kitchen_stock
        .list(&ListQuery::default(), Some(item.id))
        .await
        .unwrap();
    assert_eq!(for_item.total, 2);
    assert!(for_item.items.iter().all(|s| s.kitchen_item_id == item.id));
}
