mod common;

use assert_matches::assert_matches;
use common::TestApp;
use kitchen_ops::{
    errors::ServiceError,
    events::Event,
    queries::ListQuery,
    services::kitchen_orders::{KitchenOrderLineInput, UpdateKitchenOrder},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn approval_deducts_stock_and_recomputes_total() {
    let mut app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(2.5)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;

    assert!(!order.order.is_approved);
    assert_eq!(order.order.total_amount, dec!(10));
    assert_eq!(order.items[0].unit_price, dec!(2.5));

    let approved = app
        .services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .expect("approve");
    assert!(approved.order.is_approved);

    let after = app.stock_row(stock.id).await.expect("stock row");
    assert_eq!(after.quantity, dec!(6));
    assert_eq!(after.total_price, dec!(15));

    let approvals: Vec<_> = app
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::KitchenOrderApproved { .. }))
        .collect();
    assert_eq!(approvals.len(), 1);
    assert_matches!(
        &approvals[0],
        Event::KitchenOrderApproved { kitchen_order_id, deductions, .. }
            if *kitchen_order_id == order.order.id && deductions == &vec![(stock.id, dec!(4))]
    );
}

#[tokio::test]
async fn approval_is_all_or_nothing() {
    let app = TestApp::new().await;
    let plenty = app.seed_stock(dec!(10), dec!(1)).await;
    let scarce = app.seed_stock(dec!(2), dec!(1)).await;
    let order = app
        .seed_order(&[(plenty.id, dec!(5)), (scarce.id, dec!(3))])
        .await;

    let err = app
        .services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .unwrap_err();

    match err {
        ServiceError::InsufficientStock(shortfalls) => {
            assert_eq!(shortfalls.len(), 1);
            assert_eq!(shortfalls[0].kitchen_stock_id, scarce.id);
            assert_eq!(shortfalls[0].requested, dec!(3));
            assert_eq!(shortfalls[0].available, dec!(2));
            assert_eq!(shortfalls[0].shortfall, dec!(1));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(app.stock_row(plenty.id).await.unwrap().quantity, dec!(10));
    assert_eq!(app.stock_row(scarce.id).await.unwrap().quantity, dec!(2));

    let reloaded = app
        .services
        .kitchen_orders
        .find_with_items(order.order.id)
        .await
        .unwrap();
    assert!(!reloaded.order.is_approved);
}

#[tokio::test]
async fn second_approval_is_rejected_without_deducting_again() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;

    app.services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .expect("first approval");

    let err = app
        .services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AlreadyApproved(id) if id == order.order.id);
    assert_eq!(app.stock_row(stock.id).await.unwrap().quantity, dec!(6));
}

async fn race_two_full_orders(app: &TestApp) {
    let stock = app.seed_stock(dec!(5), dec!(1)).await;
    let first = app.seed_order(&[(stock.id, dec!(5))]).await;
    let second = app.seed_order(&[(stock.id, dec!(5))]).await;

    let orders = app.services.kitchen_orders.clone();
    let (a, b) = tokio::join!(
        orders.approve(first.order.id),
        orders.approve(second.order.id)
    );

    let outcomes = [a, b];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one approval should win: {outcomes:?}");
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ServiceError::InsufficientStock(_)))));

    let after = app.stock_row(stock.id).await.unwrap();
    assert_eq!(after.quantity, dec!(0));
    assert_eq!(after.total_price, dec!(0));
}

#[tokio::test]
async fn racing_approvals_cannot_overdraw_a_batch() {
    let app = TestApp::new().await;
    race_two_full_orders(&app).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_approvals_on_separate_connections_cannot_overdraw_a_batch() {
    let app = TestApp::file_backed(4).await;
    for _ in 0..5 {
        race_two_full_orders(&app).await;
    }
}

#[tokio::test]
async fn fractional_quantities_are_deducted_exactly() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(2.5), dec!(1.75)).await;
    let small = app.seed_order(&[(stock.id, dec!(0.7))]).await;
    let rest = app.seed_order(&[(stock.id, dec!(1.8))]).await;
    assert_eq!(small.order.total_amount, dec!(1.225));

    app.services
        .kitchen_orders
        .approve(small.order.id)
        .await
        .expect("approve the small order");
    let after = app.stock_row(stock.id).await.unwrap();
    assert_eq!(after.quantity, dec!(1.8));
    assert_eq!(after.total_price, dec!(3.15));

    // The remainder must cover an order for exactly what is left.
    app.services
        .kitchen_orders
        .approve(rest.order.id)
        .await
        .expect("approve the remainder");
    let after = app.stock_row(stock.id).await.unwrap();
    assert_eq!(after.quantity, dec!(0));
    assert_eq!(after.total_price, dec!(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn approval_racing_a_trash_reports_what_was_committed() {
    let app = TestApp::file_backed(4).await;
    let stock = app.seed_stock(dec!(100), dec!(1)).await;
    let mut expected = dec!(100);

    for _ in 0..10 {
        let order = app.seed_order(&[(stock.id, dec!(1))]).await;
        let orders = app.services.kitchen_orders.clone();
        let trash = orders.trash().clone();

        let (approved, trashed) = tokio::join!(
            orders.approve(order.order.id),
            trash.soft_delete(order.order.id)
        );
        trashed.expect("trashing an active order");

        match approved {
            Ok(result) => {
                assert!(result.order.is_approved);
                assert_eq!(result.order.id, order.order.id);
                assert_eq!(result.items.len(), 1);
                expected -= dec!(1);
            }
            Err(ServiceError::NotFound(_)) => {}
            Err(other) => panic!("unexpected approval failure: {other:?}"),
        }
        // An error means nothing was deducted; success means exactly one unit.
        assert_eq!(app.stock_row(stock.id).await.unwrap().quantity, expected);
    }
}

#[tokio::test]
async fn trashed_orders_cannot_be_approved() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;

    app.services
        .kitchen_orders
        .trash()
        .soft_delete(order.order.id)
        .await
        .unwrap();

    let err = app
        .services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(app.stock_row(stock.id).await.unwrap().quantity, dec!(10));
}

#[tokio::test]
async fn approval_fails_when_a_referenced_batch_is_trashed() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;

    app.services
        .kitchen_stock
        .trash()
        .soft_delete(stock.id)
        .await
        .unwrap();

    let err = app
        .services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn approved_orders_are_immutable() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;
    app.services
        .kitchen_orders
        .approve(order.order.id)
        .await
        .unwrap();

    let err = app
        .services
        .kitchen_orders
        .update(
            order.order.id,
            UpdateKitchenOrder {
                description: None,
                items: vec![KitchenOrderLineInput {
                    kitchen_stock_id: stock.id,
                    quantity: dec!(1),
                }],
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AlreadyApproved(_));
}

#[tokio::test]
async fn pending_orders_can_be_rewritten() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(3)).await;
    let order = app.seed_order(&[(stock.id, dec!(4))]).await;

    let updated = app
        .services
        .kitchen_orders
        .update(
            order.order.id,
            UpdateKitchenOrder {
                description: Some("lunch prep".to_string()),
                items: vec![KitchenOrderLineInput {
                    kitchen_stock_id: stock.id,
                    quantity: dec!(2),
                }],
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.items[0].quantity, dec!(2));
    assert_eq!(updated.order.total_amount, dec!(6));
    assert_eq!(updated.order.description.as_deref(), Some("lunch prep"));
}

#[tokio::test]
async fn duplicate_and_non_positive_lines_are_rejected() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;

    let duplicate = app
        .services
        .kitchen_orders
        .create(kitchen_ops::services::kitchen_orders::CreateKitchenOrder {
            order_id: None,
            user_id: Uuid::new_v4(),
            description: None,
            items: vec![
                KitchenOrderLineInput {
                    kitchen_stock_id: stock.id,
                    quantity: dec!(1),
                },
                KitchenOrderLineInput {
                    kitchen_stock_id: stock.id,
                    quantity: dec!(2),
                },
            ],
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::ValidationError(_)));

    let zero = app
        .services
        .kitchen_orders
        .create(kitchen_ops::services::kitchen_orders::CreateKitchenOrder {
            order_id: None,
            user_id: Uuid::new_v4(),
            description: None,
            items: vec![KitchenOrderLineInput {
                kitchen_stock_id: stock.id,
                quantity: dec!(0),
            }],
        })
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn listing_filters_by_approval_state() {
    let app = TestApp::new().await;
    let stock = app.seed_stock(dec!(10), dec!(1)).await;
    let pending = app.seed_order(&[(stock.id, dec!(1))]).await;
    let approved = app.seed_order(&[(stock.id, dec!(1))]).await;

    // Prime the cache before the approval changes the picture.
    let before = app
        .services
        .kitchen_orders
        .list(&ListQuery::default(), Some(true))
        .await
        .unwrap();
    assert_eq!(before.total, 0);

    app.services
        .kitchen_orders
        .approve(approved.order.id)
        .await
        .unwrap();

    let approved_page = app
        .services
        .kitchen_orders
        .list(&ListQuery::default(), Some(true))
        .await
        .unwrap();
    assert_eq!(approved_page.total, 1);
    assert_eq!(approved_page.items[0].id, approved.order.id);

    let pending_page = app
        .services
        .kitchen_orders
        .list(&ListQuery::default(), Some(false))
        .await
        .unwrap();
    assert_eq!(pending_page.total, 1);
    assert_eq!(pending_page.items[0].id, pending.order.id);
}
