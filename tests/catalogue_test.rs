mod common;

use assert_matches::assert_matches;
use common::TestApp;
use kitchen_ops::{
    entities::{discount::DiscountType, kitchen_item::ItemType},
    errors::ServiceError,
    queries::ListQuery,
    services::{
        categories::UpdateCategory,
        discounts::{CreateDiscount, UpdateDiscount},
        kitchen_items::{CreateKitchenItem, UpdateKitchenItem},
    },
};
use rust_decimal_macros::dec;

fn bar_item(name: &str) -> CreateKitchenItem {
    CreateKitchenItem {
        name: name.to_string(),
        name_bn: None,
        image: None,
        description: None,
        item_type: ItemType::Bar,
    }
}

fn discount(code: &str) -> CreateDiscount {
    CreateDiscount {
        name: "Happy hour".to_string(),
        code: code.to_string(),
        discount_type: DiscountType::Percentage,
        amount: dec!(15),
        starts_at: None,
        ends_at: None,
    }
}

#[tokio::test]
async fn item_slugs_are_unique_across_the_table() {
    let app = TestApp::new().await;
    let items = &app.services.kitchen_items;

    let first = items.create(bar_item("Lime Soda")).await.unwrap();
    let second = items.create(bar_item("Lime  soda")).await.unwrap();
    assert_eq!(first.slug, "lime-soda");
    assert_eq!(second.slug, "lime-soda-2");

    // Trashed rows still hold their slug.
    items.trash().soft_delete(first.id).await.unwrap();
    let third = items.create(bar_item("Lime Soda")).await.unwrap();
    assert_eq!(third.slug, "lime-soda-3");

    let found = items.find_by_slug("lime-soda-2").await.unwrap();
    assert_eq!(found.id, second.id);
    assert_matches!(
        items.find_by_slug("lime-soda").await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn renaming_an_item_regenerates_its_slug() {
    let app = TestApp::new().await;
    let items = &app.services.kitchen_items;
    let item = items.create(bar_item("Mango Lassi")).await.unwrap();

    let cached = items.find_by_id(item.id).await.unwrap();
    assert_eq!(cached.slug, "mango-lassi");

    let renamed = items
        .update(
            item.id,
            UpdateKitchenItem {
                name: Some("Sweet Lassi".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.slug, "sweet-lassi");
    assert_eq!(items.find_by_id(item.id).await.unwrap().name, "Sweet Lassi");
}

#[tokio::test]
async fn blank_item_names_are_rejected() {
    let app = TestApp::new().await;
    assert_matches!(
        app.services.kitchen_items.create(bar_item("")).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn items_list_by_type() {
    let app = TestApp::new().await;
    app.seed_item("Onion").await;
    app.services
        .kitchen_items
        .create(bar_item("Mint Syrup"))
        .await
        .unwrap();

    let bar = app
        .services
        .kitchen_items
        .list(&ListQuery::default(), Some(ItemType::Bar))
        .await
        .unwrap();
    assert_eq!(bar.total, 1);
    assert_eq!(bar.items[0].name, "Mint Syrup");

    let searched = app
        .services
        .kitchen_items
        .list(&ListQuery::default().with_search("oni"), None)
        .await
        .unwrap();
    assert_eq!(searched.total, 1);
    assert_eq!(searched.items[0].name, "Onion");
}

#[tokio::test]
async fn discount_codes_are_normalized_and_unique() {
    let app = TestApp::new().await;
    let discounts = &app.services.discounts;

    let created = discounts.create(discount(" eid10 ")).await.unwrap();
    assert_eq!(created.code, "EID10");
    assert_eq!(created.kind(), Some(DiscountType::Percentage));

    assert_matches!(
        discounts.create(discount("EID10")).await,
        Err(ServiceError::ValidationError(_))
    );

    let other = discounts.create(discount("LUNCH")).await.unwrap();
    assert_matches!(
        discounts
            .update(
                other.id,
                UpdateDiscount {
                    code: Some("eid10".to_string()),
                    ..Default::default()
                },
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn discount_terms_are_checked_on_update() {
    let app = TestApp::new().await;
    let discounts = &app.services.discounts;
    let created = discounts.create(discount("WEEKEND")).await.unwrap();

    assert_matches!(
        discounts
            .update(
                created.id,
                UpdateDiscount {
                    amount: Some(dec!(120)),
                    ..Default::default()
                },
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let fixed = discounts
        .update(
            created.id,
            UpdateDiscount {
                discount_type: Some(DiscountType::Fixed),
                amount: Some(dec!(120)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(fixed.discount_type, "FIXED");
    assert_eq!(fixed.amount, dec!(120));
}

#[tokio::test]
async fn category_updates_are_visible_through_the_cache() {
    let app = TestApp::new().await;
    let categories = &app.services.categories;
    let cat = categories
        .create(kitchen_ops::services::categories::CreateCategory {
            name: "Breakfast".to_string(),
            description: None,
        })
        .await
        .unwrap();

    assert_eq!(categories.find_by_id(cat.id).await.unwrap().name, "Breakfast");

    categories
        .update(
            cat.id,
            UpdateCategory {
                name: Some("Brunch".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(categories.find_by_id(cat.id).await.unwrap().name, "Brunch");
}
