use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_categories_table::Migration),
            Box::new(m20240601_000002_create_discounts_table::Migration),
            Box::new(m20240601_000003_create_kitchen_items_table::Migration),
            Box::new(m20240601_000004_create_kitchen_stock_table::Migration),
            Box::new(m20240601_000005_create_kitchen_orders_table::Migration),
            Box::new(m20240601_000006_create_kitchen_order_items_table::Migration),
            Box::new(m20240601_000007_create_activity_logs_table::Migration),
        ]
    }
}

/// Fixed-point quantity/money column. sea-query refuses a declared
/// precision above 16 for SQLite, so only Postgres gets `numeric(19, 4)`.
fn decimal_column<T: IntoIden>(manager: &SchemaManager, name: T) -> ColumnDef {
    let mut column = ColumnDef::new(name);
    match manager.get_database_backend() {
        sea_orm::DbBackend::Sqlite => column.decimal_len(16, 4),
        _ => column.decimal_len(19, 4),
    };
    column
}

// Migration implementations

mod m20240601_000001_create_categories_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_categories_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Categories::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(
                            ColumnDef::new(Categories::Slug)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(
                            ColumnDef::new(Categories::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_categories_deleted_at")
                        .table(Categories::Table)
                        .col(Categories::DeletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        Slug,
        Description,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_discounts_table {
    use super::decimal_column;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_discounts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Discounts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Discounts::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Discounts::Name).string().not_null())
                        .col(
                            ColumnDef::new(Discounts::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Discounts::DiscountType).string().not_null())
                        .col(
                            decimal_column(manager, Discounts::Amount)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Discounts::StartsAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::EndsAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Discounts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_discounts_deleted_at")
                        .table(Discounts::Table)
                        .col(Discounts::DeletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Discounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Discounts {
        Table,
        Id,
        Name,
        Code,
        DiscountType,
        Amount,
        StartsAt,
        EndsAt,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_kitchen_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_kitchen_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(KitchenItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(KitchenItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(KitchenItems::Name).string().not_null())
                        .col(ColumnDef::new(KitchenItems::NameBn).string().null())
                        .col(
                            ColumnDef::new(KitchenItems::Slug)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(KitchenItems::Image).string().null())
                        .col(ColumnDef::new(KitchenItems::Description).text().null())
                        .col(
                            ColumnDef::new(KitchenItems::ItemType)
                                .string_len(16)
                                .not_null()
                                .default("KITCHEN"),
                        )
                        .col(
                            ColumnDef::new(KitchenItems::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(KitchenItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitchenItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kitchen_items_deleted_at")
                        .table(KitchenItems::Table)
                        .col(KitchenItems::DeletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(KitchenItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum KitchenItems {
        Table,
        Id,
        Name,
        NameBn,
        Slug,
        Image,
        Description,
        ItemType,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000004_create_kitchen_stock_table {
    use super::decimal_column;
    use super::m20240601_000003_create_kitchen_items_table::KitchenItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_kitchen_stock_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(KitchenStock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(KitchenStock::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(KitchenStock::KitchenItemId).uuid().not_null())
                        .col(
                            decimal_column(manager, KitchenStock::Quantity)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            decimal_column(manager, KitchenStock::Price)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            decimal_column(manager, KitchenStock::TotalPrice)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(KitchenStock::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(KitchenStock::Description).text().null())
                        .col(
                            ColumnDef::new(KitchenStock::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(KitchenStock::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitchenStock::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_kitchen_stock_kitchen_item")
                                .from(KitchenStock::Table, KitchenStock::KitchenItemId)
                                .to(KitchenItems::Table, KitchenItems::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kitchen_stock_kitchen_item_id")
                        .table(KitchenStock::Table)
                        .col(KitchenStock::KitchenItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kitchen_stock_deleted_at")
                        .table(KitchenStock::Table)
                        .col(KitchenStock::DeletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(KitchenStock::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum KitchenStock {
        Table,
        Id,
        KitchenItemId,
        Quantity,
        Price,
        TotalPrice,
        Version,
        Description,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000005_create_kitchen_orders_table {
    use super::decimal_column;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_kitchen_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(KitchenOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(KitchenOrders::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(KitchenOrders::OrderId).uuid().null())
                        .col(ColumnDef::new(KitchenOrders::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(KitchenOrders::IsApproved)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(KitchenOrders::Description).text().null())
                        .col(
                            decimal_column(manager, KitchenOrders::TotalAmount)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(KitchenOrders::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(KitchenOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitchenOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kitchen_orders_is_approved")
                        .table(KitchenOrders::Table)
                        .col(KitchenOrders::IsApproved)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kitchen_orders_deleted_at")
                        .table(KitchenOrders::Table)
                        .col(KitchenOrders::DeletedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(KitchenOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum KitchenOrders {
        Table,
        Id,
        OrderId,
        UserId,
        IsApproved,
        Description,
        TotalAmount,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000006_create_kitchen_order_items_table {
    use super::decimal_column;
    use super::m20240601_000004_create_kitchen_stock_table::KitchenStock;
    use super::m20240601_000005_create_kitchen_orders_table::KitchenOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000006_create_kitchen_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(KitchenOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(KitchenOrderItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(KitchenOrderItems::KitchenOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitchenOrderItems::KitchenStockId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            decimal_column(manager, KitchenOrderItems::Quantity)
                                .not_null(),
                        )
                        .col(
                            decimal_column(manager, KitchenOrderItems::UnitPrice)
                                .not_null(),
                        )
                        .col(
                            decimal_column(manager, KitchenOrderItems::TotalPrice)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitchenOrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(KitchenOrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_kitchen_order_items_order")
                                .from(KitchenOrderItems::Table, KitchenOrderItems::KitchenOrderId)
                                .to(KitchenOrders::Table, KitchenOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_kitchen_order_items_stock")
                                .from(KitchenOrderItems::Table, KitchenOrderItems::KitchenStockId)
                                .to(KitchenStock::Table, KitchenStock::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_kitchen_order_items_order_id")
                        .table(KitchenOrderItems::Table)
                        .col(KitchenOrderItems::KitchenOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(KitchenOrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum KitchenOrderItems {
        Table,
        Id,
        KitchenOrderId,
        KitchenStockId,
        Quantity,
        UnitPrice,
        TotalPrice,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000007_create_activity_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000007_create_activity_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ActivityLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ActivityLogs::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ActivityLogs::Action).string().not_null())
                        .col(ColumnDef::new(ActivityLogs::SubjectType).string().not_null())
                        .col(ColumnDef::new(ActivityLogs::SubjectId).uuid().null())
                        .col(ColumnDef::new(ActivityLogs::Description).text().not_null())
                        .col(
                            ColumnDef::new(ActivityLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Retention sweeps delete by age
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_activity_logs_created_at")
                        .table(ActivityLogs::Table)
                        .col(ActivityLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ActivityLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ActivityLogs {
        Table,
        Id,
        Action,
        SubjectType,
        SubjectId,
        Description,
        CreatedAt,
    }
}
