use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per account; the entitlement columns are merged in by the verifier
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(string(Users::Id).primary_key())
                    .col(string_null(Users::DisplayName))
                    .col(boolean(Users::IsPro).default(false).not_null())
                    .col(timestamp_with_time_zone_null(Users::ProExpiry))
                    .col(string_null(Users::LastSubscriptionId))
                    .col(
                        timestamp_with_time_zone_null(Users::LastVerified)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_pro_expiry")
                    .table(Users::Table)
                    .col(Users::ProExpiry)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    DisplayName,
    IsPro,
    ProExpiry,
    LastSubscriptionId,
    LastVerified,
    CreatedAt,
}
