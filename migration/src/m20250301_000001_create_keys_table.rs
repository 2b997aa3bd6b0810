use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Keys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Keys::Key)
                            .string_len(512)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Keys::Balance).integer().not_null())
                    .col(ColumnDef::new(Keys::UsedAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Keys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 选择排序索引：created_at DESC, used_at ASC, balance DESC
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_keys_selection_order")
                    .table(Keys::Table)
                    .col((Keys::CreatedAt, IndexOrder::Desc))
                    .col((Keys::UsedAt, IndexOrder::Asc))
                    .col((Keys::Balance, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_keys_selection_order")
                    .table(Keys::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Keys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Keys {
    Table,
    Key,
    Balance,
    UsedAt,
    CreatedAt,
}
