//! Create `review` table with FK to `user`.
//! `images` holds the ordered list of object-store references as a JSON array.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(uuid(Review::Id).primary_key())
                    .col(uuid(Review::AuthorId).not_null())
                    .col(uuid(Review::ServiceId).not_null())
                    .col(small_integer(Review::Rating).not_null())
                    .col(text(Review::Comment).not_null().default(""))
                    .col(json_binary(Review::Images).not_null())
                    .col(timestamp_with_time_zone(Review::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Review::UpdatedAt).not_null())
                    .check(Expr::col(Review::Rating).between(1, 5))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_author")
                            .from(Review::Table, Review::AuthorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Review::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    AuthorId,
    ServiceId,
    Rating,
    Comment,
    Images,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum User { Table, Id }
