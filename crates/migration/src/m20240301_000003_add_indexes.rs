use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Review: listing by service, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_review_service_created")
                    .table(Review::Table)
                    .col(Review::ServiceId)
                    .col(Review::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Review: index on author_id
        manager
            .create_index(
                Index::create()
                    .name("idx_review_author")
                    .table(Review::Table)
                    .col(Review::AuthorId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_review_author").table(Review::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_review_service_created").table(Review::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Review { Table, ServiceId, AuthorId, CreatedAt }
