use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tools::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tools::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tools::Name).string().not_null())
                    .col(ColumnDef::new(Tools::Slug).string().not_null().unique_key())
                    .col(ColumnDef::new(Tools::WebsiteUrl).string().not_null())
                    .col(ColumnDef::new(Tools::RepositoryUrl).string().not_null())
                    .col(ColumnDef::new(Tools::Tagline).string().null())
                    .col(ColumnDef::new(Tools::Description).text().null())
                    .col(ColumnDef::new(Tools::Content).text().null())
                    .col(ColumnDef::new(Tools::SubmitterName).string().null())
                    .col(ColumnDef::new(Tools::SubmitterEmail).string().null())
                    .col(
                        ColumnDef::new(Tools::Status)
                            .string()
                            .not_null()
                            .default("Draft"),
                    )
                    .col(ColumnDef::new(Tools::PublishedAt).timestamp().null())
                    .col(
                        ColumnDef::new(Tools::IsFeatured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Tools::Stars).big_integer().null())
                    .col(ColumnDef::new(Tools::Forks).big_integer().null())
                    .col(ColumnDef::new(Tools::Score).big_integer().null())
                    .col(ColumnDef::new(Tools::License).string().null())
                    .col(ColumnDef::new(Tools::FirstCommitDate).timestamp().null())
                    .col(ColumnDef::new(Tools::LastCommitDate).timestamp().null())
                    .col(ColumnDef::new(Tools::FaviconUrl).string().null())
                    .col(ColumnDef::new(Tools::ScreenshotUrl).string().null())
                    .col(
                        ColumnDef::new(Tools::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tools::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The publish sweep filters on both columns
        manager
            .create_index(
                Index::create()
                    .name("idx_tools_status_published_at")
                    .table(Tools::Table)
                    .col(Tools::Status)
                    .col(Tools::PublishedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tools::Table).to_owned())
            .await
    }
}

/// Table and column identifiers for tools
#[derive(DeriveIden)]
enum Tools {
    Table,
    Id,
    Name,
    Slug,
    WebsiteUrl,
    RepositoryUrl,
    Tagline,
    Description,
    Content,
    SubmitterName,
    SubmitterEmail,
    Status,
    PublishedAt,
    IsFeatured,
    Stars,
    Forks,
    Score,
    License,
    FirstCommitDate,
    LastCommitDate,
    FaviconUrl,
    ScreenshotUrl,
    CreatedAt,
    UpdatedAt,
}
