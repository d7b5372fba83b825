use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Term table plus the pivot that links it to tools
struct Taxonomy {
    table: &'static str,
    pivot: &'static str,
    foreign_key: &'static str,
}

const TAXONOMIES: [Taxonomy; 3] = [
    Taxonomy {
        table: "categories",
        pivot: "tool_categories",
        foreign_key: "category_id",
    },
    Taxonomy {
        table: "alternatives",
        pivot: "tool_alternatives",
        foreign_key: "alternative_id",
    },
    Taxonomy {
        table: "stacks",
        pivot: "tool_stacks",
        foreign_key: "stack_id",
    },
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for taxonomy in &TAXONOMIES {
            let table = Alias::new(taxonomy.table);
            let pivot = Alias::new(taxonomy.pivot);
            let foreign_key = Alias::new(taxonomy.foreign_key);

            manager
                .create_table(
                    Table::create()
                        .table(table.clone())
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Term::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Term::Name).string().not_null())
                        .col(ColumnDef::new(Term::Slug).string().not_null().unique_key())
                        .col(
                            ColumnDef::new(Term::CreatedAt)
                                .timestamp()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(Term::UpdatedAt)
                                .timestamp()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(pivot.clone())
                        .if_not_exists()
                        .col(ColumnDef::new(Pivot::ToolId).big_integer().not_null())
                        .col(ColumnDef::new(foreign_key.clone()).big_integer().not_null())
                        .primary_key(Index::create().col(Pivot::ToolId).col(foreign_key.clone()))
                        .foreign_key(
                            ForeignKey::create()
                                .from(pivot.clone(), Pivot::ToolId)
                                .to(Tools::Table, Tools::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(pivot.clone(), foreign_key.clone())
                                .to(table.clone(), Term::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for taxonomy in TAXONOMIES.iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(taxonomy.pivot)).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Alias::new(taxonomy.table)).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Term {
    Id,
    Name,
    Slug,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Pivot {
    ToolId,
}

#[derive(DeriveIden)]
enum Tools {
    Table,
    Id,
}
