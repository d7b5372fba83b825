pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_tools_table;
mod m20240601_000002_create_terms_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        let mut migrations = kit::workflow::migration::migrations();
        migrations.push(Box::new(m20240601_000001_create_tools_table::Migration));
        migrations.push(Box::new(m20240601_000002_create_terms_tables::Migration));
        migrations
    }
}
