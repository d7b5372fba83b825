//! Migrations for the execution queue and step memo
//!
//! Include them in the application migrator:
//!
//! ```rust,ignore
//! fn migrations() -> Vec<Box<dyn MigrationTrait>> {
//!     let mut migrations = openalt_kit::workflow::migration::migrations();
//!     migrations.push(Box::new(m20240601_000001_create_tools_table::Migration));
//!     migrations
//! }
//! ```

use sea_orm_migration::prelude::*;

pub fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
        Box::new(CreateWorkflowExecutionsTable),
        Box::new(CreateWorkflowStepsTable),
    ]
}

pub struct CreateWorkflowExecutionsTable;

impl MigrationName for CreateWorkflowExecutionsTable {
    fn name(&self) -> &str {
        "m20240101_000001_create_workflow_executions_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateWorkflowExecutionsTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkflowExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowExecutions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkflowExecutions::Name).string().not_null())
                    .col(
                        ColumnDef::new(WorkflowExecutions::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WorkflowExecutions::Status).string().not_null())
                    .col(ColumnDef::new(WorkflowExecutions::Input).text().not_null())
                    .col(ColumnDef::new(WorkflowExecutions::Output).text().null())
                    .col(ColumnDef::new(WorkflowExecutions::Error).text().null())
                    .col(ColumnDef::new(WorkflowExecutions::Attempts).integer().not_null())
                    .col(
                        ColumnDef::new(WorkflowExecutions::MaxAttempts)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WorkflowExecutions::NextRunAt).timestamp().null())
                    .col(ColumnDef::new(WorkflowExecutions::LockedUntil).timestamp().null())
                    .col(ColumnDef::new(WorkflowExecutions::WorkerId).string().null())
                    .col(
                        ColumnDef::new(WorkflowExecutions::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WorkflowExecutions::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(WorkflowExecutions::StartedAt).timestamp().null())
                    .col(ColumnDef::new(WorkflowExecutions::CompletedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_executions_status")
                    .table(WorkflowExecutions::Table)
                    .col(WorkflowExecutions::Status)
                    .col(WorkflowExecutions::NextRunAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_executions_key")
                    .table(WorkflowExecutions::Table)
                    .col(WorkflowExecutions::Name)
                    .col(WorkflowExecutions::IdempotencyKey)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkflowExecutions::Table).to_owned())
            .await
    }
}

pub struct CreateWorkflowStepsTable;

impl MigrationName for CreateWorkflowStepsTable {
    fn name(&self) -> &str {
        "m20240101_000002_create_workflow_steps_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateWorkflowStepsTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkflowSteps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowSteps::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WorkflowSteps::ExecutionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WorkflowSteps::StepName).string().not_null())
                    .col(ColumnDef::new(WorkflowSteps::Status).string().not_null())
                    .col(ColumnDef::new(WorkflowSteps::Output).text().null())
                    .col(ColumnDef::new(WorkflowSteps::Error).text().null())
                    .col(
                        ColumnDef::new(WorkflowSteps::Retriable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WorkflowSteps::Attempts).integer().not_null())
                    .col(
                        ColumnDef::new(WorkflowSteps::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WorkflowSteps::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_steps_unique")
                    .table(WorkflowSteps::Table)
                    .col(WorkflowSteps::ExecutionId)
                    .col(WorkflowSteps::StepName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkflowSteps::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WorkflowExecutions {
    Table,
    Id,
    Name,
    IdempotencyKey,
    Status,
    Input,
    Output,
    Error,
    Attempts,
    MaxAttempts,
    NextRunAt,
    LockedUntil,
    WorkerId,
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum WorkflowSteps {
    Table,
    Id,
    ExecutionId,
    StepName,
    Status,
    Output,
    Error,
    Retriable,
    Attempts,
    CreatedAt,
    UpdatedAt,
}
