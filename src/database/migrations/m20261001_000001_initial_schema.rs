use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_episodes_table(manager).await?;
        self.create_job_definitions_table(manager).await?;
        self.create_job_executions_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobExecutions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JobDefinitions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Episodes::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    /// Timestamps are native on Postgres/MySQL and RFC 3339 text on SQLite
    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = self.create_nullable_timestamp_column(manager, column);
        col.not_null();
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            sea_orm::DatabaseBackend::MySql => col.timestamp(),
            _ => col.string(),
        };
        col
    }

    async fn create_episodes_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Episodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Episodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Episodes::Guid).string().not_null())
                    .col(ColumnDef::new(Episodes::Title).string().not_null())
                    .col(ColumnDef::new(Episodes::Description).text().not_null())
                    .col(ColumnDef::new(Episodes::Link).string().not_null())
                    .col(ColumnDef::new(Episodes::Image).string().not_null())
                    .col(ColumnDef::new(Episodes::PodcastName).string().not_null())
                    .col(self.create_timestamp_column(manager, Episodes::PubDate))
                    .col(self.create_timestamp_column(manager, Episodes::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_job_definitions_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobDefinitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobDefinitions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobDefinitions::Trigger).text().not_null())
                    .col(ColumnDef::new(JobDefinitions::Work).text().not_null())
                    .col(
                        ColumnDef::new(JobDefinitions::MaxInstances)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(self.create_nullable_timestamp_column(manager, JobDefinitions::NextRunAt))
                    .col(self.create_timestamp_column(manager, JobDefinitions::CreatedAt))
                    .col(self.create_timestamp_column(manager, JobDefinitions::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_job_executions_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobExecutions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobExecutions::JobId).string().not_null())
                    .col(ColumnDef::new(JobExecutions::Status).string().not_null())
                    .col(self.create_timestamp_column(manager, JobExecutions::StartedAt))
                    .col(self.create_nullable_timestamp_column(manager, JobExecutions::FinishedAt))
                    .col(ColumnDef::new(JobExecutions::DurationMs).big_integer())
                    .col(ColumnDef::new(JobExecutions::Detail).text())
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_episodes_guid")
                    .table(Episodes::Table)
                    .col(Episodes::Guid)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_job_executions_job_id")
                    .table(JobExecutions::Table)
                    .col(JobExecutions::JobId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_job_executions_finished_at")
                    .table(JobExecutions::Table)
                    .col(JobExecutions::FinishedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Episodes {
    Table,
    Id,
    Guid,
    Title,
    Description,
    Link,
    Image,
    PodcastName,
    PubDate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum JobDefinitions {
    Table,
    Id,
    Trigger,
    Work,
    MaxInstances,
    NextRunAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum JobExecutions {
    Table,
    Id,
    JobId,
    Status,
    StartedAt,
    FinishedAt,
    DurationMs,
    Detail,
}
