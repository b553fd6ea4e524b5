use sea_orm_migration::prelude::*;

/// Columns that older databases may lack. Each one is added only when missing
/// so the migration is safe on databases that gained them by hand.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let task_columns = [
            (
                "deadline_timestamp",
                ColumnDef::new(Tasks::DeadlineTimestamp)
                    .big_integer()
                    .to_owned(),
            ),
            (
                "is_recurring",
                ColumnDef::new(Tasks::IsRecurring)
                    .boolean()
                    .not_null()
                    .default(false)
                    .to_owned(),
            ),
            (
                "assets_link",
                ColumnDef::new(Tasks::AssetsLink).text().to_owned(),
            ),
            (
                "public_uuid",
                ColumnDef::new(Tasks::PublicUuid).string_len(36).to_owned(),
            ),
            (
                "uptime_status",
                ColumnDef::new(Tasks::UptimeStatus).string_len(8).to_owned(),
            ),
        ];
        for (name, mut column) in task_columns {
            if !manager.has_column("tasks", name).await? {
                manager
                    .alter_table(
                        Table::alter()
                            .table(Tasks::Table)
                            .add_column(&mut column)
                            .to_owned(),
                    )
                    .await?;
            }
        }

        // SQLite cannot add a UNIQUE column in place, so uniqueness lives in
        // separate indexes.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_public_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::PublicUuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let user_columns = [
            (
                "username",
                ColumnDef::new(Users::Username).string().to_owned(),
            ),
            (
                "avatar_url",
                ColumnDef::new(Users::AvatarUrl).text().to_owned(),
            ),
        ];
        for (name, mut column) in user_columns {
            if !manager.has_column("users", name).await? {
                manager
                    .alter_table(
                        Table::alter()
                            .table(Users::Table)
                            .add_column(&mut column)
                            .to_owned(),
                    )
                    .await?;
            }
        }

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_username")
                    .table(Users::Table)
                    .col(Users::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_users_username")
                    .table(Users::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_tasks_public_uuid")
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await?;

        for column in [Users::AvatarUrl, Users::Username] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Users::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }
        for column in [
            Tasks::UptimeStatus,
            Tasks::PublicUuid,
            Tasks::AssetsLink,
            Tasks::IsRecurring,
            Tasks::DeadlineTimestamp,
        ] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Tasks::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(Iden)]
enum Tasks {
    Table,
    DeadlineTimestamp,
    IsRecurring,
    AssetsLink,
    PublicUuid,
    UptimeStatus,
}

#[derive(Iden)]
enum Users {
    Table,
    Username,
    AvatarUrl,
}
