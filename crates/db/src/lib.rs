use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use utils_core::assets::database_path;

pub mod entities;
pub mod models;
mod retry;

pub use retry::is_unique_violation;
pub use sea_orm::{DbErr, TransactionTrait};

pub type DbPool = DatabaseConnection;

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

impl DBService {
    /// Opens the default database file under the asset directory.
    pub async fn new() -> Result<DBService, DbErr> {
        let path = database_path().map_err(|err| DbErr::Custom(err.to_string()))?;
        let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    pub async fn connect(database_url: &str) -> Result<DBService, DbErr> {
        let in_memory = database_url.contains(":memory:");
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false);
        // Every pooled connection to `:memory:` would be a separate database.
        options.max_connections(if in_memory { 1 } else { 5 });

        let pool = Database::connect(options).await?;
        pool.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
        pool.execute_unprepared("PRAGMA busy_timeout = 5000;").await?;
        if !in_memory {
            pool.execute_unprepared("PRAGMA journal_mode = WAL;").await?;
            pool.execute_unprepared("PRAGMA synchronous = NORMAL;").await?;
        }

        db_migration::Migrator::up(&pool, None).await?;
        tracing::info!("database ready");
        Ok(DBService { pool })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectionTrait, Statement};

    use super::*;

    #[tokio::test]
    async fn connect_runs_migrations_and_is_idempotent() {
        let service = DBService::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&service.pool, None).await.unwrap();

        let row = service
            .pool
            .query_one_raw(Statement::from_string(
                service.pool.get_database_backend(),
                "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('users', 'tasks', 'subtasks', 'activity_log')",
            ))
            .await
            .unwrap()
            .unwrap();
        let count: i64 = row.try_get("", "n").unwrap();
        assert_eq!(count, 4);
    }
}
