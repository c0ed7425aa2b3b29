use db_migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub use sea_orm::DbErr;

pub mod entities;
pub mod models;

#[derive(Clone)]
pub struct DbService {
    pub conn: DatabaseConnection,
}

impl DbService {
    /// Connects to the database named by `database_url` and brings the
    /// schema up to date.
    pub async fn connect(database_url: &str) -> Result<DbService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        // Sqlite in-memory databases exist per connection, so the pool must
        // not fan out across several of them.
        if database_url.contains(":memory:") {
            options.max_connections(1);
        } else {
            options.max_connections(5);
        }
        options.sqlx_logging(false);

        let conn = Database::connect(options).await?;
        Migrator::up(&conn, None).await?;
        Ok(DbService { conn })
    }

    /// Releases the underlying connection pool. Called once during graceful
    /// shutdown.
    pub async fn close(self) -> Result<(), DbErr> {
        self.conn.close().await
    }
}
