use agrotoken_engine::{run_migrations, SqliteDatabase};
use sqlx::{migrate::MigrateDatabase, Sqlite};

/// Creates a throwaway SQLite database with the full schema applied.
pub async fn prepare_test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = format!("sqlite://{}/agt_srv_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
    let _ = Sqlite::drop_database(&url).await;
    Sqlite::create_database(&url).await.expect("Error creating test database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database");
    run_migrations(db.pool()).await.expect("Error running DB migrations");
    db
}
