use sqlx::SqlitePool;

/// Round-trips to the database and reports the engine version.
pub(crate) async fn ping(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT sqlite_version()").fetch_one(pool).await
}
