use sqlx::Row;

#[tokio::test]
async fn migrations_apply_and_tables_exist() -> anyhow::Result<()> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    let migrations_dir =
        std::env::var("QUIZCHECK_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir)).await?;
    migrator.run(&pool).await?;

    for table in ["users"] {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(&pool)
            .await?;
        let name: Option<String> = row.map(|row| row.try_get(0)).transpose()?;
        assert!(name.is_some(), "expected table {table} to exist after migrations");
    }

    // A second run is a no-op.
    migrator.run(&pool).await?;

    Ok(())
}

#[tokio::test]
async fn user_type_is_constrained() -> anyhow::Result<()> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new("migrations")).await?;
    migrator.run(&pool).await?;

    let result = sqlx::query(
        "INSERT INTO users (id, user_type, last_name, first_name, login, hashed_password,
                            created_at, updated_at)
         VALUES ('1', 'guest', 'L', 'F', 'lf', 'x', '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());

    Ok(())
}
