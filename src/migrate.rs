use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Registered users
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usuarios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            usuario TEXT NOT NULL UNIQUE,
            senha_hash TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Write-once backup of scraped tables, one row per (ano, opcao, subopcao)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tabelas_scrap (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fonte TEXT NOT NULL,
            ano TEXT NOT NULL,
            opcao TEXT NOT NULL,
            subopcao TEXT NOT NULL,
            tabela TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(ano, opcao, subopcao)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
