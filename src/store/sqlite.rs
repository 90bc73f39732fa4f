//! SQLite-backed [`Store`] implementation.
//!
//! Write-once semantics come from the schema's UNIQUE constraints (see
//! [`crate::migrate`]); the queries here never update an existing row.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row as _, SqlitePool};

use crate::models::{Credential, NewCredential, Row, ScrapedTable, TableKey};

use super::{CredentialInsert, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_table(&self, key: &TableKey) -> Result<Option<ScrapedTable>> {
        let row = sqlx::query(
            "SELECT fonte, ano, opcao, subopcao, tabela FROM tabelas_scrap WHERE ano = ? AND opcao = ? AND subopcao = ?",
        )
        .bind(&key.year)
        .bind(&key.category)
        .bind(&key.subcategory)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tabela: String = row.get("tabela");
        let rows: Vec<Row> = serde_json::from_str(&tabela)
            .with_context(|| format!("corrupt stored table for {}", key))?;

        Ok(Some(ScrapedTable {
            source_url: row.get("fonte"),
            year: row.get("ano"),
            category: row.get("opcao"),
            subcategory: row.get("subopcao"),
            rows,
        }))
    }

    async fn insert_table_if_absent(&self, table: &ScrapedTable) -> Result<bool> {
        let tabela = serde_json::to_string(&table.rows)?;
        let result = sqlx::query(
            r#"
            INSERT INTO tabelas_scrap (fonte, ano, opcao, subopcao, tabela, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(ano, opcao, subopcao) DO NOTHING
            "#,
        )
        .bind(&table.source_url)
        .bind(&table.year)
        .bind(&table.category)
        .bind(&table.subcategory)
        .bind(&tabela)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>> {
        let row = sqlx::query("SELECT id, usuario, senha_hash, email FROM usuarios WHERE usuario = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Credential {
            id: r.get("id"),
            username: r.get("usuario"),
            password_hash: r.get("senha_hash"),
            email: r.get("email"),
        }))
    }

    async fn insert_credential(&self, new: &NewCredential) -> Result<CredentialInsert> {
        let taken: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM usuarios WHERE usuario = ? OR email = ?")
                .bind(&new.username)
                .bind(&new.email)
                .fetch_one(&self.pool)
                .await?;
        if taken {
            return Ok(CredentialInsert::Conflict);
        }

        // A concurrent registration can still win between the check and the
        // insert; the UNIQUE constraints catch that case.
        let result =
            sqlx::query("INSERT INTO usuarios (usuario, senha_hash, email) VALUES (?, ?, ?)")
                .bind(&new.username)
                .bind(&new.password_hash)
                .bind(&new.email)
                .execute(&self.pool)
                .await;

        match result {
            Ok(done) => Ok(CredentialInsert::Created(Credential {
                id: done.last_insert_rowid(),
                username: new.username.clone(),
                password_hash: new.password_hash.clone(),
                email: new.email.clone(),
            })),
            Err(e) if is_unique_violation(&e) => Ok(CredentialInsert::Conflict),
            Err(e) => Err(e.into()),
        }
    }
}
