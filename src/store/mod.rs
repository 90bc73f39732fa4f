//! Storage abstraction for scraped-table backups and user credentials.
//!
//! The [`Store`] trait is the only way the retrieval engine and the auth
//! service touch persistent state, so both can be exercised against
//! [`InMemoryStore`] in tests and [`SqliteStore`] in production.
//!
//! Implementations must be `Send + Sync` and make each write atomic per key:
//! two concurrent [`insert_table_if_absent`](Store::insert_table_if_absent)
//! calls for one key leave exactly one stored table, and two concurrent
//! registrations of one username or email leave exactly one credential.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Credential, NewCredential, ScrapedTable, TableKey};

/// Outcome of [`Store::insert_credential`].
#[derive(Debug, Clone)]
pub enum CredentialInsert {
    Created(Credential),
    /// A record with the same username or email already exists.
    Conflict,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_table`](Store::get_table) | Look up the backup for a key |
/// | [`insert_table_if_absent`](Store::insert_table_if_absent) | Write-once table insert |
/// | [`find_credential`](Store::find_credential) | Look up a user by name |
/// | [`insert_credential`](Store::insert_credential) | Create a user, rejecting duplicates |
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the stored table for `key`, if any.
    async fn get_table(&self, key: &TableKey) -> Result<Option<ScrapedTable>>;

    /// Stores `table` unless one already exists for its key.
    ///
    /// Returns `true` if this call wrote the row. Existing rows are never
    /// modified.
    async fn insert_table_if_absent(&self, table: &ScrapedTable) -> Result<bool>;

    /// Returns the credential with this exact username, if any.
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>>;

    /// Creates a credential unless the username or email is taken.
    async fn insert_credential(&self, new: &NewCredential) -> Result<CredentialInsert>;
}
