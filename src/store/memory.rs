//! In-memory [`Store`] implementation backing unit and router tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Each write holds
//! the write guard across its existence check, which makes check-then-insert
//! atomic.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Credential, NewCredential, ScrapedTable, TableKey};

use super::{CredentialInsert, Store};

/// In-memory store.
pub struct InMemoryStore {
    tables: RwLock<HashMap<TableKey, ScrapedTable>>,
    credentials: RwLock<Vec<Credential>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            credentials: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored tables.
    pub fn table_count(&self) -> usize {
        self.tables.read().unwrap().len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_table(&self, key: &TableKey) -> Result<Option<ScrapedTable>> {
        Ok(self.tables.read().unwrap().get(key).cloned())
    }

    async fn insert_table_if_absent(&self, table: &ScrapedTable) -> Result<bool> {
        let mut tables = self.tables.write().unwrap();
        let key = table.key();
        if tables.contains_key(&key) {
            return Ok(false);
        }
        tables.insert(key, table.clone());
        Ok(true)
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .iter()
            .find(|c| c.username == username)
            .cloned())
    }

    async fn insert_credential(&self, new: &NewCredential) -> Result<CredentialInsert> {
        let mut creds = self.credentials.write().unwrap();
        if creds
            .iter()
            .any(|c| c.username == new.username || c.email == new.email)
        {
            return Ok(CredentialInsert::Conflict);
        }
        let cred = Credential {
            id: creds.len() as i64 + 1,
            username: new.username.clone(),
            password_hash: new.password_hash.clone(),
            email: new.email.clone(),
        };
        creds.push(cred.clone());
        Ok(CredentialInsert::Created(cred))
    }
}
