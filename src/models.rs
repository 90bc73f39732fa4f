//! Core data models.
//!
//! [`ScrapedTable`] serializes with the Portuguese field names the API
//! returns (`fonte`, `ano`, `opcao`, `subopcao`, `tabela`).

use serde::{Deserialize, Serialize};

/// One table row: column header → cell text, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Identity of a scraped table: `(ano, opcao, subopcao)`, all in the
/// site's canonical code form (e.g. `("2023", "03", "01")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub year: String,
    pub category: String,
    pub subcategory: String,
}

impl TableKey {
    pub fn new(
        year: impl Into<String>,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            year: year.into(),
            category: category.into(),
            subcategory: subcategory.into(),
        }
    }
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ano={} opcao={} subopcao={}",
            self.year, self.category, self.subcategory
        )
    }
}

/// A retrieved statistics table, as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedTable {
    #[serde(rename = "fonte")]
    pub source_url: String,
    #[serde(rename = "ano")]
    pub year: String,
    #[serde(rename = "opcao")]
    pub category: String,
    #[serde(rename = "subopcao")]
    pub subcategory: String,
    #[serde(rename = "tabela")]
    pub rows: Vec<Row>,
}

impl ScrapedTable {
    pub fn new(source_url: impl Into<String>, key: &TableKey, rows: Vec<Row>) -> Self {
        Self {
            source_url: source_url.into(),
            year: key.year.clone(),
            category: key.category.clone(),
            subcategory: key.subcategory.clone(),
            rows,
        }
    }

    pub fn key(&self) -> TableKey {
        TableKey::new(&self.year, &self.category, &self.subcategory)
    }
}

/// A stored user record. `password_hash` is a PHC string, never plaintext.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

/// Input for creating a [`Credential`]; the hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

/// Public view of a user, returned on registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&Credential> for Identity {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id,
            username: c.username.clone(),
            email: c.email.clone(),
        }
    }
}
