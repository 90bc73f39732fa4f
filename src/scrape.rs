//! Retrieval engine: scrape a Vitibrasil table, falling back to the local
//! backup when the site cannot be reached.
//!
//! # Flow
//!
//! ```text
//! build_url ─▶ fetch ─┬─ ok ──▶ parse_tables ─▶ insert_table_if_absent ─▶ fresh table
//!                     │            │
//!                     │            └─ no table ─▶ NotFound (no fallback)
//!                     └─ transport error / non-2xx / timeout
//!                                  ─▶ get_table ─┬─ found ─▶ backup, "fonte" annotated
//!                                                └─ absent ─▶ ServiceUnavailable
//! ```
//!
//! Backups are written once per key: a later successful scrape of the same
//! key is returned to the caller but never replaces the stored copy.
//! Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Row, ScrapedTable, TableKey};
use crate::store::Store;

/// CSS selector for the data tables on a Vitibrasil page.
pub const TABLE_SELECTOR: &str = "table.tb_base.tb_dados";

/// Appended to `fonte` when a response is served from the local backup.
pub const BACKUP_SUFFIX: &str = " (backup local)";

/// Failure to obtain a page body. Every variant routes to the fallback path.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connection, TLS or body read failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// No response within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },
}

impl FetchError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Fetches the body of a page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// [`Fetcher`] over HTTP with a bounded per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vitiscrap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}

/// Builds the page URL for `key`.
pub fn build_url(base_url: &str, key: &TableKey) -> String {
    format!(
        "{}?ano={}&opcao=opt_{}&subopcao=subopt_{}",
        base_url, key.year, key.category, key.subcategory
    )
}

fn selector(css: &str) -> Result<Selector, ApiError> {
    Selector::parse(css).map_err(|e| ApiError::internal(anyhow!("invalid selector {}: {}", css, e)))
}

/// Text of an element with each text node trimmed, joined without separators.
fn cell_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

/// Extracts rows from every data table in `html`, in document order.
///
/// For each table the `th` texts are the column names; each later `tr`
/// with at least one `td` becomes a row zipped against those names.
pub fn parse_tables(html: &str) -> Result<Vec<Row>, ApiError> {
    let table_sel = selector(TABLE_SELECTOR)?;
    let th_sel = selector("th")?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;

    let document = Html::parse_document(html);
    let tables: Vec<ElementRef<'_>> = document.select(&table_sel).collect();
    if tables.is_empty() {
        return Err(ApiError::NotFound(
            "table not found on the Embrapa site".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for table in tables {
        let headers: Vec<String> = table.select(&th_sel).map(cell_text).collect();
        for tr in table.select(&tr_sel).skip(1) {
            let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
            if cells.is_empty() {
                continue;
            }
            let mut row = Row::new();
            for (header, cell) in headers.iter().zip(cells) {
                row.insert(header.clone(), serde_json::Value::String(cell));
            }
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Scrape-or-fallback retrieval over an injected fetcher and store.
pub struct Retriever {
    base_url: String,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
}

impl Retriever {
    pub fn new(base_url: impl Into<String>, fetcher: Arc<dyn Fetcher>, store: Arc<dyn Store>) -> Self {
        Self {
            base_url: base_url.into(),
            fetcher,
            store,
        }
    }

    /// Production retriever: HTTP fetcher with the configured timeout.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.scrape.timeout_secs))?;
        Ok(Self::new(&config.scrape.base_url, Arc::new(fetcher), store))
    }

    pub async fn retrieve(&self, key: &TableKey) -> Result<ScrapedTable, ApiError> {
        let url = build_url(&self.base_url, key);

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(err) => return self.fallback(key, err).await,
        };

        let rows = parse_tables(&html)?;
        let table = ScrapedTable::new(url, key, rows);

        let inserted = self
            .store
            .insert_table_if_absent(&table)
            .await
            .map_err(ApiError::internal)?;
        if inserted {
            tracing::info!(%key, rows = table.rows.len(), "stored first backup");
        }

        Ok(table)
    }

    async fn fallback(&self, key: &TableKey, cause: FetchError) -> Result<ScrapedTable, ApiError> {
        tracing::warn!(%key, error = %cause, "fetch failed, trying local backup");

        match self.store.get_table(key).await.map_err(ApiError::internal)? {
            Some(mut table) => {
                table.source_url.push_str(BACKUP_SUFFIX);
                tracing::info!(%key, "served local backup");
                Ok(table)
            }
            None => Err(ApiError::ServiceUnavailable(
                "Embrapa site is unreachable and there is no local backup".to_string(),
            )),
        }
    }
}
