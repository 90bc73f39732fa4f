//! # vitiscrap
//!
//! Authenticated HTTP API over the statistics tables of the Embrapa
//! Vitibrasil site, with a local SQLite backup served when the site is down.
//!
//! ## Architecture
//!
//! ```text
//!   client ──▶ token check ──▶ params ──▶ Retriever ──▶ Vitibrasil (HTTP)
//!                 │                          │
//!                 ▼                          ▼ first success / fallback
//!            AuthService ───────────────▶  Store (SQLite)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vitiscrap init                                   # create database
//! vitiscrap user add --username ana --password senha123 --email ana@x.com
//! vitiscrap serve                                  # start HTTP server
//! vitiscrap fetch --ano 2022 --opcao Exportação --subopcao Espumantes
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Case/accent-insensitive text matching |
//! | [`params`] | Category/subcategory mapping and validation |
//! | [`auth`] | Password hashing, registration, access tokens |
//! | [`scrape`] | Scrape-or-fallback retrieval engine |
//! | [`store`] | Storage trait with SQLite and in-memory backends |
//! | [`error`] | Error taxonomy |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod params;
pub mod scrape;
pub mod server;
pub mod store;
