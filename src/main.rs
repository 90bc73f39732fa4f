//! # vitiscrap CLI
//!
//! ## Usage
//!
//! ```bash
//! vitiscrap --config ./config/vitiscrap.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vitiscrap init` | Create the SQLite database and run schema migrations |
//! | `vitiscrap serve` | Start the HTTP API server |
//! | `vitiscrap user add` | Register a user from the command line |
//! | `vitiscrap fetch` | Retrieve one table and print it as JSON |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use vitiscrap::auth::AuthService;
use vitiscrap::config::{self, Config};
use vitiscrap::scrape::Retriever;
use vitiscrap::store::{SqliteStore, Store};
use vitiscrap::{db, migrate, params, server};

/// vitiscrap: authenticated API over the Embrapa Vitibrasil tables.
#[derive(Parser)]
#[command(
    name = "vitiscrap",
    about = "Authenticated API over the Embrapa Vitibrasil statistics tables",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vitiscrap.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `usuarios` and
    /// `tabelas_scrap` tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Retrieve one table (scrape, or local backup if the site is down)
    /// and print it as JSON.
    Fetch {
        /// Year, 1970–2024.
        #[arg(long)]
        ano: Option<String>,

        /// Category name (e.g. `Produção`) or code (`02`–`06`).
        #[arg(long)]
        opcao: Option<String>,

        /// Subcategory name (e.g. `Espumantes`) or code.
        #[arg(long)]
        subopcao: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a new user.
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: String,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let pool = db::connect(cfg).await?;
    migrate::apply_schema(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

async fn run_add_user(cfg: &Config, username: &str, password: &str, email: &str) -> anyhow::Result<()> {
    let auth = AuthService::from_config(open_store(cfg).await?, cfg);
    match auth.register(username, password, email).await {
        Ok(identity) => {
            println!("created user {} (id {})", identity.username, identity.id);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_fetch(
    cfg: &Config,
    ano: Option<&str>,
    opcao: Option<&str>,
    subopcao: Option<&str>,
) -> anyhow::Result<()> {
    let result = match params::resolve(ano, opcao, subopcao) {
        Ok(key) => {
            let retriever = Retriever::from_config(cfg, open_store(cfg).await?)?;
            retriever.retrieve(&key).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(table) => {
            let json = serde_json::to_string_pretty(&table).context("serializing table")?;
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::User { action } => match action {
            UserAction::Add {
                username,
                password,
                email,
            } => {
                run_add_user(&cfg, &username, &password, &email).await?;
            }
        },
        Commands::Fetch {
            ano,
            opcao,
            subopcao,
        } => {
            run_fetch(&cfg, ano.as_deref(), opcao.as_deref(), subopcao.as_deref()).await?;
        }
    }

    Ok(())
}
