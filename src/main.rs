//! Zipcodes CLI - serve the postal code API and manage its database

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use zipcodes::auth;
use zipcodes::config::{self, ZipcodesConfig};
use zipcodes::import;
use zipcodes::server::{self, ServerOptions};
use zipcodes::storage::SqliteStore;
use zipcodes::ui::{self, report};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "zipcodes")]
#[command(version)]
#[command(about = "County / place / postal code registry with a token-protected REST API")]
#[command(long_about = r#"
Zipcodes serves a three-level geographic hierarchy over HTTP:
  • counties, places and postal codes with full CRUD
  • postal code writes resolve county and place by name
  • writes require a bearer token issued from this CLI

Example usage:
  zipcodes init
  zipcodes import --file postal_codes.csv
  zipcodes token issue --name frontend
  zipcodes serve --port 8080
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Allow cross-origin requests from anywhere
        #[arg(long)]
        cors: bool,
    },

    /// Write a starter config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Import postal codes from a CSV file (postal_code,place_name,county_name)
    Import {
        /// CSV file with a header line
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Show row counts
    Stats,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Issue a new token (printed once)
    Issue {
        /// Label for the token's owner
        #[arg(short, long)]
        name: String,
    },

    /// List issued tokens
    List,

    /// Revoke a token by id
    Revoke {
        /// Token id as shown by `token list`
        id: i64,
    },
}

fn open_store(config: &ZipcodesConfig, database: Option<&Path>) -> anyhow::Result<(SqliteStore, PathBuf)> {
    let path = database.map(Path::to_path_buf).unwrap_or_else(|| config.database_path());
    config::ensure_db_dir(&path)?;
    let store = SqliteStore::open(&path)?;
    store.set_busy_timeout(config.busy_timeout())?;
    Ok((store, path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve { host, port, cors } => {
            let config = ZipcodesConfig {
                host: host.or(config.host),
                port: port.or(config.port),
                cors_permissive: Some(cors || config.cors_permissive.unwrap_or(false)),
                ..config
            };
            let (store, path) = open_store(&config, cli.database.as_deref())?;
            let options = ServerOptions {
                addr: config.bind_address()?,
                cors_permissive: config.cors_permissive.unwrap_or(false),
            };

            report::serving(options.addr, &path);
            server::start_server(options, store).await?;
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let starter = ZipcodesConfig::starter();
            config::write_config(&path, &starter, force)?;
            config::ensure_gitignore(Path::new("."))?;
            report::config_written(&path);
        }

        Commands::Import { file } => {
            let (store, path) = open_store(&config, cli.database.as_deref())?;
            report::import_started(&file, &path);

            let spinner = ui::Spinner::new("Reading rows");
            let stats = import::import_file(&store, &file, |running| {
                if running.postal_codes % 500 == 0 {
                    spinner.set_message(&format!("{} postal codes", running.postal_codes));
                }
            })?;
            spinner.finish_with_message("Import complete");

            report::import_finished(&stats);
        }

        Commands::Token { action } => {
            let (store, _) = open_store(&config, cli.database.as_deref())?;
            match action {
                TokenCommand::Issue { name } => {
                    let issued = auth::issue_token(&store, &name)?;
                    report::token_issued(&issued);
                }
                TokenCommand::List => report::token_list(&store.list_tokens()?),
                TokenCommand::Revoke { id } => {
                    if !report::token_revoked(id, store.revoke_token(id)?) {
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Stats => {
            let (store, path) = open_store(&config, cli.database.as_deref())?;
            report::db_stats(&path, &store.stats()?);
        }
    }

    Ok(())
}
