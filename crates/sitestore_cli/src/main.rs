//! SiteStore command-line front end.
//!
//! # Responsibility
//! - Load configuration from flags, environment and an optional JSON file.
//! - Bootstrap logging and the database (with startup retry).
//! - Route each subcommand through `EntityService` and print the JSON body.
//!
//! Non-2xx responses exit with status 1.

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use sitestore_core::db::{open_db_with_retry, provision_collection};
use sitestore_core::{
    init_logging_from, CollectionRegistry, CoreConfig, EntityService, OpContext, ServiceResponse,
    SqliteEntityStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "sitestore", about = "SiteStore entity CLI", version, long_about = None)]
struct Cli {
    /// JSON configuration file; flags and environment override its values
    #[arg(long, env = "SITESTORE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "SITESTORE_DATABASE_PATH", global = true)]
    database: Option<PathBuf>,

    /// Collections the store may target (comma separated)
    #[arg(long, env = "SITESTORE_COLLECTIONS", value_delimiter = ',', global = true)]
    collections: Option<Vec<String>>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "SITESTORE_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, env = "SITESTORE_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Startup ping attempts before giving up
    #[arg(long, env = "SITESTORE_STARTUP_RETRY_MAX_ATTEMPTS", global = true)]
    retry_attempts: Option<u32>,

    /// Per-command timeout in milliseconds
    #[arg(long, env = "SITESTORE_TIMEOUT_MS", default_value_t = 30_000, global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an entity-shaped table
    Provision {
        /// Collection name
        name: String,
    },
    /// Check core linkage and database reachability
    Ping,
    #[command(flatten)]
    Entity(EntityCommand),
}

#[derive(Debug, Subcommand)]
enum EntityCommand {
    /// Create an entity
    Create(WriteArgs),
    /// Show one visible entity
    Get(IdArgs),
    /// Replace name and content of an entity
    Update(UpdateArgs),
    /// Physically remove an entity
    Delete(IdArgs),
    /// Hide an entity from reads and listings
    Archive(IdArgs),
    /// List visible entities
    List(CollectionArgs),
}

#[derive(Debug, Args)]
struct CollectionArgs {
    /// Target collection
    #[arg(long, short = 'c')]
    collection: String,
}

#[derive(Debug, Args)]
struct IdArgs {
    #[command(flatten)]
    target: CollectionArgs,

    /// Entity id
    id: String,
}

#[derive(Debug, Args)]
struct WriteArgs {
    #[command(flatten)]
    target: CollectionArgs,

    #[arg(long)]
    name: String,

    #[arg(long)]
    content: String,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[command(flatten)]
    write: WriteArgs,

    /// Entity id
    id: String,
}

fn main() -> ExitCode {
    let _env = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            log::error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let config = load_config(&cli)?;
    init_logging_from(&config)?;

    let conn = open_db_with_retry(
        &config.database_path,
        config.busy_timeout(),
        &config.startup_retry,
    )
    .map_err(|err| err.to_string())?;

    let command = match &cli.command {
        Commands::Ping => {
            println!("sitestore_core ping={}", sitestore_core::ping());
            println!("sitestore_core version={}", sitestore_core::core_version());
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Provision { name } => {
            let collection = provision_collection(&conn, name).map_err(|err| err.to_string())?;
            println!("{}", json!({ "provisioned": collection.as_str() }));
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Entity(command) => command,
    };

    let registry =
        CollectionRegistry::load(&conn, &config.collections).map_err(|err| err.to_string())?;
    let store = SqliteEntityStore::try_new(&conn, registry).map_err(|err| err.to_string())?;
    let service = EntityService::new(store);
    let ctx = OpContext::with_timeout(Duration::from_millis(cli.timeout_ms));

    let response = dispatch(&service, &ctx, command);
    print_response(&response)
}

fn dispatch(
    service: &EntityService<SqliteEntityStore<'_>>,
    ctx: &OpContext,
    command: &EntityCommand,
) -> ServiceResponse {
    match command {
        EntityCommand::Create(args) => {
            let body = json!({
                "tableName": args.target.collection,
                "entity": { "name": args.name, "content": args.content },
            });
            service.create_entity(ctx, &body.to_string())
        }
        EntityCommand::Get(args) => service.get_entity(ctx, &args.id, Some(&args.target.collection)),
        EntityCommand::Update(args) => {
            let body = json!({
                "tableName": args.write.target.collection,
                "entity": { "name": args.write.name, "content": args.write.content },
            });
            service.update_entity(ctx, &args.id, &body.to_string())
        }
        EntityCommand::Delete(args) => {
            let body = json!({ "tableName": args.target.collection, "id": args.id });
            service.delete_entity(ctx, &body.to_string())
        }
        EntityCommand::Archive(args) => {
            let body = json!({ "tableName": args.target.collection, "id": args.id });
            service.archive_entity(ctx, &body.to_string())
        }
        EntityCommand::List(args) => service.list_entities(ctx, Some(&args.collection)),
    }
}

fn load_config(cli: &Cli) -> Result<CoreConfig, String> {
    let mut config = match cli.config.as_ref() {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
            CoreConfig::from_json(&text).map_err(|err| err.to_string())?
        }
        None => CoreConfig::default(),
    };

    if let Some(database) = cli.database.clone() {
        config.database_path = database;
    }
    if let Some(collections) = cli.collections.clone() {
        config.collections = collections
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }
    if let Some(log_dir) = cli.log_dir.clone() {
        config.log_dir = Some(log_dir);
    }
    if let Some(attempts) = cli.retry_attempts {
        config.startup_retry.max_attempts = attempts;
    }

    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn print_response(response: &ServiceResponse) -> Result<ExitCode, String> {
    let rendered = serde_json::to_string_pretty(&response.body).map_err(|err| err.to_string())?;
    if response.status.is_success() {
        println!("{rendered}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("status={} {rendered}", response.status.code());
        Ok(ExitCode::from(1))
    }
}
