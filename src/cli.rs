//! # Command Line Interface
//!
//! Serving the API, applying migrations and provisioning users.

use crate::api::{start_api_server, ApiState};
use crate::auth::hashing::hash_secret;
use crate::config::AppConfig;
use crate::observability::{init_logging, log_config_info};
use crate::storage::repositories::{NewUser, SqlxUserRepository, UserRepository};
use crate::storage::{create_pool, list_applied_migrations, run_migrations, MigrationInfo};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "orgdesk")]
#[command(about = "Organization management service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Database URL override
    #[arg(long)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Apply pending migrations and list the applied ones
    Migrate,

    /// Create a user account
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        password: String,

        /// Grant superuser rights
        #[arg(long)]
        superuser: bool,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    init_logging(&config.observability);

    match cli.command.unwrap_or(Commands::Serve { port: None, addr: None }) {
        Commands::Serve { port, addr } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(addr) = addr {
                config.server.bind_address = addr;
            }
            config.validate()?;
            serve(config).await?;
        }

        Commands::Migrate => {
            let mut database = config.database.clone();
            database.auto_migrate = false;
            let pool = create_pool(&database).await?;
            run_migrations(&pool).await?;
            print_migrations_table(&list_applied_migrations(&pool).await?);
        }

        Commands::CreateUser { email, name, password, superuser } => {
            let pool = create_pool(&config.database).await?;
            let users = SqlxUserRepository::new(pool);

            let mut new_user = NewUser::new(email, name).with_password_hash(hash_secret(&password)?);
            if superuser {
                new_user = new_user.superuser();
            }
            let user = users.create_user(new_user).await?;
            println!("Created user {} ({})", user.email, user.id);
        }
    }

    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    log_config_info(&config);

    let pool = create_pool(&config.database).await?;
    let server = config.server.clone();
    let state = ApiState::new(pool, config);

    info!(address = %server.socket_address(), "Starting orgdesk");
    start_api_server(&server, state).await?;
    Ok(())
}

/// Print migrations in a formatted table
fn print_migrations_table(migrations: &[MigrationInfo]) {
    if migrations.is_empty() {
        println!("No migrations have been applied");
        return;
    }

    println!("{:<15} {:<50} {:<10}", "Version", "Description", "Success");
    println!("{}", "-".repeat(75));
    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<10}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.success
        );
    }
}

/// Truncate string to fit in table column
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
