mod config;
mod serve_cmd;
mod session_cmds;
mod user_cmds;

#[cfg(test)]
mod test_util;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use plateful_db::pool;

use config::PlatefulConfig;

#[derive(Parser)]
#[command(name = "plateful", about = "Meal-planning community server")]
struct Cli {
    /// Database URL (overrides PLATEFUL_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a plateful config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/plateful")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Run the HTTP server
    Serve {
        /// Address to bind (defaults to the config file, then 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (defaults to the config file, then 3000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Community member management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Login session management
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a community member
    Add {
        /// Unique handle (e.g. ana)
        handle: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Short profile bio
        #[arg(long)]
        bio: Option<String>,
    },
    /// List community members
    List,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Open a session for a user and print its cookie
    Issue {
        /// User ID or handle
        user: String,
    },
    /// Revoke the session named by a session token
    Revoke {
        /// Session token (the cookie value)
        token: String,
    },
    /// Delete sessions that expired or were revoked long ago
    Purge {
        /// Keep sessions that ended within this many days
        #[arg(long, default_value_t = 30)]
        older_than_days: i64,
    },
}

fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let session_secret = config::generate_session_secret();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            session_secret: session_secret.clone(),
            session_ttl_hours: plateful_core::session::SessionConfig::DEFAULT_TTL_HOURS,
        },
        server: config::ServerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!(
        "  auth.session_secret = {}...{}",
        &session_secret[..8],
        &session_secret[56..]
    );
    println!();
    println!("Next: run `plateful db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `plateful db-init`: create the database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = PlatefulConfig::resolve(cli_db_url)?;

    println!("Initializing plateful database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("plateful db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = PlatefulConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let bind = bind.unwrap_or(resolved.server.bind);
            let port = port.unwrap_or(resolved.server.port);
            let result =
                serve_cmd::run_serve(db_pool.clone(), resolved.session_config, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::User { command } => {
            let resolved = PlatefulConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = user_cmds::run_user_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Session { command } => {
            let resolved = PlatefulConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result =
                session_cmds::run_session_command(command, &db_pool, &resolved.session_config)
                    .await;
            db_pool.close().await;
            result?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "plateful", &mut std::io::stdout());
        }
    }

    Ok(())
}
