//! CLI handlers for `plateful user` subcommands.
//!
//! Implements:
//! - `plateful user add <handle> --name <display name> [--bio <text>]`
//! - `plateful user list`

use anyhow::Result;
use sqlx::PgPool;

use plateful_db::queries::users as user_db;

use crate::UserCommands;

/// Dispatch a `UserCommands` variant to the appropriate handler.
pub async fn run_user_command(command: UserCommands, pool: &PgPool) -> Result<()> {
    match command {
        UserCommands::Add { handle, name, bio } => {
            cmd_add(pool, &handle, &name, bio.as_deref()).await
        }
        UserCommands::List => cmd_list(pool).await,
    }
}

async fn cmd_add(pool: &PgPool, handle: &str, name: &str, bio: Option<&str>) -> Result<()> {
    if handle.trim().is_empty() {
        anyhow::bail!("handle must not be empty");
    }
    if user_db::get_user_by_handle(pool, handle).await?.is_some() {
        anyhow::bail!("handle {handle:?} is already taken");
    }

    let user = user_db::insert_user(pool, handle, name, bio).await?;
    tracing::info!(user_id = %user.id, handle, "user created");
    println!("Created user @{} ({})", user.handle, user.id);
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let users = user_db::list_users(pool).await?;
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!("{:<36}  {:<20}  NAME", "ID", "HANDLE");
    for user in &users {
        println!("{:<36}  {:<20}  {}", user.id, user.handle, user.display_name);
    }
    Ok(())
}
