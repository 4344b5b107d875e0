//! ABC Shop CLI - Database migrations and cart maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! abc-cli migrate
//!
//! # Replace the legacy (owner, product, variant) index on a live database
//! abc-cli cart repair-indexes
//!
//! # Delete every cart line
//! abc-cli cart purge --yes
//!
//! # Exercise a running API with a guest session
//! abc-cli cart smoke --url http://127.0.0.1:4000 --session smoke-1
//!
//! # Load catalog products
//! abc-cli seed products -f products.yaml
//!
//! # Issue an API token for a shopper
//! abc-cli token issue -e shopper@example.com --label mobile --days 90
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Index repair, purge, smoke test
//! - `seed` - Load products from YAML
//! - `token` - Issue bearer tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "abc-cli")]
#[command(author, version, about = "ABC Shop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Cart maintenance
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Drop the legacy unique index, purge lines, create the selection indexes
    RepairIndexes,
    /// Delete every cart line of every owner
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Add a sample item through the cart API and print the cart
    Smoke {
        /// Base URL of the cart API
        #[arg(long, env = "CART_API_URL")]
        url: String,

        /// Guest session id to act as
        #[arg(long, default_value = "cli-smoke")]
        session: String,

        /// Product to add
        #[arg(long, default_value_t = 1)]
        product: i32,

        /// Remove the sample line afterwards
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert catalog products from a YAML file
    Products {
        /// Path to YAML file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a bearer token, creating the user if needed
    Issue {
        /// Shopper email address
        #[arg(short, long)]
        email: String,

        /// Free-form label, e.g. the device
        #[arg(short, long)]
        label: Option<String>,

        /// Days until the token expires (never, if omitted)
        #[arg(short, long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load .env before parsing so env-backed arguments see it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Cart { action } => match action {
            CartAction::RepairIndexes => commands::cart::repair_indexes().await?,
            CartAction::Purge { yes } => commands::cart::purge(yes).await?,
            CartAction::Smoke {
                url,
                session,
                product,
                cleanup,
            } => commands::cart::smoke(&url, &session, product, cleanup).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Issue { email, label, days } => {
                commands::token::issue(&email, label, days).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_token_issue_args() {
        let cli = Cli::try_parse_from([
            "abc-cli", "token", "issue", "-e", "a@b.co", "--label", "mobile", "--days", "30",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Commands::Token {
                action: TokenAction::Issue { email, label, days },
            } => {
                assert_eq!(email, "a@b.co");
                assert_eq!(label.as_deref(), Some("mobile"));
                assert_eq!(days, Some(30));
            }
            _ => panic!("parsed the wrong command"),
        }
    }
}
