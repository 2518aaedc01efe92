use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Kuro auth — API token service
#[derive(Parser)]
#[command(name = "kuro-auth", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides KURO_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep all state in memory instead of PostgreSQL (local development)
        #[arg(long)]
        in_memory: bool,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Mint a token for a user (operator action, bypasses the session check)
    Mint {
        #[arg(long)]
        user: String,
        /// ISO-8601 expiry, e.g. 2099-01-01T00:00:00Z
        #[arg(long)]
        expires_at: String,
    },
    /// Resolve a raw token to its owner
    Verify {
        #[arg(long, env = "KURO_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// List a user's live tokens
    List {
        #[arg(long)]
        user: String,
    },
    /// Revoke a token by its stored id
    Revoke {
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: String,
    },
    /// Delete every expired token now
    Purge,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create or update a user from a GitHub profile JSON document
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}
