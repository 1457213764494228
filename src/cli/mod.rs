//! CLI module - Command-line interface for Bookshelves
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bookshelves - accounts and blog API server
#[derive(Parser)]
#[command(name = "bookshelves")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config.toml (overrides the default search locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Ensure the default group exists and holds its configured permissions
    InitGroups,

    /// Create an active user, e.g. the first administrator
    CreateUser {
        username: String,
        mobile: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Mark as staff and superuser (bypasses permission checks)
        #[arg(long)]
        superuser: bool,
    },

    /// Send a fresh verification code to an inactive user
    IssueCode { username: String },
}

pub use commands::*;
