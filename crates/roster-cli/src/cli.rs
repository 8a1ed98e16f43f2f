use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use roster_store::BackendKind;

#[derive(Parser)]
#[command(name = "roster", about = "Manage player records in a file-backed store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file naming the backend and store file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short, long, global = true)]
    pub backend: Option<BackendKind>,

    /// Store file (overrides the config file)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// fsync after every mutation
    #[arg(long, global = true)]
    pub sync: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a new player
    Add(AddArgs),
    /// Remove a player by id
    Remove(IdArgs),
    /// Replace the fields of an existing player
    Update(UpdateArgs),
    /// Show one player
    Get(IdArgs),
    /// List all players
    List,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub id: i32,
    #[arg(long, default_value = "")]
    pub nick: String,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub experience: i32,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub life_level: i32,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub coins: i32,
}

#[derive(Args)]
pub struct IdArgs {
    #[arg(allow_hyphen_values = true)]
    pub id: i32,
}

/// Fields left out keep their current value.
#[derive(Args)]
pub struct UpdateArgs {
    #[arg(allow_hyphen_values = true)]
    pub id: i32,
    #[arg(long)]
    pub nick: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub experience: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    pub life_level: Option<i32>,
    #[arg(long, allow_hyphen_values = true)]
    pub coins: Option<i32>,
}
