use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sysreconcile")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keep DNS, NTP and local accounts in line with a configuration datastore", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file
    #[arg(short, long, global = true, env = "SYSRECONCILE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Seed the startup datastore from the system, or push it onto the system
    Startup,

    /// Compare the running datastore with the live system
    Status,

    /// Print the live system configuration
    Show(ShowArgs),

    /// Make a configuration document the running configuration
    Apply(ApplyArgs),

    /// Run a batch of edit events
    Edit(EditArgs),

    /// Inspect settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct ShowArgs {
    /// Print JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// TOML document with the desired configuration
    pub file: PathBuf,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Run against a snapshot of the system without changing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct EditArgs {
    /// JSON array of edit events
    pub file: PathBuf,

    /// Run against a snapshot of the system without changing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show effective settings
    Show,

    /// Show settings and datastore locations
    Path,
}
