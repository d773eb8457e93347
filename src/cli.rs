//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Rekindle hot class reload engine CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: rekindle.toml, searched upward)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Verbose diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Never redefine in place; every change swaps in a new generation
    #[arg(long, global = true)]
    pub swap_only: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one reload cycle and exit
    #[command(visible_alias = "c")]
    Cycle,

    /// Watch sources and reload on change
    #[command(visible_alias = "w")]
    Watch,

    /// Remove compiled outputs and the enhanced cache
    Clean,
}
