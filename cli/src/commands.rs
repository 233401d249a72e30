pub mod scan;
pub mod tables;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use netsift_common::config::ExportFormat;
use netsift_common::network::target::Target;

#[derive(Parser)]
#[command(name = "netsift")]
#[command(about = "Turns recon output into ranked IPv4 blocks and scans the busiest ones.")]
#[command(version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate targets and scan the selected blocks
    #[command(alias = "s")]
    Scan(ScanArgs),
    /// Inspect or recover result tables
    #[command(alias = "t")]
    Tables {
        #[command(subcommand)]
        action: TableAction,
    },
}

#[derive(clap::Args)]
pub struct ScanArgs {
    /// Addresses, blocks, comma lists, or .txt/.csv/.json files
    pub targets: Vec<Target>,

    /// Scan every block instead of the top ranked ones
    #[arg(long)]
    pub no_filter: bool,

    /// Skip HTTP title collection
    #[arg(long)]
    pub no_request: bool,

    /// Keep selected blocks whole instead of splitting wide ones
    #[arg(long)]
    pub no_cut_mask: bool,

    /// Only aggregate and export, never probe
    #[arg(long)]
    pub analysis_only: bool,

    /// Export format
    #[arg(short, long)]
    pub format: Option<ExportFormat>,

    /// Export file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum TableAction {
    /// List tables in the result store
    List,
    /// Append every row of SRC to DST and drop SRC
    Merge { src: String, dst: String },
    /// Dump a table to a file
    Export {
        name: String,
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        format: Option<ExportFormat>,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
