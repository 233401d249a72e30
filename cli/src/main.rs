mod commands;
mod terminal;

use std::process::ExitCode;

use anyhow::Context;
use commands::{CommandLine, Commands, scan, tables};
use netsift_common::config::Config;
use terminal::{logging, print};

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Could not load configuration {}", path.display())),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);
    print::banner();

    let cfg = load_config(commands.config.as_deref())?;

    let code = match commands.command {
        Commands::Scan(args) => {
            print::header("starting run");
            scan::scan(args, cfg).await?
        }
        Commands::Tables { action } => {
            tables::tables(action, &cfg)?;
            ExitCode::SUCCESS
        }
    };

    print::end_of_program();
    Ok(code)
}
