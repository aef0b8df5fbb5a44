use clap::Parser;
use rewind_cli::cli::{Cli, Commands};
use rewind_cli::client::NodeClient;
use rewind_cli::commands::{checkpoint, inspect, status};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = NodeClient::new(&cli.node);

    if let Some(verb) = cli.command.verb() {
        return checkpoint::run(&client, verb);
    }

    match cli.command {
        Commands::Status { json } => status::run(&client, json),
        Commands::Inspect {
            dir,
            record_path,
            flash_path,
            sram,
            ccm,
        } => inspect::run(dir, record_path, flash_path, sram, ccm),
        _ => Ok(()),
    }
}
