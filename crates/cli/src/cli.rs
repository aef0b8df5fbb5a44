use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::client::DEFAULT_NODE_URL;
use crate::commands::checkpoint::{parse_periodic, Verb};

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Rewind - checkpoint and rollback control for a running flight node", long_about = None)]
pub struct Cli {
    /// Base URL of the node
    #[arg(long, global = true, default_value = DEFAULT_NODE_URL)]
    pub node: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Take a checkpoint (kernel) or store the flash snapshot
    Save,
    /// Roll back to the checkpoint or restore the flash snapshot
    Restore,
    /// Arm the rollback timer on the current checkpoint
    Timer {
        seconds: u32,
        /// 1 to re-arm after every rollback, 0 for one-shot
        #[arg(value_parser = parse_periodic, action = ArgAction::Set)]
        periodic: bool,
    },
    /// Cancel the rollback timer
    Stop,
    /// Clear the in-reboot marker
    Done,
    /// Erase the flash mirrors
    Erase,
    /// Show the node's recovery status
    Status {
        /// Print the raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect a node's record and flash image offline.
    /// If --dir is provided, it resolves rewind.rec and rewind-flash.img inside it.
    Inspect {
        #[arg(long, short)]
        dir: Option<PathBuf>,

        #[arg(long)]
        record_path: Option<PathBuf>,

        #[arg(long)]
        flash_path: Option<PathBuf>,

        /// Size of the sram region the image was created with
        #[arg(long, default_value_t = 0x30000)]
        sram: usize,

        /// Size of the ccm region the image was created with
        #[arg(long, default_value_t = 0x8000)]
        ccm: usize,
    },
}

impl Commands {
    /// The node operation this command maps to, if any.
    pub fn verb(&self) -> Option<Verb> {
        match *self {
            Commands::Save => Some(Verb::Save),
            Commands::Restore => Some(Verb::Restore),
            Commands::Timer { seconds, periodic } => Some(Verb::Timer { seconds, periodic }),
            Commands::Stop => Some(Verb::Stop),
            Commands::Done => Some(Verb::Done),
            Commands::Erase => Some(Verb::Erase),
            Commands::Status { .. } | Commands::Inspect { .. } => None,
        }
    }
}
