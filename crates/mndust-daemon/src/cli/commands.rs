use clap::{Parser, Subcommand};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "mndust")]
#[command(version = BUILD_VERSION)]
#[command(about = "Midnight testnet tDUST wallet adapter")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP adapter service")]
    #[command(long_about = "Run the tDUST adapter HTTP service.\n\nBuilds a wallet session lazily on first use and serves mined wallet facts plus transfer submission.")]
    Serve {
        #[arg(short, long, help = "Override the configured port")]
        port: Option<u16>,
    },

    #[command(about = "Send tDUST once and exit")]
    #[command(long_about = "Build a wallet session from the given seed, transfer tDUST to the receiver, and print the transaction id.\n\nExits 1 on invalid arguments and 2 when build, prove or submit fails.")]
    Send {
        #[arg(value_name = "SEED_HEX", help = "32-byte wallet seed as 64 hex chars")]
        seed_hex: String,

        #[arg(value_name = "RECEIVER", help = "Receiver shielded address (mn_shield-addr_test1...)")]
        receiver: String,

        #[arg(value_name = "AMOUNT", help = "Amount of tDUST as a positive integer")]
        amount: String,
    },
}
