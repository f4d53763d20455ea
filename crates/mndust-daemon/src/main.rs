mod cli;

use clap::Parser;
use cli::{init_logging, run_send, run_serve, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    let code = match cli.command {
        Commands::Serve { port } => match run_serve(cli.config.as_deref(), port).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{}", e);
                1
            }
        },
        Commands::Send {
            seed_hex,
            receiver,
            amount,
        } => run_send(cli.config.as_deref(), &seed_hex, &receiver, &amount).await,
    };

    std::process::exit(code);
}
