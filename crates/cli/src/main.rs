use clap::Parser;
use oxy_cli::{cli::Cli, commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.silent);

    match commands::dispatch(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(target = "oxy", error = %err, "command failed");
            std::process::exit(err.exit_code());
        }
    }
}
