mod refresh;
mod run;
mod show;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::Result;

/// Dispatch the parsed CLI to its command, returning the process exit
/// code.
pub async fn dispatch(cli: Cli) -> Result<i32> {
    let config = Config::resolve(&cli)?;

    match cli.command {
        Commands::Run { refresh_with, command } => {
            run::execute(&config, refresh_with, command).await
        }
        Commands::Refresh { force } => refresh::execute(&config, force).await.map(|_| 0),
        Commands::Show { format } => show::execute(&config, &format).map(|_| 0),
    }
}
