use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "oxy")]
#[command(about = "Okta oauth2-proxy token fetcher and command wrapper")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress informational output; errors are always printed
    #[arg(short, long, global = true)]
    pub silent: bool,

    /// Token cache file (default: ~/.okta-cookie)
    #[arg(long, global = true, value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    /// Seconds a cached token stays fresh
    #[arg(long, global = true, value_name = "SECS")]
    pub ttl: Option<u64>,

    /// Protected endpoint that echoes request headers
    #[arg(long, global = true, value_name = "URL")]
    pub probe_url: Option<String>,

    /// Run the browser without a visible window
    #[arg(long, global = true)]
    pub headless: bool,

    /// Okta username to pre-fill (the password is always prompted)
    #[arg(short, long, global = true, value_name = "USER")]
    pub username: Option<String>,

    /// Seconds to wait for browser navigation and page content
    #[arg(long, global = true, value_name = "SECS")]
    pub browser_timeout: Option<u64>,

    /// Seconds to wait for the human MFA step
    #[arg(long, global = true, value_name = "SECS")]
    pub mfa_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ensure a fresh token, export it, and run a command with it
    Run {
        /// Program invoked to refresh a stale token (default: this
        /// executable's own refresh subcommand)
        #[arg(long, value_name = "PATH")]
        refresh_with: Option<PathBuf>,

        /// Command and arguments to wrap; with no command the token is
        /// refreshed/exported and oxy exits
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Drive the browser login flow and store a fresh token
    Refresh {
        /// Refresh even when the cached token is still fresh
        #[arg(long)]
        force: bool,
    },

    /// Show the cached token's age and freshness
    Show {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}
