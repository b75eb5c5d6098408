//! Wrapper entry point: ensure a fresh token, export it, run the target.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info};

use crate::cache::TokenCache;
use crate::config::{Config, TOKEN_ENV_VAR};
use crate::error::{CliError, Result};

pub async fn execute(
    config: &Config,
    refresh_with: Option<PathBuf>,
    command: Vec<String>,
) -> Result<i32> {
    // Fail fast on a bad target, before the cache or the refresh program
    // are touched. No command at all is valid: standalone mode just
    // ensures a token is cached and exported.
    let target = match command.split_first() {
        Some((name, args)) => {
            which::which(name).map_err(|_| CliError::CommandNotFound { name: name.clone() })?;
            Some((name.clone(), args.to_vec()))
        }
        None => None,
    };

    let cache = TokenCache::new(config.token_file.clone(), config.ttl);
    if cache.is_fresh() {
        debug!(target = "oxy", path = %cache.path().display(), "cached token is fresh");
    } else {
        invoke_refresh(config, refresh_with.or_else(|| config.refresh_with.clone()))?;
    }

    let record = cache.load()?;
    // SAFETY: no other threads are mutating the environment at this
    // point; the wrapped child is spawned after the mutation.
    unsafe { std::env::set_var(TOKEN_ENV_VAR, &record.value) };
    info!(target = "oxy", var = TOKEN_ENV_VAR, "token exported");

    match target {
        Some((name, args)) => {
            let status = Command::new(&name).args(&args).status()?;
            let code = status.code().unwrap_or(1);
            debug!(target = "oxy", command = %name, code, "wrapped command finished");
            Ok(code)
        }
        None => Ok(0),
    }
}

/// Run the refresh program as its own process so the interactive login
/// (credential prompt, visible browser window, MFA touch) owns the
/// terminal.
///
/// By default that is this executable's own `refresh` subcommand with the
/// resolved configuration forwarded as flags. A custom program is invoked
/// bare and must replace the token file itself.
fn invoke_refresh(config: &Config, refresh_with: Option<PathBuf>) -> Result<()> {
    info!(target = "oxy", "cached token is stale, refreshing");

    let mut refresh = match refresh_with {
        Some(program) => Command::new(program),
        None => {
            let exe = std::env::current_exe()?;
            let mut refresh = Command::new(exe);
            refresh.arg("refresh");
            forward_config(&mut refresh, config);
            refresh
        }
    };

    let status = refresh
        .status()
        .map_err(|e| CliError::RefreshFailed(format!("could not start refresh program: {e}")))?;
    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".into());
        return Err(CliError::RefreshFailed(format!("refresh exited with {code}")));
    }
    Ok(())
}

fn forward_config(refresh: &mut Command, config: &Config) {
    refresh.arg("--token-file").arg(&config.token_file);
    refresh.arg("--ttl").arg(config.ttl.as_secs().to_string());
    refresh
        .arg("--browser-timeout")
        .arg(config.browser_timeout.as_secs().to_string());
    refresh
        .arg("--mfa-timeout")
        .arg(config.mfa_timeout.as_secs().to_string());
    if let Some(url) = &config.probe_url {
        refresh.arg("--probe-url").arg(url);
    }
    if let Some(username) = &config.username {
        refresh.arg("--username").arg(username);
    }
    if config.headless {
        refresh.arg("--headless");
    }
    if config.silent {
        refresh.arg("--silent");
    }
}
