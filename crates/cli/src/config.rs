//! Effective configuration, resolved once at startup.
//!
//! Flags win over `OXY_*` environment variables, which win over defaults.
//! The environment is read in this one place; every component receives
//! plain values by parameter instead of reaching into the process
//! environment itself.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Fixed name under which the token is exported to wrapped commands.
pub const TOKEN_ENV_VAR: &str = "OKTA_COOKIE";

const DEFAULT_TOKEN_FILE: &str = ".okta-cookie";
const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_BROWSER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MFA_TIMEOUT_SECS: u64 = 120;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Config {
    pub token_file: PathBuf,
    pub ttl: Duration,
    pub probe_url: Option<String>,
    pub headless: bool,
    pub username: Option<String>,
    pub browser_timeout: Duration,
    pub mfa_timeout: Duration,
    pub refresh_with: Option<PathBuf>,
    pub silent: bool,
    pub poll_interval: Duration,
}

impl Config {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let token_file = cli
            .token_file
            .clone()
            .or_else(|| env_string("OXY_TOKEN_FILE").map(PathBuf::from))
            .unwrap_or_else(default_token_file);

        let config = Self {
            token_file,
            ttl: Duration::from_secs(resolve_secs(cli.ttl, "OXY_TTL", DEFAULT_TTL_SECS)?),
            probe_url: cli.probe_url.clone().or_else(|| env_string("OXY_PROBE_URL")),
            headless: cli.headless || env_bool("OXY_HEADLESS"),
            username: cli.username.clone().or_else(|| env_string("OXY_USERNAME")),
            browser_timeout: Duration::from_secs(resolve_secs(
                cli.browser_timeout,
                "OXY_BROWSER_TIMEOUT",
                DEFAULT_BROWSER_TIMEOUT_SECS,
            )?),
            mfa_timeout: Duration::from_secs(resolve_secs(
                cli.mfa_timeout,
                "OXY_MFA_TIMEOUT",
                DEFAULT_MFA_TIMEOUT_SECS,
            )?),
            refresh_with: env_string("OXY_REFRESH_WITH").map(PathBuf::from),
            silent: cli.silent || env_bool("OXY_SILENT"),
            poll_interval: POLL_INTERVAL,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CliError::Config("TTL must be positive".into()));
        }
        if self.browser_timeout.is_zero() {
            return Err(CliError::Config("browser timeout must be positive".into()));
        }
        if self.mfa_timeout.is_zero() {
            return Err(CliError::Config("MFA timeout must be positive".into()));
        }
        if let Some(url) = &self.probe_url {
            if url.trim().is_empty() {
                return Err(CliError::Config("probe URL must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Flow tunables for a refresh; fails when no probe URL is configured.
    pub fn flow_config(&self) -> Result<oxy::flow::FlowConfig> {
        let probe_url = self.probe_url.clone().ok_or_else(|| {
            CliError::Config("probe URL is not configured; set --probe-url or OXY_PROBE_URL".into())
        })?;
        Ok(oxy::flow::FlowConfig {
            probe_url,
            username: self.username.clone(),
            browser_timeout: self.browser_timeout,
            mfa_timeout: self.mfa_timeout,
            poll_interval: self.poll_interval,
        })
    }

    pub fn session_options(&self) -> oxy::browser::SessionOptions {
        oxy::browser::SessionOptions {
            headless: self.headless,
            launch_timeout: self.browser_timeout,
        }
    }
}

fn default_token_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(env::temp_dir)
        .join(DEFAULT_TOKEN_FILE)
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_bool(name: &str) -> bool {
    env_string(name)
        .map(|value| {
            let value = value.to_lowercase();
            value == "true" || value == "1" || value == "yes"
        })
        .unwrap_or(false)
}

fn resolve_secs(flag: Option<u64>, env_name: &str, default: u64) -> Result<u64> {
    if let Some(value) = flag {
        return Ok(value);
    }
    match env_string(env_name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CliError::Config(format!("{env_name} must be an integer, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use clap::Parser;

    use super::*;

    /// Serializes tests that mutate the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    const OXY_VARS: [&str; 9] = [
        "OXY_TOKEN_FILE",
        "OXY_TTL",
        "OXY_PROBE_URL",
        "OXY_HEADLESS",
        "OXY_USERNAME",
        "OXY_BROWSER_TIMEOUT",
        "OXY_MFA_TIMEOUT",
        "OXY_REFRESH_WITH",
        "OXY_SILENT",
    ];

    fn clear_env() {
        for name in OXY_VARS {
            unsafe { env::remove_var(name) };
        }
    }

    fn set_env(name: &str, value: &str) {
        unsafe { env::set_var(name, value) };
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let _guard = lock_env();
        clear_env();

        let config = Config::resolve(&parse(&["oxy", "show"])).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.browser_timeout, Duration::from_secs(60));
        assert_eq!(config.mfa_timeout, Duration::from_secs(120));
        assert!(!config.headless);
        assert!(config.probe_url.is_none());
        assert!(config.token_file.ends_with(".okta-cookie"));
    }

    #[test]
    fn env_overrides_defaults() {
        let _guard = lock_env();
        clear_env();
        set_env("OXY_TTL", "120");
        set_env("OXY_HEADLESS", "true");
        set_env("OXY_PROBE_URL", "https://probe.internal/headers");
        set_env("OXY_TOKEN_FILE", "/tmp/oxy-test-cookie");

        let config = Config::resolve(&parse(&["oxy", "show"])).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(120));
        assert!(config.headless);
        assert_eq!(config.probe_url.as_deref(), Some("https://probe.internal/headers"));
        assert_eq!(config.token_file, PathBuf::from("/tmp/oxy-test-cookie"));

        clear_env();
    }

    #[test]
    fn flags_win_over_env() {
        let _guard = lock_env();
        clear_env();
        set_env("OXY_TTL", "120");

        let config = Config::resolve(&parse(&["oxy", "--ttl", "7200", "show"])).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(7200));

        clear_env();
    }

    #[test]
    fn non_integer_env_value_is_a_config_error() {
        let _guard = lock_env();
        clear_env();
        set_env("OXY_TTL", "soon");

        let err = Config::resolve(&parse(&["oxy", "show"])).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));

        clear_env();
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let _guard = lock_env();
        clear_env();

        let err = Config::resolve(&parse(&["oxy", "--ttl", "0", "show"])).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn flow_config_requires_a_probe_url() {
        let _guard = lock_env();
        clear_env();

        let config = Config::resolve(&parse(&["oxy", "refresh"])).unwrap();
        assert!(matches!(config.flow_config(), Err(CliError::Config(_))));

        let config =
            Config::resolve(&parse(&["oxy", "--probe-url", "https://p/headers", "refresh"]))
                .unwrap();
        let flow = config.flow_config().unwrap();
        assert_eq!(flow.probe_url, "https://p/headers");
    }
}
