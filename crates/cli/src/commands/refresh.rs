//! Browser-driven token refresh.

use std::time::Duration;

use oxy::browser::BrowserSession;
use oxy::flow::AuthFlow;
use tracing::info;

use crate::cache::TokenCache;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::prompt::TerminalPrompt;

/// How long a second invocation waits for a concurrent refresh before
/// giving up. Generous, since the human MFA step sits inside the critical
/// section.
const LOCK_WAIT: Duration = Duration::from_secs(180);

pub async fn execute(config: &Config, force: bool) -> Result<()> {
    let flow_config = config.flow_config()?;
    let cache = TokenCache::new(config.token_file.clone(), config.ttl);

    // Serialize refreshes on the cache file: at most one browser per
    // cache file, losers of the race wait and reuse the winner's token.
    let lock_cache = cache.clone();
    let _lock = tokio::task::spawn_blocking(move || lock_cache.lock(LOCK_WAIT))
        .await
        .map_err(|e| CliError::RefreshFailed(e.to_string()))??;

    if !force && cache.is_fresh() {
        info!(target = "oxy", "token was refreshed by a concurrent invocation");
        return Ok(());
    }

    let session = BrowserSession::launch(&config.session_options()).await?;
    let prompt = TerminalPrompt::new();
    let mut flow = AuthFlow::new(&session, &prompt, &flow_config);

    // The user may be mid-MFA when they interrupt; the session must still
    // be released and the profile directory removed before exiting.
    let outcome = tokio::select! {
        result = flow.run() => result,
        _ = tokio::signal::ctrl_c() => Err(oxy::Error::Interrupted),
    };
    drop(flow);
    session.close().await;

    let token = outcome?;
    cache.store(&token)?;
    info!(target = "oxy", path = %cache.path().display(), "token refreshed");
    Ok(())
}
