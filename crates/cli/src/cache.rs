//! File-backed token cache shared across invocations.
//!
//! The cache file is a process-wide shared resource: any number of shells
//! may race through the wrapper at once. Two disciplines keep that safe —
//! stores go through a temp file and an atomic rename so readers never see
//! a partial token, and refreshes serialize on a lock file so at most one
//! browser acquisition runs per cache file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::error::{CliError, Result};

/// A refresh older than this is assumed dead and its lock is taken over.
const STALE_LOCK: Duration = Duration::from_secs(600);

const LOCK_POLL: Duration = Duration::from_millis(250);

/// One cached token as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// The literal `name=value` wire string.
    pub value: String,
    pub acquired_at: SystemTime,
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self { path, ttl }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Age of the cached token, `None` when no cache file exists.
    pub fn age(&self) -> Option<Duration> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        // A file stamped slightly in the future counts as brand new.
        Some(SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO))
    }

    /// A token is fresh while its age stays strictly below the TTL.
    pub fn is_fresh(&self) -> bool {
        match self.age() {
            Some(age) => age < self.ttl,
            None => false,
        }
    }

    pub fn load(&self) -> Result<TokenRecord> {
        let metadata = fs::metadata(&self.path).map_err(|e| self.file_error(e.to_string()))?;
        let raw = fs::read_to_string(&self.path).map_err(|e| self.file_error(e.to_string()))?;
        let value = raw.trim_end_matches('\n').to_string();
        if value.is_empty() {
            return Err(self.file_error("file is empty".into()));
        }
        Ok(TokenRecord {
            value,
            acquired_at: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            source: self.path.clone(),
        })
    }

    /// Atomically replace the cache with `value`, owner read/write only.
    ///
    /// The token is staged next to the destination and renamed into place;
    /// permissions are restricted before the rename so no window exists in
    /// which another user could read the token.
    pub fn store(&self, value: &str) -> Result<()> {
        if value.is_empty() || !value.contains('=') {
            return Err(self.file_error("refusing to store malformed token (expected name=value)".into()));
        }

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut staged = tempfile::NamedTempFile::new_in(&parent)?;
        staged.write_all(value.as_bytes())?;
        staged.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(staged.path(), fs::Permissions::from_mode(0o600))?;
        }
        staged
            .persist(&self.path)
            .map_err(|e| self.file_error(format!("could not replace cache: {e}")))?;

        debug!(target = "oxy", path = %self.path.display(), "token stored");
        Ok(())
    }

    /// Take the refresh lock for this cache file, waiting up to `wait`
    /// while another invocation holds it.
    ///
    /// The lock scopes the whole refresh-and-store sequence, so at most
    /// one browser acquisition runs per cache file; losers of the race
    /// should re-check freshness after acquiring and reuse the winner's
    /// record. A lock left behind by a dead process is taken over once it
    /// ages past the stale threshold.
    pub fn lock(&self, wait: Duration) -> Result<RefreshLock> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let deadline = Instant::now() + wait;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    debug!(target = "oxy", path = %lock_path.display(), "refresh lock acquired");
                    return Ok(RefreshLock { path: lock_path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_age(&lock_path).is_some_and(|age| age > STALE_LOCK) {
                        warn!(target = "oxy", path = %lock_path.display(), "removing stale refresh lock");
                        let _ = fs::remove_file(&lock_path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(CliError::RefreshFailed(format!(
                            "another refresh is holding {}; remove it if no refresh is running",
                            lock_path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn file_error(&self, reason: String) -> CliError {
        CliError::TokenFile {
            path: self.path.clone(),
            reason,
        }
    }
}

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Held for the duration of a refresh-and-store sequence; released on
/// drop.
#[derive(Debug)]
pub struct RefreshLock {
    path: PathBuf,
}

impl Drop for RefreshLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(target = "oxy", path = %self.path.display(), error = %err, "could not remove refresh lock");
        }
    }
}
