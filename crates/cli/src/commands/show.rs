//! Inspect the cached token without refreshing.

use serde::Serialize;

use crate::cache::TokenCache;
use crate::config::{Config, TOKEN_ENV_VAR};
use crate::error::Result;

#[derive(Debug, Serialize)]
struct ShowData {
    path: String,
    age_secs: u64,
    ttl_secs: u64,
    fresh: bool,
    value: String,
}

pub fn execute(config: &Config, format: &str) -> Result<()> {
    let cache = TokenCache::new(config.token_file.clone(), config.ttl);
    let record = cache.load()?;

    let data = ShowData {
        path: record.source.display().to_string(),
        age_secs: cache.age().unwrap_or_default().as_secs(),
        ttl_secs: config.ttl.as_secs(),
        fresh: cache.is_fresh(),
        value: record.value,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&data)?),
        _ => {
            println!("token file: {}", data.path);
            println!(
                "age: {}s of {}s ttl ({})",
                data.age_secs,
                data.ttl_secs,
                if data.fresh { "fresh" } else { "stale" }
            );
            println!("export {}={}", TOKEN_ENV_VAR, data.value);
        }
    }
    Ok(())
}
