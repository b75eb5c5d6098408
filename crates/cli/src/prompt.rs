//! Interactive credential entry on the controlling terminal.
//!
//! Prompts write to stderr so wrapped-command stdout stays clean, and the
//! password is read without echo. Blocking reads run on the blocking pool;
//! the flow is suspended while the human types, not polling.

use std::io::Write;

use async_trait::async_trait;
use oxy::error::{Error, Result};
use oxy::flow::CredentialSource;

#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialSource for TerminalPrompt {
    async fn username(&self) -> Result<String> {
        tokio::task::spawn_blocking(|| {
            eprint!("Okta username: ");
            std::io::stderr().flush().ok();

            let mut input = String::new();
            std::io::stdin()
                .read_line(&mut input)
                .map_err(|e| Error::CredentialInput(e.to_string()))?;
            let username = input.trim().to_string();
            if username.is_empty() {
                return Err(Error::CredentialInput("username is required".into()));
            }
            Ok(username)
        })
        .await
        .map_err(|e| Error::CredentialInput(e.to_string()))?
    }

    async fn password(&self) -> Result<String> {
        tokio::task::spawn_blocking(|| {
            let password = rpassword::prompt_password("Okta password: ")
                .map_err(|e| Error::CredentialInput(e.to_string()))?;
            if password.is_empty() {
                return Err(Error::CredentialInput("password is required".into()));
            }
            Ok(password)
        })
        .await
        .map_err(|e| Error::CredentialInput(e.to_string()))?
    }
}
