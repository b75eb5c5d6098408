//! Test doubles for the driver capability contract.
//!
//! [`MockDriver`] is a scripted page: URLs and bodies are queues consumed
//! per call (the last entry repeats once the queue would run dry), and
//! elements are registered per locator. Every find attempt and every
//! element interaction is recorded so tests can assert on resolution
//! order and on what the flow actually did.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::driver::{ElementHandle, PageDriver};
use crate::error::Result;
use crate::flow::CredentialSource;
use crate::locator::Locator;

#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    urls: VecDeque<String>,
    bodies: VecDeque<String>,
    cookie_header: String,
    elements: Vec<(Locator, String)>,
    navigations: Vec<String>,
    find_attempts: Vec<Locator>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a URL for `current_url`; the last queued entry repeats.
    pub fn push_url(&self, url: &str) {
        self.state.lock().unwrap().urls.push_back(url.to_string());
    }

    /// Queue a body for `read_body`; the last queued entry repeats.
    pub fn push_body(&self, body: &str) {
        self.state.lock().unwrap().bodies.push_back(body.to_string());
    }

    pub fn set_cookie_header(&self, header: &str) {
        self.state.lock().unwrap().cookie_header = header.to_string();
    }

    /// Register an element; `find` on that locator returns a handle whose
    /// interactions are recorded under `label`.
    pub fn add_element(&self, locator: Locator, label: &str) {
        self.state
            .lock()
            .unwrap()
            .elements
            .push((locator, label.to_string()));
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn find_attempts(&self) -> Vec<Locator> {
        self.state.lock().unwrap().find_attempts.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }
}

fn next_or_last(queue: &mut VecDeque<String>) -> String {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or_default()
    } else {
        queue.front().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.state.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(next_or_last(&mut self.state.lock().unwrap().urls))
    }

    async fn find(&self, locator: &Locator) -> Result<Option<Box<dyn ElementHandle>>> {
        let mut state = self.state.lock().unwrap();
        state.find_attempts.push(locator.clone());
        let label = state
            .elements
            .iter()
            .find(|(candidate, _)| candidate == locator)
            .map(|(_, label)| label.clone());
        drop(state);

        Ok(label.map(|label| {
            Box::new(MockElement {
                label,
                state: self.state.clone(),
            }) as Box<dyn ElementHandle>
        }))
    }

    async fn read_body(&self) -> Result<String> {
        Ok(next_or_last(&mut self.state.lock().unwrap().bodies))
    }

    async fn cookie_header(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().cookie_header.clone())
    }
}

pub struct MockElement {
    label: String,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl ElementHandle for MockElement {
    async fn click(&self) -> Result<()> {
        self.state.lock().unwrap().clicks.push(self.label.clone());
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .typed
            .push((self.label.clone(), text.to_string()));
        Ok(())
    }
}

/// Fixed credentials for flow tests; no prompting involved.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn username(&self) -> Result<String> {
        Ok(self.username.clone())
    }

    async fn password(&self) -> Result<String> {
        Ok(self.password.clone())
    }
}
