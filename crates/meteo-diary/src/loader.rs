use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use scraper::Html;
use thiserror::Error;

use crate::config::{FETCH_TIMEOUT_SECS, SOURCE_ACCEPT_LANGUAGE, SOURCE_USER_AGENT};

/// Fetches and parses one source page.
pub trait DocumentLoader {
    fn fetch(&self, url: &str) -> Result<Html, LoadError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Sleeps for `interval` and then runs `operation`. The pause happens before
/// every call, however long the previous one took.
pub fn throttled<T, F, S>(interval: Duration, operation: F, mut sleep_fn: S) -> T
where
    F: FnOnce() -> T,
    S: FnMut(Duration),
{
    sleep_fn(interval);
    operation()
}

#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
    throttle: Duration,
}

impl HttpLoader {
    pub fn new(throttle: Duration) -> Result<Self, LoadError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(SOURCE_USER_AGENT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(SOURCE_ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|error| LoadError::Transport(error.to_string()))?;

        Ok(Self { client, throttle })
    }
}

impl DocumentLoader for HttpLoader {
    fn fetch(&self, url: &str) -> Result<Html, LoadError> {
        debug!("fetching {url}");
        let body = throttled(self.throttle, || fetch_body(&self.client, url), std::thread::sleep)?;
        Ok(Html::parse_document(&body))
    }
}

fn fetch_body(client: &Client, url: &str) -> Result<String, LoadError> {
    let response = client
        .get(url)
        .send()
        .map_err(|error| LoadError::Transport(error.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|error| LoadError::Transport(error.to_string()))?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Err(LoadError::InvalidDocument(format!("{url}: empty body")));
        }
        return Ok(body);
    }

    Err(LoadError::Http {
        status: status.as_u16(),
        message: http_error_message(&body, status.canonical_reason()),
    })
}

fn http_error_message(body: &str, reason: Option<&str>) -> String {
    const MAX_LEN: usize = 240;

    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        return reason.unwrap_or("request failed").to_string();
    }

    match trimmed.char_indices().nth(MAX_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
