use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::ProviderGate;

/// Fetches the readable text of a page.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String>;
}

/// Reader-style endpoint: `GET {base}/{url}` returns the page as plain text.
pub struct ReaderExtractor {
    http: reqwest::Client,
    base: String,
    gate: ProviderGate,
}

impl ReaderExtractor {
    pub fn new(base: impl Into<String>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            gate: ProviderGate::new(concurrency, timeout),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let text = self
            .http
            .get(format!("{}/{url}", self.base))
            .header("Accept", "text/plain")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        if text.trim().is_empty() {
            bail!("empty page body");
        }
        Ok(text)
    }
}

#[async_trait]
impl PageExtractor for ReaderExtractor {
    async fn extract(&self, url: &str) -> Result<String> {
        self.gate.run(self.fetch(url)).await.map_err(anyhow::Error::msg)
    }
}

/// Collapse whitespace and cut to `max_chars` characters.
pub fn clip(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => flat[..cut].to_string(),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_counts_chars_not_bytes() {
        assert_eq!(clip("árbol  de\n decisión", 9), "árbol de ");
        assert_eq!(clip("short", 100), "short");
    }

    #[tokio::test]
    async fn unreachable_reader_errors() {
        let reader = ReaderExtractor::new("http://127.0.0.1:9/", 1, Duration::from_secs(2));
        assert!(reader.extract("https://example.com").await.is_err());
    }
}
