// src/providers/http.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::QuoteProvider;

/// Real quote endpoint: GET a JSON body and pull one numeric field out of it.
///
/// Tolerant about shape: accepts a bare number, `{"<field>": 123.4}`, or the
/// same field nested one level under `"data"`.
pub struct HttpQuoteProvider {
    source_id: String,
    url: String,
    field: String,
    client: Client,
    timeout: Duration,
}

impl HttpQuoteProvider {
    pub fn new(source_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
            field: "price".to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Name of the JSON field holding the quote (default `price`).
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn extract(&self, body: &str) -> Result<f64> {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            anyhow::bail!("quote endpoint returned empty/null body");
        }

        let json: serde_json::Value = serde_json::from_str(trimmed)
            .with_context(|| format!("parse quote JSON failed, body: {trimmed}"))?;

        if let Some(v) = json.as_f64() {
            return Ok(v);
        }
        if let Some(v) = json.get(&self.field).and_then(|v| v.as_f64()) {
            return Ok(v);
        }
        if let Some(v) = json
            .get("data")
            .and_then(|d| d.get(&self.field))
            .and_then(|v| v.as_f64())
        {
            return Ok(v);
        }

        anyhow::bail!("no numeric `{}` field in quote body", self.field)
    }
}

#[async_trait::async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn fetch_quote(&self) -> Result<f64> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .context("fetch quote endpoint")?
            .error_for_status()
            .context("quote endpoint non-2xx")?;

        let body = resp.text().await.context("read quote body")?;
        self.extract(&body)
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}
