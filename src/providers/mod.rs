// src/providers/mod.rs
pub mod http;
pub mod sim;

use anyhow::Result;

/// One quote endpoint. The selector only ever sees this trait, so tests can
/// supply deterministic fakes instead of random timing/failure.
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch a single scalar quote, or fail with a generic error.
    async fn fetch_quote(&self) -> Result<f64>;

    /// Id of the source this provider serves; must match `Source::id`.
    fn source_id(&self) -> &str;
}

// --- Test helper ---

/// Deterministic provider driven by a script of outcomes (`Some` = value,
/// `None` = failure). Once the script is drained, `fallback` repeats forever.
pub struct ScriptedProvider {
    source_id: String,
    steps: std::sync::Mutex<std::collections::VecDeque<Option<f64>>>,
    fallback: Option<f64>,
}

impl ScriptedProvider {
    pub fn ok(source_id: impl Into<String>, value: f64) -> Self {
        Self::script(source_id, Vec::new(), Some(value))
    }

    pub fn failing(source_id: impl Into<String>) -> Self {
        Self::script(source_id, Vec::new(), None)
    }

    pub fn script(
        source_id: impl Into<String>,
        steps: Vec<Option<f64>>,
        fallback: Option<f64>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            steps: std::sync::Mutex::new(steps.into()),
            fallback,
        }
    }
}

#[async_trait::async_trait]
impl QuoteProvider for ScriptedProvider {
    async fn fetch_quote(&self) -> Result<f64> {
        let step = {
            let mut steps = self.steps.lock().expect("script mutex poisoned");
            steps.pop_front().unwrap_or(self.fallback)
        };
        match step {
            Some(v) => Ok(v),
            None => Err(anyhow::anyhow!("scripted failure for {}", self.source_id)),
        }
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}
