//! Scriptable suggestion generator for orchestration tests

use async_trait::async_trait;
use perftriage_engine::models::SuggestionRequest;
use perftriage_engine::workflow::{GeneratorError, SuggestionGenerator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the generator does for one endpoint
#[derive(Debug, Clone)]
pub enum GeneratorScript {
    /// Return this text after `delay`
    Reply { text: String, delay: Duration },
    /// Fail with this error
    Fail(GeneratorError),
    /// Never answer
    Hang,
}

/// Generator driven by a per-endpoint script
///
/// Endpoints without a script get `default`. Tracks peak concurrency.
pub struct ScriptedGenerator {
    scripts: HashMap<String, GeneratorScript>,
    default: GeneratorScript,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(default: GeneratorScript) -> Self {
        Self {
            scripts: HashMap::new(),
            default,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, endpoint_id: &str, script: GeneratorScript) -> Self {
        self.scripts.insert(endpoint_id.to_string(), script);
        self
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SuggestionGenerator for ScriptedGenerator {
    async fn generate(&self, request: &SuggestionRequest) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let script = self
            .scripts
            .get(request.endpoint_id())
            .unwrap_or(&self.default)
            .clone();

        match script {
            GeneratorScript::Reply { text, delay } => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            GeneratorScript::Fail(e) => Err(e),
            GeneratorScript::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
