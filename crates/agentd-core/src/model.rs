//! Model factory: one shared genai client per factory, pointed at Ollama.

use std::sync::{Arc, OnceLock};

use genai::resolver::{AuthData, Endpoint};
use genai::Client;

/// Environment-driven model settings, both defaulted when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub model: String,
    pub base_url: String,
}

impl ModelSettings {
    pub const DEFAULT_MODEL: &'static str = "llama3.2:1b";
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    /// Read `OLLAMA_MODEL` and `OLLAMA_BASE_URL` from the environment.
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("OLLAMA_MODEL").ok(),
            std::env::var("OLLAMA_BASE_URL").ok(),
        )
    }

    /// Apply defaults to optional overrides. Empty strings count as unset.
    pub fn resolve(model: Option<String>, base_url: Option<String>) -> Self {
        let pick = |v: Option<String>, default: &str| match v {
            Some(s) if !s.is_empty() => s,
            _ => default.to_string(),
        };
        Self {
            model: pick(model, Self::DEFAULT_MODEL),
            base_url: pick(base_url, Self::DEFAULT_BASE_URL),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

/// Builds and memoizes the shared model client.
///
/// The factory lives in the application state and hands out the same
/// client on every call; connection failures surface at first use, not at
/// construction.
pub struct ModelFactory {
    settings: ModelSettings,
    client: OnceLock<Arc<Client>>,
}

impl ModelFactory {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
        }
    }

    /// The configured model name, passed to the client per request.
    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// The shared client. Constructed exactly once per factory.
    pub fn client(&self) -> Arc<Client> {
        self.client
            .get_or_init(|| {
                let endpoint = self.settings.base_url.clone();
                let client = Client::builder()
                    .with_service_target_resolver_fn(move |mut t: genai::ServiceTarget| {
                        t.endpoint = Endpoint::from_owned(&*endpoint);
                        t.auth = AuthData::from_single("ollama");
                        Ok(t)
                    })
                    .build();
                Arc::new(client)
            })
            .clone()
    }
}
