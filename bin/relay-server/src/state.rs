//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::entities::SqlStore;
use crate::services::model::{ChatModel, GenerationConfig};
use crate::services::relay::RelaySettings;

/// Process-wide handles, built once at startup. Handlers share them but
/// keep no other state between requests.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Turn store; the only source of truth for history.
    pub store: Arc<SqlStore>,
    /// Generative model client.
    pub model: Arc<dyn ChatModel>,
}

impl AppState {
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            priming_prompt: self.config.priming_prompt.clone(),
            generation: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}
