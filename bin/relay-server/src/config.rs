//! Server configuration, loaded from environment variables at startup.

/// Instruction placed ahead of every priming history. Never persisted.
pub const DEFAULT_PRIMING_PROMPT: &str =
    "Respond in a clear, informal tone and keep every answer under 500 characters.";

/// Runtime configuration for relay-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set. The model API key is not part of
/// this struct: the model client reads `GEMINI_API_KEY` itself.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:$PORT"`, `PORT` defaulting to 3000).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://relay.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Model identifier handed to the model client.
    pub model_name: String,

    /// Output token budget for each model reply.
    pub max_output_tokens: u32,

    /// Tone / length instruction prepended to every priming history.
    pub priming_prompt: String,

    /// Comma-separated allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let port = env_or("PORT", "3000");
        Self {
            bind_address: env_or("RELAY_BIND", &format!("0.0.0.0:{port}")),
            database_url: env_or("RELAY_DATABASE_URL", "sqlite://relay.db?mode=rwc"),
            log_level: env_or("RELAY_LOG", "info"),
            log_json: env_flag("RELAY_LOG_JSON", false),
            model_name: env_or("RELAY_MODEL", "gemini-2.5-flash-lite"),
            max_output_tokens: parse_env("RELAY_MAX_OUTPUT_TOKENS", 300),
            priming_prompt: env_or("RELAY_PRIMING_PROMPT", DEFAULT_PRIMING_PROMPT),
            cors_allowed_origins: std::env::var("RELAY_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            enable_docs: env_flag("RELAY_ENABLE_DOCS", true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
