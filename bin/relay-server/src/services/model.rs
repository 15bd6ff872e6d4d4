//! Generative model client seam.
//!
//! [`ChatModel`] opens a [`ChatSession`] primed with prior turns; sending a
//! message yields a [`FragmentStream`], a finite single-pass stream of text
//! fragments. [`GeminiModel`] is the production implementation on top of
//! `genai`; tests substitute a scripted model.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent};
use thiserror::Error;
use tracing::debug;

use crate::entities::Role;

/// Incremental model output. Ends after the last fragment or the first error.
pub type FragmentStream = BoxStream<'static, Result<String, ModelError>>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0}")]
    Client(#[from] genai::Error),

    /// Failure raised by the scripted test model.
    #[cfg(test)]
    #[error("{0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimingRole {
    System,
    User,
    Model,
}

impl From<Role> for PrimingRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => PrimingRole::User,
            Role::Model => PrimingRole::Model,
        }
    }
}

/// One entry of the history a chat session is seeded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimingEntry {
    pub role: PrimingRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    /// Cap on reply length in tokens.
    pub max_output_tokens: u32,
}

pub trait ChatModel: Send + Sync {
    fn start_chat(&self, history: Vec<PrimingEntry>, config: GenerationConfig)
    -> Box<dyn ChatSession>;
}

#[async_trait]
pub trait ChatSession: Send {
    async fn send_message_stream(self: Box<Self>, message: &str)
    -> Result<FragmentStream, ModelError>;
}

// ── genai-backed implementation ──────────────────────────────────────────────

/// Model client for the Gemini family. The API key comes from `GEMINI_API_KEY`.
#[derive(Clone)]
pub struct GeminiModel {
    client: Client,
    model_name: String,
}

impl GeminiModel {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model_name: model_name.into(),
        }
    }
}

impl ChatModel for GeminiModel {
    fn start_chat(
        &self,
        history: Vec<PrimingEntry>,
        config: GenerationConfig,
    ) -> Box<dyn ChatSession> {
        let messages = history.into_iter().map(to_chat_message).collect();
        Box::new(GeminiSession {
            client: self.client.clone(),
            model_name: self.model_name.clone(),
            messages,
            options: ChatOptions::default().with_max_tokens(config.max_output_tokens),
        })
    }
}

struct GeminiSession {
    client: Client,
    model_name: String,
    messages: Vec<ChatMessage>,
    options: ChatOptions,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send_message_stream(
        self: Box<Self>,
        message: &str,
    ) -> Result<FragmentStream, ModelError> {
        let GeminiSession {
            client,
            model_name,
            mut messages,
            options,
        } = *self;
        messages.push(ChatMessage::user(message));
        debug!(model = %model_name, turns = messages.len(), "opening model stream");

        let response = client
            .exec_chat_stream(model_name.as_str(), ChatRequest::new(messages), Some(&options))
            .await?;

        let fragments = response.stream.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => Some(Ok(chunk.content)),
                Ok(_) => None,
                Err(e) => Some(Err(ModelError::from(e))),
            }
        });
        Ok(fragments.boxed())
    }
}

fn to_chat_message(entry: PrimingEntry) -> ChatMessage {
    match entry.role {
        PrimingRole::System => ChatMessage::system(entry.text),
        PrimingRole::User => ChatMessage::user(entry.text),
        PrimingRole::Model => ChatMessage::assistant(entry.text),
    }
}


/// Scripted [`ChatModel`] for tests: replays fixed fragments and records
/// what it was primed with.
#[cfg(test)]
pub(crate) mod scripted {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone)]
    pub enum Script {
        /// Emit every fragment, then end.
        Reply(Vec<&'static str>),
        /// Emit the fragments, then fail.
        FailAfter(Vec<&'static str>, &'static str),
        /// Refuse to open the stream.
        Refuse(&'static str),
    }

    #[derive(Debug, Default)]
    pub struct Calls {
        pub history: Vec<PrimingEntry>,
        pub message: Option<String>,
        pub max_output_tokens: Option<u32>,
    }

    #[derive(Clone)]
    pub struct ScriptedModel {
        script: Script,
        pub calls: Arc<Mutex<Calls>>,
    }

    impl ScriptedModel {
        pub fn new(script: Script) -> Self {
            Self {
                script,
                calls: Arc::default(),
            }
        }
    }

    impl ChatModel for ScriptedModel {
        fn start_chat(
            &self,
            history: Vec<PrimingEntry>,
            config: GenerationConfig,
        ) -> Box<dyn ChatSession> {
            {
                let mut calls = self.calls.lock().unwrap();
                calls.history = history;
                calls.max_output_tokens = Some(config.max_output_tokens);
            }
            Box::new(self.clone())
        }
    }

    #[async_trait]
    impl ChatSession for ScriptedModel {
        async fn send_message_stream(
            self: Box<Self>,
            message: &str,
        ) -> Result<FragmentStream, ModelError> {
            let this = *self;
            this.calls.lock().unwrap().message = Some(message.to_owned());
            let items: Vec<Result<String, ModelError>> = match this.script {
                Script::Reply(parts) => parts.into_iter().map(|p| Ok(p.to_owned())).collect(),
                Script::FailAfter(parts, error) => parts
                    .into_iter()
                    .map(|p| Ok(p.to_owned()))
                    .chain(std::iter::once(Err(ModelError::Upstream(error.into()))))
                    .collect(),
                Script::Refuse(error) => return Err(ModelError::Upstream(error.into())),
            };
            Ok(futures::stream::iter(items).boxed())
        }
    }
}
