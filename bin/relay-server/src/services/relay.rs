//! Streaming relay between the caller and the model.
//!
//! [`open_stream`] runs every step that can still fail with a proper HTTP
//! status (history load, user-turn write, opening the model stream) before
//! returning. From then on a spawned task forwards fragments to the caller
//! through a bounded channel while accumulating the full reply, and writes
//! the model turn once the upstream stream is exhausted.
//!
//! Only a fully drained reply is persisted. An upstream failure mid-stream
//! or a caller disconnect drops the partial text; the caller-facing body
//! simply ends.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::entities::{Role, Turn, TurnStore};
use crate::error::ServerError;
use crate::services::model::{ChatModel, FragmentStream, GenerationConfig};
use crate::services::{history, persist};

/// Fragments in flight between the model task and the response body.
const FRAGMENT_BUFFER: usize = 16;

/// A validated chat exchange request.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub session_id: String,
    pub message: String,
}

impl RelayRequest {
    /// Both fields are required; blank values count as missing.
    pub fn new(session_id: Option<String>, message: Option<String>) -> Result<Self, ServerError> {
        match (non_blank(session_id), non_blank(message)) {
            (Some(session_id), Some(message)) => Ok(Self {
                session_id,
                message,
            }),
            _ => Err(ServerError::BadRequest("Missing message or sessionId".into())),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub priming_prompt: String,
    pub generation: GenerationConfig,
}

/// How a relay ended, reported by the background task.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Stream drained and the model turn was written.
    Persisted(Turn),
    /// Stream drained but the model-turn write failed. The user turn stands.
    PersistFailed(String),
    /// The model failed after `forwarded` fragments.
    UpstreamFailed { forwarded: usize, error: String },
    /// The caller went away after `forwarded` fragments.
    Disconnected { forwarded: usize },
}

impl RelayOutcome {
    /// Emit one record describing how the relay ended.
    pub fn log(&self) {
        match self {
            RelayOutcome::Persisted(turn) => {
                info!(turn_id = %turn.id, len = turn.content.len(), "model turn persisted")
            }
            RelayOutcome::PersistFailed(e) => error!(error = %e, "failed to persist model turn"),
            RelayOutcome::UpstreamFailed { forwarded, error } => warn!(
                forwarded,
                error = %error,
                "model stream failed; partial reply not persisted"
            ),
            RelayOutcome::Disconnected { forwarded } => {
                warn!(forwarded, "caller disconnected; partial reply not persisted")
            }
        }
    }
}

pub struct RelayStream {
    /// Fragments in model order, for the response body.
    pub fragments: ReceiverStream<String>,
    /// Resolves once forwarding and persistence are done.
    pub completion: JoinHandle<RelayOutcome>,
}

/// Wait for a relay task to finish and log its outcome.
///
/// Returns `None` when the task panicked or was cancelled.
pub async fn report(completion: JoinHandle<RelayOutcome>) -> Option<RelayOutcome> {
    match completion.await {
        Ok(outcome) => {
            outcome.log();
            Some(outcome)
        }
        Err(e) => {
            error!(error = %e, "relay task did not complete");
            None
        }
    }
}

pub async fn open_stream<S: TurnStore>(
    store: Arc<S>,
    model: &dyn ChatModel,
    settings: &RelaySettings,
    request: RelayRequest,
) -> Result<RelayStream, ServerError> {
    let RelayRequest {
        session_id,
        message,
    } = request;

    let priming =
        history::load_priming_history(store.as_ref(), &session_id, &settings.priming_prompt)
            .await?;

    // The user turn is durable before the model sees it.
    persist::persist_turn(store.as_ref(), &session_id, Role::User, message.clone()).await?;

    let session = model.start_chat(priming, settings.generation);
    let upstream = session.send_message_stream(&message).await?;

    let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
    let span = info_span!("relay", session_id = %session_id);
    let completion = tokio::spawn(forward(store, session_id, upstream, tx).instrument(span));

    Ok(RelayStream {
        fragments: ReceiverStream::new(rx),
        completion,
    })
}

async fn forward<S: TurnStore>(
    store: Arc<S>,
    session_id: String,
    mut upstream: FragmentStream,
    tx: mpsc::Sender<String>,
) -> RelayOutcome {
    let mut full_response = String::new();
    let mut forwarded = 0usize;

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                return RelayOutcome::Disconnected { forwarded };
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                if fragment.is_empty() {
                    continue;
                }
                full_response.push_str(&fragment);
                if tx.send(fragment).await.is_err() {
                    return RelayOutcome::Disconnected { forwarded };
                }
                forwarded += 1;
            }
            Some(Err(e)) => {
                return RelayOutcome::UpstreamFailed {
                    forwarded,
                    error: e.to_string(),
                };
            }
            None => break,
        }
    }

    // Close the caller-facing body before the write.
    drop(tx);
    debug!(forwarded, len = full_response.len(), "model stream drained");

    match persist::persist_turn(store.as_ref(), &session_id, Role::Model, full_response).await {
        Ok(turn) => RelayOutcome::Persisted(turn),
        Err(e) => RelayOutcome::PersistFailed(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    use super::*;
    use crate::entities::{NewTurn, SqlStore};
    use crate::services::grouping::group_conversations;
    use crate::services::history::load_session_turns;
    use crate::services::model::PrimingRole;
    use crate::services::model::scripted::{Script, ScriptedModel};

    fn settings() -> RelaySettings {
        RelaySettings {
            priming_prompt: "be brief".into(),
            generation: GenerationConfig {
                max_output_tokens: 300,
            },
        }
    }

    fn request(session: &str, message: &str) -> RelayRequest {
        RelayRequest::new(Some(session.into()), Some(message.into())).unwrap()
    }

    async fn store() -> Arc<SqlStore> {
        Arc::new(SqlStore::connect("sqlite::memory:").await.unwrap())
    }

    /// Accepts user turns but fails every model-turn write.
    struct FailModelWrites(SqlStore);

    impl TurnStore for FailModelWrites {
        async fn insert_turn(&self, turn: NewTurn) -> Result<Turn, sqlx::Error> {
            if turn.role == Role::Model {
                return Err(sqlx::Error::PoolClosed);
            }
            self.0.insert_turn(turn).await
        }

        async fn list_turns(&self, session_id: &str) -> Result<Vec<Turn>, sqlx::Error> {
            self.0.list_turns(session_id).await
        }

        async fn get_turn(&self, id: &str) -> Result<Option<Turn>, sqlx::Error> {
            self.0.get_turn(id).await
        }
    }

    #[test]
    fn missing_or_blank_fields_are_rejected() {
        for (session, message) in [
            (None, Some("hi")),
            (Some("s"), None),
            (Some("  "), Some("hi")),
            (Some("s"), Some("")),
        ] {
            let err = RelayRequest::new(session.map(Into::into), message.map(Into::into))
                .unwrap_err();
            assert!(matches!(err, ServerError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn forwards_fragments_in_order_and_persists_full_reply() {
        let store = store().await;
        let model = ScriptedModel::new(Script::Reply(vec!["Hel", "", "lo", " there"]));

        let relay = open_stream(store.clone(), &model, &settings(), request("s", "Hi"))
            .await
            .unwrap();
        let received: Vec<String> = relay.fragments.collect().await;
        assert_eq!(received, ["Hel", "lo", " there"]);

        match report(relay.completion).await.expect("relay task completes") {
            RelayOutcome::Persisted(turn) => {
                assert_eq!(turn.role, Role::Model);
                assert_eq!(turn.content, "Hello there");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let turns = load_session_turns(store.as_ref(), "s").await.unwrap();
        let flat: Vec<_> = turns.iter().map(|t| (t.role, t.content.as_str())).collect();
        assert_eq!(flat, [(Role::User, "Hi"), (Role::Model, "Hello there")]);
    }

    #[tokio::test]
    async fn model_is_primed_with_prior_turns_but_not_the_new_message() {
        let store = store().await;
        persist::persist_turn(store.as_ref(), "s", Role::User, "first".into()).await.unwrap();
        persist::persist_turn(store.as_ref(), "s", Role::Model, "reply".into()).await.unwrap();

        let model = ScriptedModel::new(Script::Reply(vec!["ok"]));
        let relay = open_stream(store.clone(), &model, &settings(), request("s", "second"))
            .await
            .unwrap();
        let _: Vec<String> = relay.fragments.collect().await;
        relay.completion.await.unwrap();

        let calls = model.calls.lock().unwrap();
        let primed: Vec<_> = calls.history.iter().map(|e| (e.role, e.text.as_str())).collect();
        assert_eq!(
            primed,
            [
                (PrimingRole::System, "be brief"),
                (PrimingRole::User, "first"),
                (PrimingRole::Model, "reply"),
            ]
        );
        assert_eq!(calls.message.as_deref(), Some("second"));
        assert_eq!(calls.max_output_tokens, Some(300));
    }

    #[tokio::test]
    async fn refused_stream_is_an_error_but_user_turn_stands() {
        let store = store().await;
        let model = ScriptedModel::new(Script::Refuse("model unavailable"));

        let err = open_stream(store.clone(), &model, &settings(), request("s", "Hi"))
            .await
            .err()
            .expect("open_stream should fail");
        assert!(matches!(err, ServerError::Model(_)));

        let turns = load_session_turns(store.as_ref(), "s").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test]
    async fn mid_stream_failure_drops_partial_reply() {
        let store = store().await;
        let model = ScriptedModel::new(Script::FailAfter(vec!["par", "tial"], "connection reset"));

        let relay = open_stream(store.clone(), &model, &settings(), request("s", "Hi"))
            .await
            .unwrap();
        let received: Vec<String> = relay.fragments.collect().await;
        assert_eq!(received.concat(), "partial");

        match relay.completion.await.unwrap() {
            RelayOutcome::UpstreamFailed { forwarded, error } => {
                assert_eq!(forwarded, 2);
                assert!(error.contains("connection reset"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let turns = load_session_turns(store.as_ref(), "s").await.unwrap();
        assert_eq!(turns.len(), 1);
    }

    #[tokio::test]
    async fn caller_disconnect_stops_forwarding() {
        let store = store().await;
        let model = ScriptedModel::new(Script::Reply(vec!["a"; 64]));

        let relay = open_stream(store.clone(), &model, &settings(), request("s", "Hi"))
            .await
            .unwrap();
        drop(relay.fragments);

        match relay.completion.await.unwrap() {
            RelayOutcome::Disconnected { forwarded } => assert!(forwarded < 64),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let turns = load_session_turns(store.as_ref(), "s").await.unwrap();
        assert_eq!(turns.len(), 1);
    }

    #[tokio::test]
    async fn failed_model_write_leaves_a_one_message_conversation() {
        let store = Arc::new(FailModelWrites(
            SqlStore::connect("sqlite::memory:").await.unwrap(),
        ));
        let model = ScriptedModel::new(Script::Reply(vec!["Hello"]));

        let relay = open_stream(store.clone(), &model, &settings(), request("s", "Hi"))
            .await
            .unwrap();
        let received: Vec<String> = relay.fragments.collect().await;
        assert_eq!(received.concat(), "Hello");

        match report(relay.completion).await.expect("relay task completes") {
            RelayOutcome::PersistFailed(error) => assert!(error.contains("database error")),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let turns = load_session_turns(store.as_ref(), "s").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);

        let conversations = group_conversations(&turns);
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, turns[0].id);
        assert_eq!(conversations[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error_and_model_is_not_called() {
        let store = store().await;
        store.close().await;
        let model = ScriptedModel::new(Script::Reply(vec!["unused"]));

        let err = open_stream(store.clone(), &model, &settings(), request("s", "Hi"))
            .await
            .err()
            .expect("open_stream should fail");
        assert!(matches!(err, ServerError::Database(_)));
        assert!(model.calls.lock().unwrap().message.is_none());

        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }
}
