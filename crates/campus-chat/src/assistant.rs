//! Assistant: the upward entry point for one user turn.
//!
//! Validates the message, resolves the session, classifies, dispatches,
//! and hands the generative stream to the streamer.

use std::sync::Arc;
use std::time::Duration;

use campus_core::config::ChatConfig;
use campus_core::Intent;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::{Classifier, TextStream};
use crate::context::Context;
use crate::dispatcher::Dispatcher;
use crate::error::{ChatError, GenerativeError};
use crate::session::{SessionGuard, SessionStore};
use crate::streamer::{collect_response, spawn_turn_stream, PendingTurn, TurnStream};

/// Delay before the single retry of opening a generation stream.
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Coordinates classification, dispatch, sessions, and streaming.
pub struct Assistant {
    classifier: Arc<dyn Classifier>,
    dispatcher: Dispatcher,
    sessions: Arc<SessionStore>,
    config: ChatConfig,
}

impl Assistant {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        dispatcher: Dispatcher,
        sessions: Arc<SessionStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Handle one user turn and stream the answer.
    ///
    /// Per-source failures are folded into the answer. Only a generative
    /// failure to start streaming, after one retry, is returned as an error.
    pub async fn handle_turn(
        &self,
        text: &str,
        session_id: Option<Uuid>,
        voice: bool,
    ) -> Result<TurnStream, ChatError> {
        self.validate(text)?;

        let (sid, session) = self.sessions.get_or_create(session_id)?;
        let intent = self.classify(text);
        info!(session_id = %sid, intent = %intent, voice, "Handling turn");

        let mut context = self.dispatcher.dispatch(text, &intent, sid).await;
        if voice {
            context = context.with_voice(self.config.voice_sentence_limit as usize);
        }

        let mut guard = self.sessions.lock(&session).await;
        let stream = match open_with_retry(&mut guard, &context).await {
            Ok(stream) => stream,
            Err(e) => {
                drop(guard);
                if session_id != Some(sid) {
                    self.sessions.discard_unused(sid)?;
                }
                return Err(e.into());
            }
        };
        let pending = PendingTurn {
            user: text.to_string(),
            prompt: context.render_prompt(),
        };
        let idle = Duration::from_secs(self.config.stream_idle_timeout_secs);
        Ok(spawn_turn_stream(guard, pending, stream, idle))
    }

    /// Handle one turn and wait for the full answer.
    pub async fn respond(
        &self,
        text: &str,
        session_id: Option<Uuid>,
        voice: bool,
    ) -> Result<(String, Uuid), ChatError> {
        let stream = self.handle_turn(text, session_id, voice).await?;
        collect_response(stream).await
    }

    fn validate(&self, text: &str) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }
        Ok(())
    }

    fn classify(&self, text: &str) -> Intent {
        match self.classifier.classify(text) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "Classifier unavailable; treating as a general question");
                Intent::empty()
            }
        }
    }
}

async fn open_with_retry(
    guard: &mut SessionGuard,
    context: &Context,
) -> Result<TextStream, GenerativeError> {
    match guard.stream(context).await {
        Ok(stream) => Ok(stream),
        Err(first) => {
            warn!(session_id = %guard.session_id(), error = %first, "Generation failed to start; retrying once");
            tokio::time::sleep(RETRY_DELAY).await;
            guard.stream(context).await
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("dispatcher", &self.dispatcher)
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
