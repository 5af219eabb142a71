//! Chat controller: sessions, turns, and the view they drive
//!
//! A turn runs in three steps so the slow part never holds the controller:
//!
//! 1. [`ChatManager::begin_turn`] records the user message, locks input and
//!    returns a [`PendingTurn`] tagged with its session.
//! 2. [`PendingTurn::resolve`] waits out the casual delay or calls the
//!    recommendation service. It borrows nothing from the controller.
//! 3. [`ChatManager::finish_turn`] applies the outcome and unlocks input,
//!    whatever the outcome was.
//!
//! [`ChatManager::submit`] chains the three for callers that can wait.

use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;

use crate::classify;
use crate::client::{RecommendationRequest, RecommendationResponse, RecommendationService};
use crate::context::SessionContext;
use crate::error::{ChatError, ChatResult};
use crate::models::{self, Message, Role, SessionCollection};
use crate::render::{self, SessionEntry, Transcript};
use crate::store::ChatStore;
use crate::sync::SyncClient;

/// Shown when a remote turn fails
pub const ERROR_NOTICE: &str = "Sorry, something went wrong. Please try again.";

/// Default time the thinking indicator stays up for small talk
pub const CASUAL_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
}

/// Everything the surface needs to draw the active chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub transcript: Transcript,
    pub thinking: bool,
    pub input_enabled: bool,
}

impl Default for ChatView {
    fn default() -> Self {
        Self {
            transcript: Transcript::default(),
            thinking: false,
            input_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnKind {
    /// Small talk, answered locally
    Casual,
    Remote(RecommendationRequest),
}

/// A submitted turn waiting for its answer
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    pub session_id: String,
    pub query: String,
    pub kind: TurnKind,
}

#[derive(Debug)]
pub enum TurnOutcome {
    Casual {
        session_id: String,
        reply: &'static str,
    },
    Answered {
        session_id: String,
        query: String,
        response: RecommendationResponse,
    },
    Failed {
        session_id: String,
        error: ChatError,
    },
}

impl TurnOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            TurnOutcome::Casual { session_id, .. }
            | TurnOutcome::Answered { session_id, .. }
            | TurnOutcome::Failed { session_id, .. } => session_id,
        }
    }
}

impl PendingTurn {
    pub async fn resolve(
        self,
        service: &dyn RecommendationService,
        casual_delay: Duration,
    ) -> TurnOutcome {
        match self.kind {
            TurnKind::Casual => {
                tokio::time::sleep(casual_delay).await;
                TurnOutcome::Casual {
                    session_id: self.session_id,
                    reply: classify::casual_response(&self.query),
                }
            }
            TurnKind::Remote(request) => match service.recommend(&request).await {
                Ok(response) => TurnOutcome::Answered {
                    session_id: self.session_id,
                    query: self.query,
                    response,
                },
                Err(error) => TurnOutcome::Failed {
                    session_id: self.session_id,
                    error,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    Casual,
    Answered { recommendations: usize },
    Failed(String),
    /// The session was deleted while the turn was in flight
    Discarded,
}

/// What a finished turn did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub session_id: String,
    /// The user had moved to another session by the time it finished
    pub stale: bool,
    pub result: TurnResult,
}

/// Owns the chat collection, per-session context and the active view
#[derive(Debug)]
pub struct ChatManager {
    store: ChatStore,
    contexts: HashMap<String, SessionContext>,
    active_id: String,
    phase: TurnPhase,
    pending_delete: Option<String>,
    last_query: Option<String>,
    /// Highest id handed out so far; deleted ids are never reused
    last_issued: i64,
    sync: SyncClient,
    casual_delay: Duration,
    view: ChatView,
}

impl ChatManager {
    /// Resume the newest stored chat, or start one
    pub fn open(store: ChatStore, sync: SyncClient) -> ChatResult<Self> {
        let chats = store.load();
        let mut manager = Self {
            store,
            contexts: HashMap::new(),
            active_id: String::new(),
            phase: TurnPhase::Idle,
            pending_delete: None,
            last_query: None,
            last_issued: i64::MIN,
            sync,
            casual_delay: CASUAL_DELAY,
            view: ChatView::default(),
        };

        match models::newest_session_id(&chats) {
            Some(id) => manager.load_session(&id)?,
            None => {
                manager.new_session()?;
            }
        }
        Ok(manager)
    }

    pub fn with_casual_delay(mut self, delay: Duration) -> Self {
        self.casual_delay = delay;
        self
    }

    pub fn casual_delay(&self) -> Duration {
        self.casual_delay
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn context(&self, session_id: &str) -> Option<&SessionContext> {
        self.contexts.get(session_id)
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn collection(&self) -> SessionCollection {
        self.store.load()
    }

    pub fn messages(&self, session_id: &str) -> Option<Vec<Message>> {
        self.store.messages(session_id)
    }

    /// Sidebar entries, optionally narrowed by a search term
    pub fn session_list(&self, filter: &str) -> Vec<SessionEntry> {
        let entries = render::render_session_list(&self.store.load(), &self.active_id);
        render::filter_sessions(entries, filter)
    }

    // ═══════════════════════════════════════════════════════════════
    // TURNS
    // ═══════════════════════════════════════════════════════════════

    /// Start a turn in the active session.
    ///
    /// Returns `None` for blank input or while another turn is in flight.
    pub fn begin_turn(&mut self, input: &str) -> ChatResult<Option<PendingTurn>> {
        let query = input.trim();
        if query.is_empty() || self.phase != TurnPhase::Idle {
            return Ok(None);
        }

        let session_id = self.active_id.clone();
        self.record(&session_id, Message::user(query))?;

        self.phase = TurnPhase::Sending;
        self.view.input_enabled = false;
        self.view.thinking = true;
        self.last_query = Some(query.to_string());

        let kind = if classify::is_casual_conversation(query) {
            TurnKind::Casual
        } else {
            let is_follow_up = classify::is_follow_up_question(query);
            let context = self
                .contexts
                .get(&session_id)
                .cloned()
                .unwrap_or_default()
                .request_context(query, is_follow_up);
            TurnKind::Remote(RecommendationRequest {
                query: query.to_string(),
                context,
            })
        };

        tracing::debug!(session = %session_id, casual = matches!(kind, TurnKind::Casual), "turn started");
        Ok(Some(PendingTurn {
            session_id,
            query: query.to_string(),
            kind,
        }))
    }

    /// Apply a resolved turn. Input is unlocked even when applying fails.
    pub fn finish_turn(&mut self, outcome: TurnOutcome) -> ChatResult<TurnReport> {
        let result = self.apply_outcome(outcome);

        self.phase = TurnPhase::Idle;
        self.view.thinking = false;
        self.view.input_enabled = true;

        result
    }

    fn apply_outcome(&mut self, outcome: TurnOutcome) -> ChatResult<TurnReport> {
        let session_id = outcome.session_id().to_string();
        let stale = session_id != self.active_id;

        if self.store.messages(&session_id).is_none() {
            tracing::info!(session = %session_id, outcome = ?outcome, "dropping reply for a deleted session");
            return Ok(TurnReport {
                session_id,
                stale,
                result: TurnResult::Discarded,
            });
        }
        if stale {
            tracing::info!(session = %session_id, active = %self.active_id, "turn finished for an inactive session");
        }

        let result = match outcome {
            TurnOutcome::Casual { reply, .. } => {
                self.record(&session_id, Message::assistant(reply))?;
                TurnResult::Casual
            }
            TurnOutcome::Answered { query, response, .. } => {
                let books = response.recommendations.unwrap_or_default();
                self.contexts.entry(session_id.clone()).or_default().record_answer(
                    &query,
                    &response.response,
                    response.category,
                    books.clone(),
                );

                self.record(&session_id, Message::assistant(response.response))?;
                if !books.is_empty() {
                    let message = Message::recommendations(&books)
                        .map_err(|e| ChatError::Storage(e.to_string()))?;
                    self.record(&session_id, message)?;
                }
                TurnResult::Answered {
                    recommendations: books.len(),
                }
            }
            TurnOutcome::Failed { error, .. } => {
                if error.is_remote() {
                    tracing::warn!(session = %session_id, error = %error, "recommendation request failed");
                } else {
                    tracing::error!(session = %session_id, error = %error, "turn failed");
                }
                self.record(&session_id, Message::error(ERROR_NOTICE))?;
                TurnResult::Failed(error.to_string())
            }
        };

        Ok(TurnReport {
            session_id,
            stale,
            result,
        })
    }

    /// Run a whole turn, waiting for the answer
    pub async fn submit(
        &mut self,
        input: &str,
        service: &dyn RecommendationService,
    ) -> ChatResult<Option<TurnReport>> {
        let Some(turn) = self.begin_turn(input)? else {
            return Ok(None);
        };
        let outcome = turn.resolve(service, self.casual_delay).await;
        self.finish_turn(outcome).map(Some)
    }

    /// Send the last query again as a new turn
    pub async fn retry_last(
        &mut self,
        service: &dyn RecommendationService,
    ) -> ChatResult<Option<TurnReport>> {
        match self.last_query.clone() {
            Some(query) => self.submit(&query, service).await,
            None => Ok(None),
        }
    }

    /// Persist a message, mirror it in the view and replicate the chat
    fn record(&mut self, session_id: &str, message: Message) -> ChatResult<()> {
        let chats = self.store.append(session_id, message.clone())?;
        if session_id != self.active_id {
            return Ok(());
        }

        if message.role == Role::Recommendations {
            if let Ok(books) = message.parse_recommendations() {
                self.view.transcript.panel = render::render_recommendations(&books);
            }
        } else {
            self.view.transcript.messages.push(render::render_message(&message));
        }

        if let Some(messages) = chats.get(session_id) {
            self.sync.dispatch(session_id, messages.clone());
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // SESSIONS
    // ═══════════════════════════════════════════════════════════════

    /// Start a fresh chat with the welcome message and make it active
    pub fn new_session(&mut self) -> ChatResult<String> {
        let issued = models::next_session_id(&self.store.load(), self.last_issued, Utc::now());
        self.last_issued = issued;
        let id = issued.to_string();
        self.contexts.insert(id.clone(), SessionContext::default());
        self.active_id = id.clone();
        self.view.transcript = Transcript::default();

        self.record(&id, Message::assistant(render::welcome_message()))?;
        tracing::info!(session = %id, "started new chat");
        Ok(id)
    }

    /// Switch to a stored chat and redraw it
    pub fn load_session(&mut self, session_id: &str) -> ChatResult<()> {
        let messages = self
            .store
            .messages(session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))?;

        self.active_id = session_id.to_string();
        self.contexts.entry(session_id.to_string()).or_default();
        self.view.transcript = render::render_transcript(&messages);
        self.view.input_enabled = self.phase == TurnPhase::Idle;
        self.view.thinking = false;
        tracing::debug!(session = %session_id, messages = messages.len(), "loaded chat");
        Ok(())
    }

    /// Delete a chat. Deleting the active chat starts a new one.
    pub fn delete_session(&mut self, session_id: &str) -> ChatResult<bool> {
        let existed = self.store.delete(session_id)?;
        self.contexts.remove(session_id);
        tracing::info!(session = %session_id, existed, "deleted chat");

        if session_id == self.active_id {
            self.new_session()?;
        }
        Ok(existed)
    }

    /// Remember which chat the confirmation dialog is about
    pub fn request_delete(&mut self, session_id: &str) {
        self.pending_delete = Some(session_id.to_string());
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Delete the chat awaiting confirmation, if any
    pub fn confirm_delete(&mut self) -> ChatResult<Option<String>> {
        match self.pending_delete.take() {
            Some(id) => {
                self.delete_session(&id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // EXPORT / IMPORT
    // ═══════════════════════════════════════════════════════════════

    pub fn export(&self) -> ChatResult<Vec<u8>> {
        self.store.export()
    }

    /// Merge exported chats. Returns the number of chats afterwards.
    pub fn import(&mut self, bytes: &[u8]) -> ChatResult<usize> {
        let before = self.store.messages(&self.active_id);
        let chats = self.store.import(bytes)?;
        tracing::info!(chats = chats.len(), "imported chats");

        let after = chats.get(&self.active_id);
        if after.is_some() && after != before.as_ref() {
            let active = self.active_id.clone();
            self.load_session(&active)?;
            if let Some(messages) = after {
                self.sync.dispatch(&active, messages.clone());
            }
        }
        Ok(chats.len())
    }
}
