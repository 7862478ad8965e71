//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use licita_chat::{DocumentPayload, GeminiClient, GeminiConfig, SummaryData};
use licita_core::LicitaConfig;
use licita_highlight::{ConversationLog, RenderedMessage};
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, info, warn};

/// First AI message of a session, once the summary is ready.
pub const SUMMARY_READY_MESSAGE: &str =
    "Resumo do edital gerado. Agora você pode fazer perguntas sobre o documento.";
/// AI message appended when a question cannot be answered.
pub const APOLOGY_MESSAGE: &str = "Desculpe, não consegui processar sua pergunta.";
pub const NO_DOCUMENT_MESSAGE: &str = "Nenhum arquivo foi processado para o chat.";
pub const BUSY_MESSAGE: &str = "Aguarde o processamento atual terminar.";

/// One user's working state: the uploaded notice, its summary, the chat.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: String,
    pub document: Option<DocumentPayload>,
    pub summary: Option<SummaryData>,
    pub log: ConversationLog,
    pub summarizing: bool,
    pub answering: bool,
    pub error: Option<String>,
    /// Bumped on every reset; results computed for an older generation are dropped.
    pub generation: u64,
    /// Last time a request touched the session.
    pub last_active: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            document: None,
            summary: None,
            log: ConversationLog::new(),
            summarizing: false,
            answering: false,
            error: None,
            generation: 0,
            last_active: Instant::now(),
        }
    }

    /// Forget the document, summary and transcript.
    pub fn reset(&mut self) {
        self.document = None;
        self.summary = None;
        self.log.clear();
        self.summarizing = false;
        self.answering = false;
        self.error = None;
        self.generation += 1;
    }

    pub fn is_busy(&self) -> bool {
        self.summarizing || self.answering
    }

    /// Questions are accepted once a summary exists and nothing is in flight.
    pub fn chat_enabled(&self) -> bool {
        self.summary.is_some() && self.document.is_some() && !self.is_busy()
    }

    pub fn transcript(&self) -> Vec<RenderedMessage> {
        self.log.render()
    }

    /// Most recent message, rendered with highlighting.
    pub fn last_rendered(&self) -> Option<RenderedMessage> {
        self.log.render().pop()
    }

    /// Full JSON view of the session.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "createdAt": self.created_at,
            "file": self.document.as_ref().map(|d| json!({
                "filename": d.filename,
                "mimeType": d.mime_type,
                "size": d.size,
                "sizeMb": d.size_mb(),
            })),
            "summary": self.summary,
            "isSummarizing": self.summarizing,
            "isAnswering": self.answering,
            "chatEnabled": self.chat_enabled(),
            "error": self.error,
            "messages": self.transcript(),
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: LicitaConfig,
    pub gemini_config: RwLock<GeminiConfig>,
    pub http: reqwest::Client,
    pub sessions: RwLock<HashMap<String, Session>>,
}

impl AppState {
    pub fn new(config: LicitaConfig) -> Self {
        let gemini_config = GeminiConfig::load(&config.data_paths.llm_config_file);
        if gemini_config.api_key.is_none() {
            warn!("No Gemini API key configured; set GEMINI_API_KEY or PUT /api/config");
        }

        Self {
            config,
            gemini_config: RwLock::new(gemini_config),
            http: reqwest::Client::new(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Client for the configured model, if a key is set.
    pub fn gemini_client(&self) -> Option<GeminiClient> {
        let resolved = self.gemini_config.read().resolve()?;
        Some(GeminiClient::new(self.http.clone(), resolved))
    }

    pub fn create_session(&self) -> Session {
        let session = Session::new();
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        info!(session = %session.id, "Session created");
        session
    }

    /// Run `f` on a session under the write lock. `None` if it does not exist.
    ///
    /// Never hold the result across an `.await` that needs the lock again.
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.write().get_mut(id).map(|s| {
            s.last_active = Instant::now();
            f(s)
        })
    }

    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drop sessions idle for longer than `ttl`. Busy sessions are kept.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.is_busy() || s.last_active.elapsed() <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }
}

/// Periodically evict sessions idle for longer than the configured TTL.
pub fn start_session_sweeper(state: Arc<AppState>) {
    let ttl = Duration::from_secs(state.config.session_ttl_secs);
    let period = (ttl / 4).max(Duration::from_secs(30));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        info!("Session sweeper started (ttl {}s, every {}s)", ttl.as_secs(), period.as_secs());

        loop {
            ticker.tick().await;
            debug!("Sweeping idle sessions");
            state.evict_idle(ttl);
        }
    });
}

/// Which in-flight flag a [`SessionTask`] owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Summarize,
    Answer,
}

/// Ownership of a session's busy flag across an AI call.
///
/// `finish` writes the result back; dropping an unfinished task (client went
/// away mid-request) only clears the flag. Both are no-ops if the session
/// was reset in the meantime.
pub struct SessionTask {
    state: Arc<AppState>,
    session_id: String,
    generation: u64,
    kind: TaskKind,
    finished: bool,
}

impl SessionTask {
    /// Mark the session busy. Fails if missing or already busy.
    ///
    /// `prepare` runs under the same lock, after the busy check and before
    /// the flag is set. The task owns the generation `prepare` leaves.
    pub fn start_with<R>(
        state: &Arc<AppState>,
        session_id: &str,
        kind: TaskKind,
        prepare: impl FnOnce(&mut Session) -> R,
    ) -> Result<(Self, R), TaskRejected> {
        let (generation, prepared) = state
            .with_session(session_id, |s| {
                if s.is_busy() {
                    return Err(TaskRejected::Busy);
                }
                let prepared = prepare(s);
                match kind {
                    TaskKind::Summarize => s.summarizing = true,
                    TaskKind::Answer => s.answering = true,
                }
                Ok((s.generation, prepared))
            })
            .ok_or(TaskRejected::NotFound)??;

        let task = Self {
            state: state.clone(),
            session_id: session_id.to_string(),
            generation,
            kind,
            finished: false,
        };
        Ok((task, prepared))
    }

    fn clear_flag(&self, session: &mut Session) {
        match self.kind {
            TaskKind::Summarize => session.summarizing = false,
            TaskKind::Answer => session.answering = false,
        }
    }

    /// Clear the flag and apply `f`, unless the session moved on.
    pub fn finish<R>(mut self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.finished = true;
        let generation = self.generation;
        self.state
            .with_session(&self.session_id, |s| {
                if s.generation != generation {
                    return None;
                }
                self.clear_flag(s);
                Some(f(s))
            })
            .flatten()
    }
}

impl Drop for SessionTask {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(session = %self.session_id, kind = ?self.kind, "AI task abandoned");
        let generation = self.generation;
        self.state.with_session(&self.session_id, |s| {
            if s.generation == generation {
                self.clear_flag(s);
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRejected {
    NotFound,
    Busy,
}
