//! Conversation manager.
//!
//! Drives one text turn end to end: extract facts from the message, submit
//! them to the session, and phrase whatever the engine reports back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use refund_engine::{
    ConversationSession, DecisionGraph, EngineError, SessionStatus, TurnOutcome, Vocabulary,
};
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::{ChatError, ChatResult};
use crate::extract::{ExtractionContext, FactExtractor, KeywordExtractor};
use crate::persistence::{ConversationExport, ConversationStore};
use crate::profiles::ProfileStore;
use crate::question::{QuestionGenerator, QuestionRequest, TemplateQuestions};
use crate::types::{Message, Reply};

const GREETING: &str = "Hello! I'm here to help with your refund request.";

/// One customer conversation over a [`ConversationSession`].
pub struct ConversationManager {
    session: ConversationSession,
    extractor: Arc<dyn FactExtractor>,
    questions: Arc<dyn QuestionGenerator>,
    store: ConversationStore,
    history: Vec<Message>,
    max_turns: u32,
    /// User messages received since the last reset
    messages: u32,
}

impl ConversationManager {
    pub fn new(
        session: ConversationSession,
        extractor: Arc<dyn FactExtractor>,
        questions: Arc<dyn QuestionGenerator>,
        config: &BotConfig,
    ) -> Self {
        Self {
            session,
            extractor,
            questions,
            store: ConversationStore::new(&config.conversations_dir),
            history: Vec::new(),
            max_turns: config.max_conversation_turns,
            messages: 0,
        }
    }

    /// Keyword extraction and template questions.
    pub fn with_defaults(session: ConversationSession, config: &BotConfig) -> Self {
        Self::new(
            session,
            Arc::new(KeywordExtractor::new()),
            Arc::new(TemplateQuestions::new()),
            config,
        )
    }

    /// Build a manager from configuration: graph file or the bundled
    /// graph, and the customer's profile from `profiles`.
    pub async fn from_config(
        config: &BotConfig,
        profiles: &dyn ProfileStore,
        customer_id: Option<String>,
    ) -> ChatResult<Self> {
        let graph = load_graph(config.graph_file.as_deref())?;
        let profile = profiles.load(customer_id).await?;
        info!(
            "Starting conversation for {} on graph '{}'",
            profile.customer_id,
            graph.id()
        );
        let session = ConversationSession::with_profile(Arc::new(graph), profile)?;
        Ok(Self::with_defaults(session, config))
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Greet the customer and ask the first question.
    pub async fn start(&mut self) -> ChatResult<Reply> {
        let outcome = self.session.current_outcome();
        let body = self.describe(&outcome).await?;
        let text = format!("{}\n{}", GREETING, body);
        self.history.push(Message::assistant(&text));
        Ok(Reply { outcome, text })
    }

    /// Process one customer message.
    pub async fn handle_message(&mut self, text: &str) -> ChatResult<Reply> {
        if self.messages >= self.max_turns {
            warn!("Turn limit of {} reached", self.max_turns);
            return Err(ChatError::TurnLimitReached(self.max_turns));
        }
        self.messages += 1;
        self.history.push(Message::user(text));

        let current = self.session.current_outcome();
        let finished = self.session.navigator().is_finished();

        let context = match &current {
            TurnOutcome::NeedInfo {
                fact_key,
                allowed_values,
                ..
            } => ExtractionContext::expecting(fact_key.clone(), allowed_values.clone()),
            _ => ExtractionContext::default(),
        };

        let facts = match self.extractor.extract(text, &context).await {
            Ok(facts) => facts,
            Err(e) if e.is_recoverable() => {
                warn!("Extraction failed: {}", e);
                Default::default()
            }
            Err(e) => return Err(e),
        };
        debug!("Message yielded facts {:?}", facts.keys().collect::<Vec<_>>());

        if facts.is_empty() {
            let question = self.describe(&current).await?;
            if finished {
                return Ok(self.respond(current, question));
            }
            let text = format!(
                "I couldn't find the information I need in that message. {}",
                question
            );
            return Ok(self.respond(current, text));
        }

        match self.session.submit_facts(&facts) {
            Ok(outcome) => {
                let text = self.describe(&outcome).await?;
                Ok(self.respond(outcome, text))
            }
            Err(e @ EngineError::TraversalFinished(_)) => {
                Ok(self.respond(current, format!("{}.", e)))
            }
            Err(e) if e.is_recoverable() => {
                let question = self.describe(&current).await?;
                let text = format!("That doesn't look right: {}. {}", e, question);
                Ok(self.respond(current, text))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Forget the conversation, keeping the customer profile.
    pub async fn reset(&mut self) -> ChatResult<Reply> {
        self.session.reset();
        self.history.clear();
        self.messages = 0;
        self.history.push(Message::system("Conversation reset"));
        self.start().await
    }

    pub fn status(&self) -> SessionStatus {
        let mut status = self.session.status();
        status.turns = self.messages;
        status
    }

    /// Snapshot of the whole conversation.
    pub fn snapshot(&self) -> ConversationExport {
        ConversationExport {
            customer_data: self.session.profile().cloned(),
            extracted_info: self.session.facts().conversation_facts().clone(),
            conversation_history: self.history.clone(),
            final_state: self.session.current_outcome().status().to_string(),
            audit: self.session.export_trail(),
            export_timestamp: Utc::now(),
        }
    }

    /// Write the conversation to the configured directory.
    pub fn export(&self) -> ChatResult<PathBuf> {
        self.store.save(&self.snapshot())
    }

    fn respond(&mut self, outcome: TurnOutcome, text: String) -> Reply {
        self.history.push(Message::assistant(&text));
        Reply { outcome, text }
    }

    async fn describe(&self, outcome: &TurnOutcome) -> ChatResult<String> {
        match outcome {
            TurnOutcome::NeedInfo {
                node_id,
                fact_key,
                question,
                allowed_values,
                ..
            } => {
                let request = QuestionRequest {
                    node_id: node_id.clone(),
                    fact_key: fact_key.clone(),
                    prompt: question.clone(),
                    allowed_values: allowed_values.clone(),
                };
                match self.questions.ask(&request).await {
                    Ok(text) => Ok(text),
                    Err(e) if e.is_recoverable() => {
                        warn!("Question generation failed, using template: {}", e);
                        Ok(TemplateQuestions::new().phrase(&request))
                    }
                    Err(e) => Err(e),
                }
            }
            TurnOutcome::Decision { decision } => Ok(format!(
                "Decision: {}\n\nReason: {}",
                decision.label, decision.reason
            )),
            TurnOutcome::Error { diagnostic, .. } => Ok(format!(
                "I couldn't reach a decision ({}). A support agent will review your request.",
                diagnostic
            )),
        }
    }
}

/// The graph named in configuration, or the bundled refund graph.
pub fn load_graph(path: Option<&Path>) -> ChatResult<DecisionGraph> {
    let graph = match path {
        Some(path) => DecisionGraph::from_file(path, Arc::new(Vocabulary::standard()))?,
        None => DecisionGraph::standard()?,
    };
    Ok(graph)
}
