//! Session orchestration: round advancement and closing, the round timer,
//! and the operations exposed to the query/mutate collaborator.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::QuestionSource;
use crate::models::Question;
use crate::protocol::ServerMessage;
use crate::session::{
    Advance, QuizSession, QuizState, RankedPlayer, SessionError, SessionSnapshot,
};

use super::registry::Registry;

/// Default seconds before an open question closes automatically.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 60;

/// Result of registering a player through the join operation.
#[derive(Debug, Clone)]
pub struct JoinedPlayer {
    pub player_id: Uuid,
    pub nickname: String,
    pub status: QuizState,
}

/// The live quiz server: one shared session, the connection registry, and
/// the question bank behind its loader seam. Session and registry sit in
/// their own `Arc`s so the detached round timers can outlive any one
/// caller.
pub struct QuizServer {
    session: Arc<QuizSession>,
    registry: Arc<Registry>,
    source: Box<dyn QuestionSource>,
    bank: RwLock<Vec<Question>>,
    time_limit: Duration,
}

impl QuizServer {
    pub fn new(source: Box<dyn QuestionSource>, time_limit: Duration) -> Arc<Self> {
        let bank = RwLock::new(source.load());
        Arc::new(Self {
            session: Arc::new(QuizSession::new()),
            registry: Arc::new(Registry::new()),
            source,
            bank,
            time_limit,
        })
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Begin the quiz. Falls back to the full bank when no subset was
    /// selected; an empty bank is a domain error and no transition
    /// happens.
    pub async fn start_quiz(&self) -> Result<(), SessionError> {
        if !self.session.has_questions() {
            self.session.set_questions(self.bank.read().clone());
        }
        if !self.session.has_questions() {
            return Err(SessionError::EmptyQuestionBank);
        }
        self.session.set_state(QuizState::WaitingForPlayers);
        info!(questions = self.session.question_count(), "quiz starting");
        self.registry.broadcast_all(&ServerMessage::QuizStarting).await;
        Ok(())
    }

    /// Force the session back into the waiting room.
    pub async fn open_join(&self) {
        self.session.set_state(QuizState::WaitingForPlayers);
        self.registry
            .broadcast_all(&ServerMessage::WaitingForPlayers)
            .await;
    }

    /// Open the next round, or land in the results past the last question.
    /// Each opened round arms a detached timer carrying the generation it
    /// was minted for; the timer re-checks that generation at fire time
    /// instead of being cancelled.
    pub async fn advance_question(&self) {
        match self.session.advance() {
            Advance::Finished => {
                info!("past the last question, showing results");
                self.registry.broadcast_all(&ServerMessage::QuizFinish).await;
            }
            Advance::Question {
                index,
                question,
                total,
                generation,
            } => {
                info!(index, generation, "question opened");
                let message = ServerMessage::QuestionStart {
                    question_id: index,
                    question_number: index + 1,
                    total_questions: total,
                    text: question.text.clone(),
                    choices: question.choices.clone(),
                    time_limit: self.time_limit.as_secs(),
                };
                self.registry.broadcast_all(&message).await;

                let session = Arc::clone(&self.session);
                let registry = Arc::clone(&self.registry);
                let time_limit = self.time_limit;
                tokio::spawn(async move {
                    tokio::time::sleep(time_limit).await;
                    if session.is_current_round(generation) {
                        debug!(generation, "round timer expired");
                        close_round(&session, &registry).await;
                    }
                });
            }
        }
    }

    /// Close the active round and reveal the answer. A no-op in any other
    /// state, so the timer and a manual close race safely.
    pub async fn close_current_question(&self) {
        close_round(&self.session, &self.registry).await;
    }

    pub async fn show_results(&self) {
        self.session.set_state(QuizState::ShowingResults);
        self.registry.broadcast_all(&ServerMessage::QuizFinish).await;
    }

    pub async fn end_quiz(&self) {
        self.session.set_state(QuizState::Ended);
        info!("quiz ended");
        self.registry.broadcast_all(&ServerMessage::QuizEnded).await;
    }

    /// Join operation for the query/mutate collaborator.
    pub async fn register_player(&self, nickname: Option<String>) -> JoinedPlayer {
        let (player_id, nickname) = self.session.register_player(nickname);
        info!(%player_id, %nickname, "player joined");
        self.registry
            .broadcast_hosts(&ServerMessage::PlayerJoined {
                count: self.session.player_count(),
                nickname: nickname.clone(),
            })
            .await;
        JoinedPlayer {
            player_id,
            nickname,
            status: self.session.state(),
        }
    }

    /// Answer-ingestion operation. On success, hosts (only) get the
    /// updated tally.
    pub async fn submit_answer(
        &self,
        player_id: Uuid,
        question_index: usize,
        choice: usize,
    ) -> Result<(), SessionError> {
        let tally = self.session.record_answer(player_id, question_index, choice)?;
        self.registry
            .broadcast_hosts(&ServerMessage::AnswerReceived {
                count: tally.answered,
                total: tally.total_players,
            })
            .await;
        Ok(())
    }

    /// Fresh session: everything cleared, the bank re-fetched from the
    /// loader, everyone told to discard local state.
    pub async fn reset_session(&self) {
        self.session.reset();
        *self.bank.write() = self.source.load();
        info!(bank = self.bank.read().len(), "session reset");
        self.registry.broadcast_all(&ServerMessage::SessionReset).await;
    }

    /// Select a subset of the bank for this session, in the given order.
    /// Unknown ids are skipped; returns how many questions were selected.
    pub fn set_selected_questions(&self, ids: &[u32]) -> usize {
        let bank = self.bank.read();
        let selected: Vec<Question> = ids
            .iter()
            .filter_map(|id| bank.iter().find(|q| q.id == *id).cloned())
            .collect();
        let count = selected.len();
        self.session.set_questions(selected);
        count
    }

    pub fn question_bank(&self) -> Vec<Question> {
        self.bank.read().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn ranking(&self) -> Vec<RankedPlayer> {
        self.session.ranking()
    }
}

/// Shared closing path for the timer and the explicit host command.
async fn close_round(session: &QuizSession, registry: &Registry) {
    let Some(closed) = session.close_current() else {
        return;
    };
    info!(index = closed.index, "question closed");
    let question = closed.question;
    let correct_answer = question
        .choices
        .get(question.correct_index)
        .cloned()
        .unwrap_or_default();
    let message = ServerMessage::QuestionEnd {
        question_id: closed.index,
        correct_index: question.correct_index,
        correct_answer,
        explanation: question.explanation,
    };
    registry.broadcast_all(&message).await;
}
