//! The quiz session state machine.
//!
//! One [`QuizSession`] exists at a time. Its fields are shared mutable
//! state reachable from every connection worker: players and answers live
//! in concurrent maps, coarse state transitions are plain atomic stores
//! with no mutual exclusion between hosts (the control surface assumes a
//! single active host), and the round-generation counter lets a detached
//! timer detect that the round it was armed for has been superseded.

use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Answer, Player, Question, unix_millis};

/// Lifecycle of the single quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum QuizState {
    Idle = 0,
    WaitingForPlayers = 1,
    QuestionActive = 2,
    QuestionClosed = 3,
    ShowingResults = 4,
    Ended = 5,
}

impl QuizState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => QuizState::WaitingForPlayers,
            2 => QuizState::QuestionActive,
            3 => QuizState::QuestionClosed,
            4 => QuizState::ShowingResults,
            5 => QuizState::Ended,
            _ => QuizState::Idle,
        }
    }
}

/// Domain failures surfaced to the requesting client, never as a
/// connection close.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No questions available")]
    EmptyQuestionBank,
    #[error("No active question")]
    NoActiveQuestion,
    #[error("Player not found")]
    UnknownPlayer,
}

/// Outcome of bumping the round index.
pub enum Advance {
    /// A new round opened.
    Question {
        index: usize,
        question: Question,
        total: usize,
        generation: u64,
    },
    /// The index moved past the last question; results are showing.
    Finished,
}

/// Data for the closing notice of a round.
pub struct ClosedRound {
    pub index: usize,
    pub question: Question,
}

/// Answer tally after an ingested submission.
pub struct AnswerTally {
    pub answered: usize,
    pub total_players: usize,
}

/// One entry of the score ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPlayer {
    #[serde(skip_serializing)]
    pub player_id: Uuid,
    pub rank: usize,
    pub nickname: String,
    pub score: u32,
}

/// Current-question fields exposed by the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: u32,
    pub text: String,
    pub choices: Vec<String>,
}

/// Point-in-time view of the session for the query interface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: QuizState,
    pub player_count: usize,
    pub current_question_index: i64,
    pub total_questions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionView>,
    pub answered_count: usize,
}

/// The single live quiz session.
pub struct QuizSession {
    state: AtomicU8,
    questions: RwLock<Vec<Question>>,
    players: DashMap<Uuid, Player>,
    answers: DashMap<usize, DashMap<Uuid, Answer>>,
    /// −1 until the first round opens.
    current_index: AtomicI64,
    round_started_at: RwLock<Option<Instant>>,
    /// Monotonically increasing round counter; never reset, so a timer
    /// armed before a session reset can never match a later round.
    generation: AtomicU64,
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(QuizState::Idle as u8),
            questions: RwLock::new(Vec::new()),
            players: DashMap::new(),
            answers: DashMap::new(),
            current_index: AtomicI64::new(-1),
            round_started_at: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> QuizState {
        QuizState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: QuizState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn current_index(&self) -> i64 {
        self.current_index.load(Ordering::SeqCst)
    }

    pub fn question_count(&self) -> usize {
        self.questions.read().len()
    }

    pub fn has_questions(&self) -> bool {
        !self.questions.read().is_empty()
    }

    /// Replace the selected question list for this session.
    pub fn set_questions(&self, questions: Vec<Question>) {
        *self.questions.write() = questions;
    }

    pub fn current_question(&self) -> Option<Question> {
        let index = self.current_index();
        if index < 0 {
            return None;
        }
        self.questions.read().get(index as usize).cloned()
    }

    pub fn round_started_at(&self) -> Option<Instant> {
        *self.round_started_at.read()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Register a player; a missing or blank nickname gets a `Player<N>`
    /// default. Returns the new id and the effective nickname.
    pub fn register_player(&self, nickname: Option<String>) -> (Uuid, String) {
        let nickname = match nickname.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(n) => n,
            None => format!("Player{}", self.players.len() + 1),
        };
        let player = Player::new(nickname.clone());
        let id = player.id;
        self.players.insert(id, player);
        (id, nickname)
    }

    /// Open the next round, or land in `ShowingResults` past the last
    /// question. Each opened round mints a fresh generation.
    pub fn advance(&self) -> Advance {
        let index = self.current_index.fetch_add(1, Ordering::SeqCst) + 1;
        let (question, total) = {
            let questions = self.questions.read();
            match questions.get(index as usize) {
                Some(q) => (q.clone(), questions.len()),
                None => {
                    let len = questions.len() as i64;
                    drop(questions);
                    self.current_index.store(len, Ordering::SeqCst);
                    self.set_state(QuizState::ShowingResults);
                    return Advance::Finished;
                }
            }
        };
        self.set_state(QuizState::QuestionActive);
        *self.round_started_at.write() = Some(Instant::now());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Advance::Question {
            index: index as usize,
            question,
            total,
            generation,
        }
    }

    /// Close the active round. A no-op in any other state, so the timer
    /// and an explicit host command race safely: whichever lands first
    /// wins and the other does nothing.
    pub fn close_current(&self) -> Option<ClosedRound> {
        if self
            .state
            .compare_exchange(
                QuizState::QuestionActive as u8,
                QuizState::QuestionClosed as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return None;
        }
        let index = self.current_index();
        let question = self.questions.read().get(index as usize).cloned()?;
        Some(ClosedRound {
            index: index as usize,
            question,
        })
    }

    /// Whether a timer armed for `generation` may still close the round.
    pub fn is_current_round(&self, generation: u64) -> bool {
        self.state() == QuizState::QuestionActive && self.generation() == generation
    }

    /// Upsert the answer for (question, player), last write wins, and bump
    /// the score when the choice matches the active question's correct
    /// index.
    pub fn record_answer(
        &self,
        player_id: Uuid,
        question_index: usize,
        choice: usize,
    ) -> Result<AnswerTally, SessionError> {
        if self.state() != QuizState::QuestionActive {
            return Err(SessionError::NoActiveQuestion);
        }
        if !self.players.contains_key(&player_id) {
            return Err(SessionError::UnknownPlayer);
        }

        let answer = Answer {
            player_id,
            question_index,
            choice,
            answered_at_ms: unix_millis(),
        };
        self.answers
            .entry(question_index)
            .or_default()
            .insert(player_id, answer);

        let correct = self
            .current_question()
            .is_some_and(|q| q.correct_index == choice);
        if correct {
            if let Some(player) = self.players.get(&player_id) {
                player.add_point();
            }
        }

        Ok(AnswerTally {
            answered: self.answered_count(question_index),
            total_players: self.players.len(),
        })
    }

    pub fn answered_count(&self, question_index: usize) -> usize {
        self.answers
            .get(&question_index)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Ranking by score descending; ties broken by earlier join.
    pub fn ranking(&self) -> Vec<RankedPlayer> {
        let mut players: Vec<_> = self
            .players
            .iter()
            .map(|p| (p.id, p.nickname.clone(), p.score(), p.joined_at_ms))
            .collect();
        players.sort_by(|a, b| b.2.cmp(&a.2).then(a.3.cmp(&b.3)));
        players
            .into_iter()
            .enumerate()
            .map(|(i, (player_id, nickname, score, _))| RankedPlayer {
                player_id,
                rank: i + 1,
                nickname,
                score,
            })
            .collect()
    }

    /// Clear players, answers, and selected questions; back to `Idle`.
    /// The generation counter keeps counting.
    pub fn reset(&self) {
        self.set_state(QuizState::Idle);
        self.players.clear();
        self.answers.clear();
        self.questions.write().clear();
        self.current_index.store(-1, Ordering::SeqCst);
        *self.round_started_at.write() = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        let index = self.current_index();
        let questions = self.questions.read();
        let current_question = if index >= 0 {
            questions.get(index as usize).map(|q| QuestionView {
                id: q.id,
                text: q.text.clone(),
                choices: q.choices.clone(),
            })
        } else {
            None
        };
        let answered_count = if state == QuizState::QuestionActive && index >= 0 {
            self.answered_count(index as usize)
        } else {
            0
        };
        SessionSnapshot {
            state,
            player_count: self.players.len(),
            current_question_index: index,
            total_questions: questions.len(),
            current_question,
            answered_count,
        }
    }
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u32, correct_index: usize) -> Question {
        Question {
            id,
            text: format!("question {id}"),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index,
            explanation: None,
        }
    }

    fn active_session(questions: Vec<Question>) -> QuizSession {
        let session = QuizSession::new();
        session.set_questions(questions);
        session.advance();
        session
    }

    #[test]
    fn test_advance_past_last_question_shows_results() {
        let session = QuizSession::new();
        session.set_questions(vec![question(1, 0)]);

        assert!(matches!(session.advance(), Advance::Question { index: 0, .. }));
        assert_eq!(session.state(), QuizState::QuestionActive);

        assert!(matches!(session.advance(), Advance::Finished));
        assert_eq!(session.state(), QuizState::ShowingResults);
    }

    #[test]
    fn test_advance_with_no_questions_finishes_immediately() {
        let session = QuizSession::new();
        assert!(matches!(session.advance(), Advance::Finished));
        assert_eq!(session.state(), QuizState::ShowingResults);
    }

    #[test]
    fn test_close_current_twice_is_a_noop() {
        let session = active_session(vec![question(1, 0)]);

        let closed = session.close_current();
        assert!(closed.is_some());
        assert_eq!(session.state(), QuizState::QuestionClosed);

        assert!(session.close_current().is_none());
    }

    #[test]
    fn test_stale_timer_generation_does_not_close_later_round() {
        let session = QuizSession::new();
        session.set_questions(vec![question(1, 0), question(2, 0)]);

        let first_generation = match session.advance() {
            Advance::Question { generation, .. } => generation,
            Advance::Finished => panic!("expected an open round"),
        };
        session.close_current();
        let second_generation = match session.advance() {
            Advance::Question { generation, .. } => generation,
            Advance::Finished => panic!("expected an open round"),
        };

        assert!(second_generation > first_generation);
        assert!(!session.is_current_round(first_generation));
        assert!(session.is_current_round(second_generation));
    }

    #[test]
    fn test_ranking_orders_by_score_then_join_time() {
        let session = QuizSession::new();

        let mut a = Player::new("A");
        a.joined_at_ms = 1;
        for _ in 0..3 {
            a.add_point();
        }
        let mut b = Player::new("B");
        b.joined_at_ms = 2;
        for _ in 0..5 {
            b.add_point();
        }
        let mut c = Player::new("C");
        c.joined_at_ms = 3;
        for _ in 0..5 {
            c.add_point();
        }
        session.players.insert(a.id, a);
        session.players.insert(b.id, b);
        session.players.insert(c.id, c);

        let ranking = session.ranking();
        let order: Vec<_> = ranking.iter().map(|r| r.nickname.as_str()).collect();
        assert_eq!(order, ["B", "C", "A"]);
        let ranks: Vec<_> = ranking.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn test_reset_clears_players_answers_and_state() {
        let session = active_session(vec![question(1, 0), question(2, 1)]);
        let (player_id, _) = session.register_player(Some("alice".into()));
        session.record_answer(player_id, 0, 0).unwrap();

        session.reset();

        assert_eq!(session.state(), QuizState::Idle);
        assert_eq!(session.player_count(), 0);
        assert_eq!(session.question_count(), 0);
        assert_eq!(session.current_index(), -1);
        assert_eq!(session.answered_count(0), 0);
        assert!(session.round_started_at().is_none());
    }

    #[test]
    fn test_later_submission_overwrites_earlier_one() {
        let session = active_session(vec![question(1, 0)]);
        let (player_id, _) = session.register_player(None);

        session.record_answer(player_id, 0, 1).unwrap();
        let tally = session.record_answer(player_id, 0, 2).unwrap();

        assert_eq!(tally.answered, 1);
        let stored = session
            .answers
            .get(&0)
            .and_then(|m| m.get(&player_id).map(|a| a.choice))
            .unwrap();
        assert_eq!(stored, 2);
    }

    #[test]
    fn test_resubmitting_correct_answer_increments_again() {
        // The score path has no per-question dedup: every correct
        // submission counts, matching the live behavior this replaces.
        let session = active_session(vec![question(1, 2)]);
        let (player_id, _) = session.register_player(None);

        session.record_answer(player_id, 0, 2).unwrap();
        session.record_answer(player_id, 0, 2).unwrap();

        let score = session.players.get(&player_id).unwrap().score();
        assert_eq!(score, 2);
    }

    #[test]
    fn test_submission_rejected_outside_active_round() {
        let session = QuizSession::new();
        let (player_id, _) = session.register_player(None);
        let result = session.record_answer(player_id, 0, 0);
        assert!(matches!(result, Err(SessionError::NoActiveQuestion)));
    }

    #[test]
    fn test_submission_rejected_for_unknown_player() {
        let session = active_session(vec![question(1, 0)]);
        let result = session.record_answer(Uuid::new_v4(), 0, 0);
        assert!(matches!(result, Err(SessionError::UnknownPlayer)));
    }

    #[test]
    fn test_concurrent_submissions_record_independently() {
        let session = active_session(vec![question(1, 0)]);
        let (first, _) = session.register_player(Some("first".into()));
        let (second, _) = session.register_player(Some("second".into()));

        std::thread::scope(|scope| {
            scope.spawn(|| session.record_answer(first, 0, 0).unwrap());
            scope.spawn(|| session.record_answer(second, 0, 3).unwrap());
        });

        assert_eq!(session.answered_count(0), 2);
        let answers = session.answers.get(&0).unwrap();
        assert_eq!(answers.get(&first).unwrap().choice, 0);
        assert_eq!(answers.get(&second).unwrap().choice, 3);
    }

    #[test]
    fn test_default_nicknames_are_numbered() {
        let session = QuizSession::new();
        let (_, first) = session.register_player(None);
        let (_, second) = session.register_player(Some("   ".into()));
        assert_eq!(first, "Player1");
        assert_eq!(second, "Player2");
    }

    #[test]
    fn test_snapshot_reflects_active_round() {
        let session = active_session(vec![question(7, 1), question(8, 0)]);
        let (player_id, _) = session.register_player(None);
        session.record_answer(player_id, 0, 1).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, QuizState::QuestionActive);
        assert_eq!(snapshot.player_count, 1);
        assert_eq!(snapshot.current_question_index, 0);
        assert_eq!(snapshot.total_questions, 2);
        assert_eq!(snapshot.answered_count, 1);
        assert_eq!(snapshot.current_question.unwrap().id, 7);
    }
}
