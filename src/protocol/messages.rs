use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::QuizState;

/// Messages received over the realtime channel.
///
/// Only the `type` discriminator is consumed here; player and question
/// identifiers travel over the query/mutate HTTP interface instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Promote the sending connection to a host-control connection.
    #[serde(rename = "host.register")]
    RegisterHost,

    /// Begin the quiz: select questions and open the waiting room.
    #[serde(rename = "host.startQuiz")]
    StartQuiz,

    /// Force the session back into the waiting room.
    #[serde(rename = "host.openJoin")]
    OpenJoin,

    /// Advance to the next question (or to the results past the last one).
    #[serde(rename = "host.nextQuestion")]
    NextQuestion,

    /// Close the active question ahead of the timer.
    #[serde(rename = "host.endQuestion")]
    EndQuestion,

    /// Show the final results.
    #[serde(rename = "host.showResult")]
    ShowResult,

    /// End the quiz session.
    #[serde(rename = "host.endQuiz")]
    EndQuiz,

    /// Keepalive probe; answered with `pong`, sender only.
    #[serde(rename = "ping")]
    Ping,

    /// Any unrecognized type; silently ignored by the router.
    #[serde(other)]
    Unknown,
}

/// Messages sent over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Greeting after a successful handshake: the connection's id and the
    /// current session state.
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { client_id: Uuid, state: QuizState },

    /// Host registration acknowledged; sender only.
    #[serde(rename = "host.registered", rename_all = "camelCase")]
    HostRegistered { player_count: usize },

    /// A player joined; hosts only.
    #[serde(rename = "player.joined")]
    PlayerJoined { count: usize, nickname: String },

    /// Updated answer tally for the active question; hosts only.
    #[serde(rename = "answer.received")]
    AnswerReceived { count: usize, total: usize },

    /// A question round opened.
    #[serde(rename = "question.start", rename_all = "camelCase")]
    QuestionStart {
        question_id: usize,
        question_number: usize,
        total_questions: usize,
        text: String,
        choices: Vec<String>,
        time_limit: u64,
    },

    /// The active question closed, revealing the correct choice.
    #[serde(rename = "question.end", rename_all = "camelCase")]
    QuestionEnd {
        question_id: usize,
        correct_index: usize,
        correct_answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },

    /// The quiz is starting.
    #[serde(rename = "quiz.starting")]
    QuizStarting,

    /// The session is accepting joins.
    #[serde(rename = "session.waitingForPlayers")]
    WaitingForPlayers,

    /// All rounds are done; results are being shown.
    #[serde(rename = "quiz.finish")]
    QuizFinish,

    /// The session ended.
    #[serde(rename = "quiz.ended")]
    QuizEnded,

    /// The session was reset; clients should discard local state.
    #[serde(rename = "session.reset")]
    SessionReset,

    /// A domain failure, delivered to the requester instead of a close.
    #[serde(rename = "error")]
    Error { message: String },

    /// Keepalive reply.
    #[serde(rename = "pong")]
    Pong,
}
