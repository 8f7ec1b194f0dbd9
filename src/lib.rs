//! # quiz-festival
//!
//! Server for a single live multiplayer quiz event. Participants and
//! host-control clients stay synchronized over a persistent WebSocket
//! channel — handshake, framing, and masking implemented here — while a
//! plain HTTP interface on a second port handles joining, answering, and
//! results.
//!
//! The realtime core lives in [`server`]: the frame codec, the connection
//! registry with best-effort broadcast, the message router, and the round
//! timer that races host commands under a generation guard. The quiz
//! state itself is the single [`session::QuizSession`] shared by every
//! connection worker.

pub mod data;
pub mod http;
pub mod models;
pub mod protocol;
pub mod server;
pub mod session;

pub use server::QuizServer;
pub use session::{QuizSession, QuizState, SessionError};
