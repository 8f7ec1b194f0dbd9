//! The realtime synchronization core: wire protocol, connection
//! lifecycle, broadcast fan-out, and quiz orchestration.

pub mod acceptor;
mod connection;
pub mod frame;
pub mod handshake;
mod registry;
mod router;
mod server;

pub use connection::Connection;
pub use registry::Registry;
pub use server::{DEFAULT_TIME_LIMIT_SECS, JoinedPlayer, QuizServer};
