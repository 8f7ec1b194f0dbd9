//! Protocol messages for the realtime channel.
//!
//! All messages are flat JSON objects carrying a `type` discriminator,
//! exchanged as WebSocket text frames.

mod messages;

pub use messages::{ClientMessage, ServerMessage};
