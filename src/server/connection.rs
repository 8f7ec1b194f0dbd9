//! One live client connection.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::protocol::ServerMessage;
use crate::server::frame;

/// Boxed write half of a client socket.
pub type ConnectionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A connection that completed the handshake. Every outbound write goes
/// through the writer mutex, so concurrent broadcasts can never interleave
/// frame bytes on the same socket.
pub struct Connection {
    pub id: Uuid,
    is_host: AtomicBool,
    writer: Mutex<ConnectionWriter>,
}

impl Connection {
    pub fn new(id: Uuid, writer: ConnectionWriter) -> Self {
        Self {
            id,
            is_host: AtomicBool::new(false),
            writer: Mutex::new(writer),
        }
    }

    /// Host role is only ever granted by an explicit registration message.
    pub fn mark_host(&self) {
        self.is_host.store(true, Ordering::Relaxed);
    }

    pub fn is_host(&self) -> bool {
        self.is_host.load(Ordering::Relaxed)
    }

    pub async fn send(&self, message: &ServerMessage) -> io::Result<()> {
        let json = serde_json::to_string(message).map_err(io::Error::other)?;
        self.send_text(&json).await
    }

    /// Encode and write one frame inside the write-exclusion section.
    pub async fn send_text(&self, text: &str) -> io::Result<()> {
        let bytes = frame::encode(text);
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await
    }
}
