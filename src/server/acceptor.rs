//! Connection acceptor and per-connection worker.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::ServerMessage;

use super::connection::Connection;
use super::server::QuizServer;
use super::{frame, handshake, router};

/// Accept loop. Each accepted stream gets its own worker task, so this
/// loop never blocks on any single connection's lifetime.
pub async fn run(server: Arc<QuizServer>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    handle_connection(server, stream, addr).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
            }
        }
    }
}

/// One connection's whole lifetime: handshake, greeting, read loop,
/// teardown.
async fn handle_connection(server: Arc<QuizServer>, stream: TcpStream, addr: SocketAddr) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(key) = handshake::read_client_key(&mut reader).await else {
        // No handshake key: close silently, no response.
        debug!(%addr, "refusing connection without handshake key");
        return;
    };
    if let Err(e) = write_half
        .write_all(handshake::upgrade_response(&key).as_bytes())
        .await
    {
        debug!(%addr, error = %e, "failed to complete handshake");
        return;
    }

    let id = Uuid::new_v4();
    let connection = Arc::new(Connection::new(id, Box::new(write_half)));
    server.registry().register(Arc::clone(&connection));
    info!(conn_id = %id, %addr, "client connected");

    let greeting = ServerMessage::Connected {
        client_id: id,
        state: server.session().state(),
    };
    if connection.send(&greeting).await.is_err() {
        server.registry().remove(id);
        return;
    }

    // Any decode failure ends the loop exactly like a graceful close.
    while let Some(text) = frame::decode(&mut reader).await {
        router::dispatch(&server, &connection, &text).await;
    }

    server.registry().remove(id);
    info!(conn_id = %id, "client disconnected");
}
