//! Inbound message dispatch.

use std::sync::Arc;

use tracing::debug;

use crate::protocol::{ClientMessage, ServerMessage};

use super::connection::Connection;
use super::server::QuizServer;

/// Route one decoded text message. Unknown types and unparseable payloads
/// are ignored; a failing handler is logged and never tears down the
/// connection or the read loop.
pub async fn dispatch(server: &Arc<QuizServer>, connection: &Arc<Connection>, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(conn_id = %connection.id, error = %e, "ignoring unparseable message");
            return;
        }
    };
    debug!(conn_id = %connection.id, ?message, "routing message");

    match message {
        ClientMessage::RegisterHost => {
            server.registry().promote_to_host(connection.id);
            let reply = ServerMessage::HostRegistered {
                player_count: server.session().player_count(),
            };
            server.registry().send(connection, &reply).await;
        }
        ClientMessage::StartQuiz => {
            if let Err(e) = server.start_quiz().await {
                let reply = ServerMessage::Error {
                    message: e.to_string(),
                };
                server.registry().send(connection, &reply).await;
            }
        }
        ClientMessage::OpenJoin => server.open_join().await,
        ClientMessage::NextQuestion => server.advance_question().await,
        ClientMessage::EndQuestion => server.close_current_question().await,
        ClientMessage::ShowResult => server.show_results().await,
        ClientMessage::EndQuiz => server.end_quiz().await,
        ClientMessage::Ping => {
            server.registry().send(connection, &ServerMessage::Pong).await;
        }
        ClientMessage::Unknown => {}
    }
}
