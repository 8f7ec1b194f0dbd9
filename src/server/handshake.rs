//! WebSocket upgrade handshake.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Fixed GUID every WebSocket handshake hashes the client key against.
const HANDSHAKE_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Accept token for a client key: base64(SHA-1(key ‖ magic)).
pub fn accept_token(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(HANDSHAKE_MAGIC.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// The fixed switching-protocols response carrying the accept token.
pub fn upgrade_response(key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_token(key)
    )
}

/// Read the upgrade request line by line until the blank line, returning
/// the client's `Sec-WebSocket-Key`. `None` means the connection should be
/// closed with no response.
pub async fn read_client_key<R>(reader: &mut R) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut key = None;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await.ok()?;
        if read == 0 {
            // EOF before the end of the headers.
            return None;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("sec-websocket-key") {
                key = Some(value.trim().to_string());
            }
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_token_matches_reference_vector() {
        assert_eq!(
            accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_upgrade_response_carries_token() {
        let response = upgrade_response("dGhlIHNhbXBsZSBub25jZQ==");
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_key_extracted_from_upgrade_request() {
        let request = "GET /ws HTTP/1.1\r\n\
                       Host: localhost:8081\r\n\
                       Upgrade: websocket\r\n\
                       Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                       Sec-WebSocket-Version: 13\r\n\
                       \r\n";
        let key = read_client_key(&mut request.as_bytes()).await;
        assert_eq!(key.as_deref(), Some("dGhlIHNhbXBsZSBub25jZQ=="));
    }

    #[tokio::test]
    async fn test_request_without_key_is_refused() {
        let request = "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(read_client_key(&mut request.as_bytes()).await, None);
    }

    #[tokio::test]
    async fn test_truncated_request_is_refused() {
        let request = "GET / HTTP/1.1\r\nSec-WebSocket-Key: abc\r\n";
        assert_eq!(read_client_key(&mut request.as_bytes()).await, None);
    }
}
