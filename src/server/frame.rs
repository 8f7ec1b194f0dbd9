//! WebSocket frame codec.
//!
//! The channel is text-only. Inbound frames arrive masked from clients;
//! outbound frames are single unmasked final text frames. Decoding treats
//! any short read, malformed header, or 64-bit extended length as "no
//! message", which ends the connection loop the same way a graceful close
//! does — nothing is retried.

use tokio::io::{AsyncRead, AsyncReadExt};

/// FIN bit plus the text opcode.
const FINAL_TEXT_FRAME: u8 = 0x81;
/// Mask bit in the second header byte.
const MASK_BIT: u8 = 0x80;
/// Length indicator for a 16-bit extended length.
const LEN_U16: u8 = 126;
/// Length indicator for a 64-bit extended length (unsupported).
const LEN_U64: u8 = 127;

/// Encode `text` as one unmasked final text frame.
pub fn encode(text: &str) -> Vec<u8> {
    let payload = text.as_bytes();
    let mut frame = Vec::with_capacity(payload.len() + 10);
    frame.push(FINAL_TEXT_FRAME);
    if payload.len() < LEN_U16 as usize {
        frame.push(payload.len() as u8);
    } else if payload.len() < 65536 {
        frame.push(LEN_U16);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        frame.push(LEN_U64);
        frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }
    frame.extend_from_slice(payload);
    frame
}

/// Read one text frame, unmasking if needed. Returns `None` on EOF, a
/// short read, an unsupported 64-bit length, or non-UTF-8 payload.
pub async fn decode<R>(reader: &mut R) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await.ok()?;
    // The opcode byte is not inspected: the catalogue is text-only, and a
    // control frame's payload fails UTF-8 or JSON parsing downstream.

    let masked = header[1] & MASK_BIT != 0;
    let payload_len = match header[1] & 0x7F {
        LEN_U16 => {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext).await.ok()?;
            u16::from_be_bytes(ext) as usize
        }
        LEN_U64 => return None,
        n => n as usize,
    };

    let mut mask_key = [0u8; 4];
    if masked {
        reader.read_exact(&mut mask_key).await.ok()?;
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await.ok()?;
    if masked {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask_key[i % 4];
        }
    }

    String::from_utf8(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a masked frame the way a client would.
    fn masked_client_frame(text: &str, key: [u8; 4]) -> Vec<u8> {
        let payload: Vec<u8> = text
            .bytes()
            .enumerate()
            .map(|(i, b)| b ^ key[i % 4])
            .collect();
        let mut frame = vec![FINAL_TEXT_FRAME];
        if payload.len() < 126 {
            frame.push(MASK_BIT | payload.len() as u8);
        } else if payload.len() < 65536 {
            frame.push(MASK_BIT | LEN_U16);
            frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        } else {
            frame.push(MASK_BIT | LEN_U64);
            frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        }
        frame.extend_from_slice(&key);
        frame.extend_from_slice(&payload);
        frame
    }

    #[tokio::test]
    async fn test_masked_roundtrip_across_length_tiers() {
        for len in [0usize, 125, 126, 65535] {
            let text = "x".repeat(len);
            let frame = masked_client_frame(&text, [0x12, 0x34, 0x56, 0x78]);
            let decoded = decode(&mut frame.as_slice()).await;
            assert_eq!(decoded.as_deref(), Some(text.as_str()), "len {len}");
        }
    }

    #[tokio::test]
    async fn test_unmasked_encoded_frame_decodes() {
        let frame = encode("{\"type\":\"pong\"}");
        let decoded = decode(&mut frame.as_slice()).await;
        assert_eq!(decoded.as_deref(), Some("{\"type\":\"pong\"}"));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected_not_truncated() {
        let text = "x".repeat(70000);

        let frame = masked_client_frame(&text, [9, 9, 9, 9]);
        assert_eq!(decode(&mut frame.as_slice()).await, None);

        // The encoder emits a 64-bit length for it, which the decoder
        // refuses outright rather than misreading.
        let frame = encode(&text);
        assert_eq!(decode(&mut frame.as_slice()).await, None);
    }

    #[tokio::test]
    async fn test_short_reads_yield_no_message() {
        let mut empty: &[u8] = &[];
        assert_eq!(decode(&mut empty).await, None);
        assert_eq!(decode(&mut [FINAL_TEXT_FRAME].as_slice()).await, None);

        // Header promises 5 payload bytes, stream carries 2.
        let truncated = [FINAL_TEXT_FRAME, 5, b'h', b'i'];
        assert_eq!(decode(&mut truncated.as_slice()).await, None);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_yields_no_message() {
        let frame = [FINAL_TEXT_FRAME, 2, 0xFF, 0xFE];
        assert_eq!(decode(&mut frame.as_slice()).await, None);
    }
}
