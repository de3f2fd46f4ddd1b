//! Message encoding and decoding with framing.
//!
//! Frames are length-prefixed so they can be written back to back on any
//! reliable byte stream.

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

/// Bytes before the payload: length (u32 LE) plus message type tag.
const HEADER_LEN: usize = 5;

/// Compute schema hash from protocol definitions.
///
/// Changes whenever the advancement message set changes, so hosts can refuse
/// peers built against a different layout.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&PROTOCOL_VERSION.to_le_bytes());

    // Message type names (deterministic)
    hasher.update(b"ClientMessage");
    hasher.update(b"ServerMessage");
    hasher.update(b"SeenAdvancementsAction");
    hasher.update(b"AdvancementInfoMessage");
    hasher.update(b"AdvancementWire");
    hasher.update(b"DisplayWire");

    let hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Encode a client message with length prefix.
///
/// Frame format: [length: u32][message_type: u8][payload: bytes]
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(msg).context("Failed to serialize client message")?;
    Ok(frame(client_message_type_tag(msg), &payload))
}

/// Encode a server message with length prefix.
///
/// Frame format: [length: u32][message_type: u8][payload: bytes]
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(msg).context("Failed to serialize server message")?;
    Ok(frame(server_message_type_tag(msg), &payload))
}

/// Decode a client message from frame data.
///
/// Expects data to start with length prefix.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage> {
    decode_frame(data).context("Failed to deserialize client message")
}

/// Decode a server message from frame data.
///
/// Expects data to start with length prefix.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage> {
    decode_frame(data).context("Failed to deserialize server message")
}

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    // Length excludes the length field itself
    let length = (1 + payload.len()) as u32;
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(tag);
    frame.extend_from_slice(payload);
    frame
}

fn decode_frame<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    if data.len() < HEADER_LEN {
        return Err(anyhow!(
            "Frame too short: {} bytes (minimum {HEADER_LEN})",
            data.len()
        ));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length == 0 {
        return Err(anyhow!("Frame length must include the type tag"));
    }
    let end = 4usize
        .checked_add(length)
        .ok_or_else(|| anyhow!("Frame length overflow"))?;
    if data.len() < end {
        return Err(anyhow!(
            "Incomplete frame: expected {end} bytes, got {}",
            data.len()
        ));
    }

    // data[4] is the type tag; postcard carries its own variant index
    Ok(postcard::from_bytes(&data[HEADER_LEN..end])?)
}

/// Get message type tag for client messages.
fn client_message_type_tag(msg: &ClientMessage) -> u8 {
    match msg {
        ClientMessage::SeenAdvancements(_) => 1,
    }
}

/// Get message type tag for server messages.
fn server_message_type_tag(msg: &ServerMessage) -> u8 {
    match msg {
        ServerMessage::AdvancementInfo(_) => 1,
        ServerMessage::SelectAdvancementsTab { .. } => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AdvancementInfoMessage, SeenAdvancementsAction};
    use mdadvance_core::{AdvancementId, AdvancementProgress, Requirements};
    use std::collections::BTreeMap;

    fn id(s: &str) -> AdvancementId {
        AdvancementId::parse(s).unwrap()
    }

    #[test]
    fn test_schema_hash_deterministic() {
        assert_eq!(compute_schema_hash(), compute_schema_hash());
        assert_ne!(compute_schema_hash(), 0);
    }

    #[test]
    fn test_encode_decode_seen_advancements() {
        let msg = ClientMessage::SeenAdvancements(SeenAdvancementsAction::OpenedTab(id(
            "story/root",
        )));
        let encoded = encode_client_message(&msg).expect("Failed to encode");
        assert_eq!(encoded[4], 1);
        assert_eq!(decode_client_message(&encoded).expect("Failed to decode"), msg);
    }

    #[test]
    fn test_encode_decode_advancement_info() {
        let name = "get_stone".to_string();
        let mut progress = AdvancementProgress::new();
        progress.update_names([&name], &Requirements::empty());
        progress.grant(&name);

        let msg = ServerMessage::AdvancementInfo(AdvancementInfoMessage {
            reset: true,
            added: Vec::new(),
            removed: vec![id("story/old")],
            progress: BTreeMap::from([(id("story/mine_stone"), progress.clone())]),
        });

        let encoded = encode_server_message(&msg).expect("Failed to encode");
        let decoded = decode_server_message(&encoded).expect("Failed to decode");
        let ServerMessage::AdvancementInfo(info) = decoded else {
            panic!("unexpected message {decoded:?}");
        };
        assert!(info.reset);
        assert_eq!(info.removed, vec![id("story/old")]);
        let restored = &info.progress[&id("story/mine_stone")];
        assert_eq!(
            restored.criterion("get_stone").unwrap().obtained(),
            progress.criterion("get_stone").unwrap().obtained()
        );
    }

    #[test]
    fn test_encode_decode_select_tab() {
        let msg = ServerMessage::SelectAdvancementsTab { tab: None };
        let encoded = encode_server_message(&msg).expect("Failed to encode");
        assert_eq!(encoded[4], 2);
        assert_eq!(decode_server_message(&encoded).expect("Failed to decode"), msg);
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let data = vec![10, 0, 0, 0, 1];
        assert!(decode_client_message(&data).is_err());
    }

    #[test]
    fn test_decode_too_short() {
        assert!(decode_client_message(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_decode_zero_length() {
        assert!(decode_server_message(&[0, 0, 0, 0, 0]).is_err());
    }
}
