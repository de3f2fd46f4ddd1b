#![warn(missing_docs)]
//! Advancement sync protocol shared by the client and server.

mod codec;
mod protocol;

pub use codec::{
    compute_schema_hash, decode_client_message, decode_server_message, encode_client_message,
    encode_server_message,
};
pub use protocol::{
    AdvancementInfoMessage, AdvancementWire, ClientMessage, DisplayWire, SeenAdvancementsAction,
    ServerMessage, MAX_ADVANCEMENTS, MAX_CRITERIA, MAX_ID_LEN, MAX_PROGRESS, MAX_REMOVED,
    MAX_TEXT_LEN, PROTOCOL_VERSION,
};
