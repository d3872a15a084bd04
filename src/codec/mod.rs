//! Wire codec for the device protocol
//!
//! Separates framing concerns from transport and protocol logic:
//! - **crypto**: AES-128-ECB + base64 transform of the inner payload
//! - **envelope**: the outer JSON object carrying the encrypted `pack`
//! - **payload**: typed inner payloads (scan/dev/bind/bindok/status/dat/cmd/res)
//!
//! The transport only ever sees the serialized envelope bytes; the protocol
//! state machine only ever sees typed payloads.

pub mod crypto;
pub mod envelope;
pub mod payload;

pub use crypto::{decrypt_pack, encrypt_pack, DEFAULT_KEY};
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use payload::Payload;

use crate::error::Result;

/// Build the on-wire bytes for an encrypted request.
///
/// `i` is 1 for the bind request (the one exchange the device expects under
/// the default key) and 0 for everything else.
pub fn encode_request(payload: &Payload, key: &[u8], i: u8, tcid: &str) -> Result<Vec<u8>> {
    let pack = encrypt_pack(payload, key)?;
    let envelope = RequestEnvelope::new(i, tcid, pack);
    serde_json::to_vec(&envelope).map_err(|e| crate::error::AcError::Codec {
        detail: format!("envelope serialize: {}", e),
    })
}

/// Build the on-wire bytes for the discovery scan request.
///
/// Scan is the one message sent bare: no envelope, no encryption.
pub fn encode_scan() -> Vec<u8> {
    // Serializing a unit variant cannot fail
    serde_json::to_vec(&Payload::Scan).expect("scan payload serializes")
}

/// Parse an inbound datagram into its envelope and decrypted payload.
///
/// Returns the envelope (for the device id in `cid`) alongside the payload.
pub fn decode_response(data: &[u8], key: &[u8]) -> Result<(ResponseEnvelope, Payload)> {
    let envelope: ResponseEnvelope =
        serde_json::from_slice(data).map_err(|e| crate::error::AcError::Codec {
            detail: format!("envelope parse: {}", e),
        })?;
    let pack = envelope.pack.as_deref().ok_or(crate::error::AcError::Codec {
        detail: "envelope has no pack".into(),
    })?;
    let payload = decrypt_pack(pack, key)?;
    Ok((envelope, payload))
}
