//! AES-128-ECB payload encryption
//!
//! The device family encrypts every inner payload with AES-128 in ECB mode,
//! PKCS7 padding, no IV, and ships the ciphertext as standard base64. ECB is
//! deterministic: the same payload under the same key always produces the
//! same ciphertext. That is a wire-compatibility requirement, not a choice —
//! the firmware will not speak anything else.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::payload::Payload;
use crate::error::{AcError, Result};

/// Protocol-fixed key used for discovery and binding. Public by design;
/// replaced by a device-issued session key after bind.
pub const DEFAULT_KEY: &[u8; 16] = b"a3K8Bx%2r8Y7#xDh";

const BLOCK_SIZE: usize = 16;

type EcbEnc = ecb::Encryptor<aes::Aes128>;
type EcbDec = ecb::Decryptor<aes::Aes128>;

/// Serialize and encrypt a payload into the base64 `pack` string.
pub fn encrypt_pack(payload: &Payload, key: &[u8]) -> Result<String> {
    let json = serde_json::to_vec(payload).map_err(|e| AcError::Codec {
        detail: format!("payload serialize: {}", e),
    })?;
    let cipher = EcbEnc::new_from_slice(key).map_err(|_| AcError::Codec {
        detail: format!("bad key length {}", key.len()),
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(&json);
    Ok(BASE64.encode(ciphertext))
}

/// Decode and decrypt a base64 `pack` string into a typed payload.
pub fn decrypt_pack(pack: &str, key: &[u8]) -> Result<Payload> {
    let ciphertext = BASE64.decode(pack).map_err(|e| AcError::Codec {
        detail: format!("base64: {}", e),
    })?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(AcError::Codec {
            detail: format!("ciphertext length {} not a block multiple", ciphertext.len()),
        });
    }
    let cipher = EcbDec::new_from_slice(key).map_err(|_| AcError::Codec {
        detail: format!("bad key length {}", key.len()),
    })?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| AcError::Codec {
            detail: "bad padding".into(),
        })?;
    serde_json::from_slice(&plaintext).map_err(|e| AcError::Codec {
        detail: format!("payload parse: {}", e),
    })
}
