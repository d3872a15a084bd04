//! Outer JSON envelope
//!
//! Every encrypted exchange travels inside a small JSON object:
//! `{"cid":"app","i":0,"t":"pack","uid":0,"tcid":"<mac>","pack":"<base64>"}`.
//! Responses reuse the same shape with the device's identifier in `cid`.

use serde::{Deserialize, Serialize};

/// Envelope for an outbound encrypted request.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a> {
    /// Fixed client identifier
    pub cid: &'static str,
    /// Request index: 1 for bind, 0 for everything else
    pub i: u8,
    /// Always "pack" for enveloped requests
    pub t: &'static str,
    pub uid: u8,
    /// Target device identifier (empty until discovery)
    pub tcid: &'a str,
    /// Encrypted inner payload, base64 text
    pub pack: String,
}

impl<'a> RequestEnvelope<'a> {
    pub fn new(i: u8, tcid: &'a str, pack: String) -> Self {
        Self {
            cid: "app",
            i,
            t: "pack",
            uid: 0,
            tcid,
            pack,
        }
    }
}

/// Envelope of an inbound datagram.
///
/// Parsed leniently: firmware revisions disagree on which fields they fill
/// in, so everything except `pack` is optional with an empty default.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub t: String,
    /// Device identifier on responses
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub uid: i64,
    pub pack: Option<String>,
}
