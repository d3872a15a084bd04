//! Typed inner payloads
//!
//! One enum for every message the device sends or accepts, tagged by the
//! wire field `t`. Commands and status answers carry parallel code/value
//! arrays — positions correspond 1:1, there is no named-field form.

use serde::{Deserialize, Serialize};

/// All inner payload types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Payload {
    /// Discovery probe, sent bare (no envelope, no encryption)
    #[serde(rename = "scan")]
    Scan,
    /// Discovery answer: the device introduces itself
    #[serde(rename = "dev")]
    Dev {
        #[serde(default)]
        name: String,
        #[serde(default)]
        mac: String,
    },
    /// Handshake request, encrypted with the default key
    #[serde(rename = "bind")]
    Bind { mac: String, uid: i64 },
    /// Handshake answer carrying the session key
    #[serde(rename = "bindok")]
    BindOk { key: String },
    /// Poll request listing the property codes to report
    #[serde(rename = "status")]
    Status { mac: String, cols: Vec<String> },
    /// Poll answer: `cols[i]` holds the code for value `dat[i]`
    #[serde(rename = "dat")]
    Dat { cols: Vec<String>, dat: Vec<i64> },
    /// Write request: `opt[i]` is set to `p[i]`
    #[serde(rename = "cmd")]
    Cmd { opt: Vec<String>, p: Vec<i64> },
    /// Write acknowledgement echoing the applied values
    #[serde(rename = "res")]
    Res { opt: Vec<String>, val: Vec<i64> },
}
