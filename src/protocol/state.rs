//! Binding state machine
//!
//! Owns device identity, the session key and the last known property values.
//! Pure protocol logic: it consumes raw datagrams and produces wire bytes,
//! but never touches a socket — the client event loop does the I/O. All
//! mutation happens from that single task, so no locking is needed.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use tracing::{debug, trace, warn};

use crate::codec::{self, Payload, DEFAULT_KEY};
use crate::constants::TEMP_SENSOR_SHIFT;
use crate::error::Result;
use crate::protocol::props::{self, FanSpeed, Mode, VerticalSwing};

/// Binding lifecycle of the one device this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No device discovered; scans go to the well-known command port
    Unbound,
    /// Scan answered, bind request sent, waiting for the key
    AwaitingDeviceAck,
    /// Session key installed; polling and commands are live
    Bound,
}

/// Identity reported by the device during discovery.
///
/// Recorded once per binding session and immutable until the next discovery.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// MAC-like identifier, opaque string
    pub id: String,
    /// Friendly name from the dev answer
    pub name: String,
    pub address: IpAddr,
    pub port: u16,
}

/// Point-in-time copy of the device state handed to subscribers.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    pub id: String,
    pub name: String,
    pub bound: bool,
    /// Raw property values exactly as the device reported them
    pub props: BTreeMap<String, i64>,
}

impl DeviceSnapshot {
    pub fn get(&self, code: &str) -> Option<i64> {
        self.props.get(code).copied()
    }

    pub fn power(&self) -> Option<bool> {
        self.get(props::POWER).map(|v| v != 0)
    }

    pub fn mode(&self) -> Option<Mode> {
        self.get(props::MODE).and_then(Mode::from_value)
    }

    pub fn target_temp(&self) -> Option<i64> {
        self.get(props::TARGET_TEMP)
    }

    pub fn fan_speed(&self) -> Option<FanSpeed> {
        self.get(props::FAN_SPEED).and_then(FanSpeed::from_value)
    }

    /// Room temperature in °C. Most firmware reports the sensor shifted by
    /// +40; a few revisions report it unshifted, so small raw values pass
    /// through as-is. 0 means no sensor.
    pub fn room_temp(&self) -> Option<i64> {
        match self.get(props::ROOM_TEMP) {
            None | Some(0) => None,
            Some(raw) if raw > TEMP_SENSOR_SHIFT => Some(raw - TEMP_SENSOR_SHIFT),
            Some(raw) => Some(raw),
        }
    }

    /// True when the vertical louver sits in a fixed position.
    pub fn swing_fixed(&self) -> Option<bool> {
        self.get(props::SWING_VERTICAL).map(VerticalSwing::is_fixed)
    }
}

/// What an inbound datagram meant, after filtering and decryption.
#[derive(Debug)]
pub enum Inbound {
    /// Scan answered; the caller must send the bind request
    DeviceFound,
    /// Bind confirmed; session key installed
    Bound,
    /// Status poll answered
    Status(DeviceSnapshot),
    /// Command acknowledged
    Update(DeviceSnapshot),
    /// Undecryptable or out-of-place payload; state unchanged
    Error(String),
    /// Foreign source or duplicate; nothing to do
    Ignored,
}

/// What a poll tick decided.
#[derive(Debug, PartialEq, Eq)]
pub enum PollAction {
    /// Send a status request
    SendStatus,
    /// Too many unanswered polls; binding dropped, rediscovery needed
    Demoted,
}

/// The scan → bind → poll cycle for one device endpoint.
pub struct DeviceStateMachine {
    device_ip: IpAddr,
    command_port: u16,
    min_valid_temp: Option<i64>,
    max_missed_polls: u32,
    state: BindingState,
    identity: Option<DeviceIdentity>,
    key: Vec<u8>,
    props: BTreeMap<String, i64>,
    awaiting_poll: bool,
    missed_polls: u32,
}

impl DeviceStateMachine {
    pub fn new(
        device_ip: IpAddr,
        command_port: u16,
        min_valid_temp: Option<i64>,
        max_missed_polls: u32,
    ) -> Self {
        Self {
            device_ip,
            command_port,
            min_valid_temp,
            max_missed_polls,
            state: BindingState::Unbound,
            identity: None,
            key: DEFAULT_KEY.to_vec(),
            props: BTreeMap::new(),
            awaiting_poll: false,
            missed_polls: 0,
        }
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.state == BindingState::Bound
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Where the next request goes: the discovered endpoint once we have
    /// one, the well-known command port before that.
    pub fn target(&self) -> SocketAddr {
        match &self.identity {
            Some(identity) => SocketAddr::new(identity.address, identity.port),
            None => SocketAddr::new(self.device_ip, self.command_port),
        }
    }

    /// Reset to a clean unbound state and return the scan request bytes.
    pub fn start_discovery(&mut self) -> Vec<u8> {
        self.state = BindingState::Unbound;
        self.identity = None;
        self.key = DEFAULT_KEY.to_vec();
        self.awaiting_poll = false;
        self.missed_polls = 0;
        codec::encode_scan()
    }

    /// Wire bytes for the bind request. Only valid after a scan answer.
    pub fn bind_wire(&self) -> Result<Vec<u8>> {
        let identity = self.identity.as_ref().ok_or(crate::error::AcError::NotBound)?;
        let payload = Payload::Bind {
            mac: identity.id.clone(),
            uid: 0,
        };
        // The bind exchange runs under the default key with request index 1
        codec::encode_request(&payload, DEFAULT_KEY, 1, &identity.id)
    }

    /// Wire bytes for a full status request under the session key.
    pub fn status_wire(&self) -> Result<Vec<u8>> {
        let identity = self.identity.as_ref().ok_or(crate::error::AcError::NotBound)?;
        let payload = Payload::Status {
            mac: identity.id.clone(),
            cols: props::POLL_COLS.iter().map(|c| c.to_string()).collect(),
        };
        codec::encode_request(&payload, &self.key, 0, &identity.id)
    }

    /// Wire bytes for a command carrying the given code/value pairs.
    pub fn cmd_wire(&self, pairs: &[(String, i64)]) -> Result<Vec<u8>> {
        let identity = self.identity.as_ref().ok_or(crate::error::AcError::NotBound)?;
        let payload = Payload::Cmd {
            opt: pairs.iter().map(|(code, _)| code.clone()).collect(),
            p: pairs.iter().map(|(_, value)| *value).collect(),
        };
        codec::encode_request(&payload, &self.key, 0, &identity.id)
    }

    /// Process one inbound datagram.
    pub fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) -> Inbound {
        if from.ip() != self.device_ip {
            trace!(%from, expected = %self.device_ip, "dropping datagram from foreign source");
            return Inbound::Ignored;
        }

        let (envelope, payload) = match codec::decode_response(data, &self.key) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(%from, "undecodable datagram: {}", e);
                return Inbound::Error(e.to_string());
            }
        };

        match payload {
            Payload::Dev { name, mac } => self.on_dev(envelope.cid, name, mac, from),
            Payload::BindOk { key } => self.on_bindok(key),
            Payload::Dat { cols, dat } => {
                self.merge(&cols, &dat);
                self.awaiting_poll = false;
                self.missed_polls = 0;
                Inbound::Status(self.snapshot())
            }
            Payload::Res { opt, val } => {
                self.merge(&opt, &val);
                Inbound::Update(self.snapshot())
            }
            other => Inbound::Error(format!("unexpected payload from device: {:?}", other)),
        }
    }

    fn on_dev(&mut self, cid: String, name: String, mac: String, from: SocketAddr) -> Inbound {
        if self.state == BindingState::Bound {
            trace!("duplicate dev answer while bound");
            return Inbound::Ignored;
        }
        let id = if mac.is_empty() { cid } else { mac };
        if id.is_empty() {
            return Inbound::Error("device answered without an identifier".into());
        }
        debug!(%id, %name, %from, "device discovered");
        self.identity = Some(DeviceIdentity {
            id,
            name,
            address: from.ip(),
            port: from.port(),
        });
        self.state = BindingState::AwaitingDeviceAck;
        Inbound::DeviceFound
    }

    fn on_bindok(&mut self, key: String) -> Inbound {
        if self.state != BindingState::AwaitingDeviceAck {
            trace!("bindok outside of handshake, ignoring");
            return Inbound::Ignored;
        }
        self.key = key.into_bytes();
        self.state = BindingState::Bound;
        self.awaiting_poll = false;
        self.missed_polls = 0;
        Inbound::Bound
    }

    /// Called on every poll timer fire while bound.
    pub fn poll_tick(&mut self) -> PollAction {
        if self.awaiting_poll {
            self.missed_polls += 1;
            if self.missed_polls >= self.max_missed_polls {
                warn!(
                    missed = self.missed_polls,
                    "device stopped answering polls, dropping binding"
                );
                self.state = BindingState::Unbound;
                self.identity = None;
                self.key = DEFAULT_KEY.to_vec();
                self.awaiting_poll = false;
                self.missed_polls = 0;
                return PollAction::Demoted;
            }
        }
        self.awaiting_poll = true;
        PollAction::SendStatus
    }

    /// Merge parallel code/value arrays into the property map.
    ///
    /// Last writer wins per property; UDP gives no global ordering to honor.
    fn merge(&mut self, cols: &[String], values: &[i64]) {
        if cols.len() != values.len() {
            warn!(
                cols = cols.len(),
                values = values.len(),
                "code/value arrays differ in length, zipping to the shorter"
            );
        }
        for (code, &value) in cols.iter().zip(values.iter()) {
            if code == props::ROOM_TEMP {
                if let Some(floor) = self.min_valid_temp {
                    if value < floor {
                        debug!(%code, value, floor, "dropping implausible temperature reading");
                        continue;
                    }
                }
            }
            self.props.insert(code.clone(), value);
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let (id, name) = match &self.identity {
            Some(identity) => (identity.id.clone(), identity.name.clone()),
            None => (String::new(), String::new()),
        };
        DeviceSnapshot {
            id,
            name,
            bound: self.is_bound(),
            props: self.props.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encrypt_pack, RequestEnvelope};

    const DEVICE_ID: &str = "f4911e000000";
    const SESSION_KEY: &[u8] = b"Sup3rS3cretK3y!!";

    fn device_addr() -> SocketAddr {
        "192.168.1.50:7000".parse().unwrap()
    }

    /// Device-side datagram: payload encrypted under `key`, device id in cid.
    fn device_wire(payload: &Payload, key: &[u8]) -> Vec<u8> {
        let pack = encrypt_pack(payload, key).unwrap();
        let mut envelope = serde_json::to_value(RequestEnvelope::new(0, "app", pack)).unwrap();
        envelope["cid"] = serde_json::Value::String(DEVICE_ID.to_string());
        serde_json::to_vec(&envelope).unwrap()
    }

    fn machine() -> DeviceStateMachine {
        DeviceStateMachine::new("192.168.1.50".parse().unwrap(), 7000, None, 3)
    }

    fn bound_machine() -> DeviceStateMachine {
        let mut sm = machine();
        sm.start_discovery();
        let dev = device_wire(
            &Payload::Dev {
                name: "bedroom".into(),
                mac: DEVICE_ID.into(),
            },
            crate::codec::DEFAULT_KEY,
        );
        assert!(matches!(sm.handle_datagram(&dev, device_addr()), Inbound::DeviceFound));
        let bindok = device_wire(
            &Payload::BindOk {
                key: String::from_utf8(SESSION_KEY.to_vec()).unwrap(),
            },
            crate::codec::DEFAULT_KEY,
        );
        assert!(matches!(sm.handle_datagram(&bindok, device_addr()), Inbound::Bound));
        sm
    }

    #[test]
    fn test_discovery_then_bind_reaches_bound() {
        let sm = bound_machine();
        assert!(sm.is_bound());
        let identity = sm.identity().unwrap();
        assert_eq!(identity.id, DEVICE_ID);
        assert_eq!(identity.name, "bedroom");
        assert_eq!(sm.target(), device_addr());
    }

    #[test]
    fn test_foreign_source_is_ignored() {
        let mut sm = machine();
        sm.start_discovery();
        let dev = device_wire(
            &Payload::Dev {
                name: "imposter".into(),
                mac: "badbadbadbad".into(),
            },
            crate::codec::DEFAULT_KEY,
        );
        let foreign: SocketAddr = "192.168.1.99:7000".parse().unwrap();
        assert!(matches!(sm.handle_datagram(&dev, foreign), Inbound::Ignored));
        assert_eq!(sm.state(), BindingState::Unbound);
        assert!(sm.identity().is_none());
    }

    #[test]
    fn test_dat_merges_properties() {
        let mut sm = bound_machine();
        let dat = device_wire(
            &Payload::Dat {
                cols: vec!["Pow".into(), "SetTem".into()],
                dat: vec![1, 24],
            },
            SESSION_KEY,
        );
        match sm.handle_datagram(&dat, device_addr()) {
            Inbound::Status(snapshot) => {
                assert_eq!(snapshot.get("Pow"), Some(1));
                assert_eq!(snapshot.get("SetTem"), Some(24));
                assert_eq!(snapshot.power(), Some(true));
                assert_eq!(snapshot.target_temp(), Some(24));
            }
            other => panic!("unexpected inbound: {:?}", other),
        }
    }

    #[test]
    fn test_res_merges_without_touching_other_props() {
        let mut sm = bound_machine();
        let dat = device_wire(
            &Payload::Dat {
                cols: vec!["Pow".into(), "SetTem".into()],
                dat: vec![1, 24],
            },
            SESSION_KEY,
        );
        sm.handle_datagram(&dat, device_addr());

        let res = device_wire(
            &Payload::Res {
                opt: vec!["Mod".into()],
                val: vec![1],
            },
            SESSION_KEY,
        );
        match sm.handle_datagram(&res, device_addr()) {
            Inbound::Update(snapshot) => {
                assert_eq!(snapshot.get("Mod"), Some(1));
                assert_eq!(snapshot.get("Pow"), Some(1));
                assert_eq!(snapshot.get("SetTem"), Some(24));
            }
            other => panic!("unexpected inbound: {:?}", other),
        }
    }

    #[test]
    fn test_garbled_packet_reports_error_and_keeps_state() {
        let mut sm = bound_machine();
        let before = sm.snapshot();
        let inbound = sm.handle_datagram(b"{\"t\":\"pack\",\"pack\":\"AAAA\"}", device_addr());
        assert!(matches!(inbound, Inbound::Error(_)));
        assert!(sm.is_bound());
        assert_eq!(sm.snapshot().props, before.props);
    }

    #[test]
    fn test_poll_demotion_after_missed_polls() {
        let mut sm = bound_machine();
        assert_eq!(sm.poll_tick(), PollAction::SendStatus);
        // Three unanswered polls, then the binding drops
        assert_eq!(sm.poll_tick(), PollAction::SendStatus);
        assert_eq!(sm.poll_tick(), PollAction::SendStatus);
        assert_eq!(sm.poll_tick(), PollAction::Demoted);
        assert_eq!(sm.state(), BindingState::Unbound);
        assert!(sm.identity().is_none());
    }

    #[test]
    fn test_answered_poll_resets_miss_counter() {
        let mut sm = bound_machine();
        assert_eq!(sm.poll_tick(), PollAction::SendStatus);
        assert_eq!(sm.poll_tick(), PollAction::SendStatus);
        let dat = device_wire(
            &Payload::Dat {
                cols: vec!["Pow".into()],
                dat: vec![1],
            },
            SESSION_KEY,
        );
        sm.handle_datagram(&dat, device_addr());
        for _ in 0..3 {
            assert_eq!(sm.poll_tick(), PollAction::SendStatus);
        }
    }

    #[test]
    fn test_min_valid_temp_filters_room_temp_only() {
        let mut sm = DeviceStateMachine::new("192.168.1.50".parse().unwrap(), 7000, Some(5), 3);
        sm.start_discovery();
        let dev = device_wire(
            &Payload::Dev {
                name: String::new(),
                mac: DEVICE_ID.into(),
            },
            crate::codec::DEFAULT_KEY,
        );
        sm.handle_datagram(&dev, device_addr());
        let bindok = device_wire(
            &Payload::BindOk {
                key: String::from_utf8(SESSION_KEY.to_vec()).unwrap(),
            },
            crate::codec::DEFAULT_KEY,
        );
        sm.handle_datagram(&bindok, device_addr());

        let dat = device_wire(
            &Payload::Dat {
                cols: vec!["TemSen".into(), "SetTem".into()],
                dat: vec![2, 24],
            },
            SESSION_KEY,
        );
        match sm.handle_datagram(&dat, device_addr()) {
            Inbound::Status(snapshot) => {
                // Implausible sensor value dropped, the rest of the datagram applies
                assert_eq!(snapshot.get("TemSen"), None);
                assert_eq!(snapshot.get("SetTem"), Some(24));
            }
            other => panic!("unexpected inbound: {:?}", other),
        }
    }

    #[test]
    fn test_room_temp_shift() {
        let snapshot = DeviceSnapshot {
            props: [("TemSen".to_string(), 63i64)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(snapshot.room_temp(), Some(23));

        // Unshifted firmware value passes through
        let snapshot = DeviceSnapshot {
            props: [("TemSen".to_string(), 23i64)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(snapshot.room_temp(), Some(23));

        // Zero means no sensor
        let snapshot = DeviceSnapshot {
            props: [("TemSen".to_string(), 0i64)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(snapshot.room_temp(), None);
    }

    #[test]
    fn test_bindok_outside_handshake_is_ignored() {
        let mut sm = machine();
        sm.start_discovery();
        let bindok = device_wire(
            &Payload::BindOk {
                key: String::from_utf8(SESSION_KEY.to_vec()).unwrap(),
            },
            crate::codec::DEFAULT_KEY,
        );
        assert!(matches!(sm.handle_datagram(&bindok, device_addr()), Inbound::Ignored));
        assert_eq!(sm.state(), BindingState::Unbound);
    }
}
