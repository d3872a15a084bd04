//! Device client facade
//!
//! The public surface of the crate. `DeviceClient::connect` spawns one
//! event-loop task that owns all protocol state; facade methods talk to it
//! over a command channel, so callers on any task get serialized entry into
//! the single-threaded core. Notifications flow the other way on a
//! broadcast channel.

pub mod correlator;
pub mod event;

pub use event::Event;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::constants::{CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY};
use crate::error::{AcError, Result};
use crate::protocol::state::PollAction;
use crate::protocol::{DeviceSnapshot, DeviceStateMachine, Inbound, StatePatch};
use crate::transport::{self, Datagram, UdpTransport};
use correlator::{Correlator, RequestKind};

/// Deadline placeholder while no request is pending; the guard keeps the
/// branch disabled, this just has to be a valid instant.
const IDLE_DEADLINE: Duration = Duration::from_secs(3600);

enum Command {
    Status {
        refresh: bool,
        reply: oneshot::Sender<Result<DeviceSnapshot>>,
    },
    Set {
        pairs: Vec<(String, i64)>,
        reply: oneshot::Sender<Result<DeviceSnapshot>>,
    },
    Shutdown,
}

/// Handle to one device.
///
/// Cloneable and usable from any task; dropping the last handle (or calling
/// [`DeviceClient::shutdown`]) stops the event loop, cancels all timers and
/// pending requests, and releases the socket.
#[derive(Clone, Debug)]
pub struct DeviceClient {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
}

impl DeviceClient {
    /// Discover and bind the configured device.
    ///
    /// Drives the scan → bind handshake and returns once the binding is
    /// live. Fails with [`AcError::Bind`] after `max_connect_attempts`
    /// discovery rounds; retrying the whole connect is the caller's call.
    pub async fn connect(config: DeviceConfig) -> Result<DeviceClient> {
        let device_ip = config.validate()?;
        let local_port = config
            .local_port
            .unwrap_or_else(|| transport::derive_local_port(&device_ip));
        let (udp, datagrams) = UdpTransport::bind(local_port).await?;
        info!(
            device = %device_ip,
            local_port = udp.local_port(),
            "initializing device client"
        );

        let sm = DeviceStateMachine::new(
            device_ip,
            config.command_port,
            config.min_valid_temp,
            config.max_missed_polls,
        );
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        let event_loop = EventLoop {
            update_interval: config.update_interval(),
            retry_interval: config.retry_interval(),
            max_connect_attempts: config.max_connect_attempts,
            sm,
            udp,
            datagrams,
            cmd_rx,
            events: event_tx.clone(),
            correlator: Correlator::new(config.request_timeout()),
            connect_reply: Some(ready_tx),
            connect_attempts: 0,
        };
        tokio::spawn(event_loop.run());

        ready_rx.await.map_err(|_| AcError::Closed)??;
        Ok(DeviceClient {
            cmd_tx,
            events: event_tx,
        })
    }

    /// Last known device state. With `refresh`, forces an immediate status
    /// round-trip instead of waiting for the next poll tick.
    pub async fn status(&self, refresh: bool) -> Result<DeviceSnapshot> {
        self.request(|reply| Command::Status { refresh, reply }).await
    }

    /// Apply a partial desired-state write. Only the fields present in the
    /// patch go on the wire; returns the snapshot after the device's ack.
    pub async fn set_state(&self, patch: StatePatch) -> Result<DeviceSnapshot> {
        self.request(|reply| Command::Set {
            pairs: patch.pairs(),
            reply,
        })
        .await
    }

    /// Raw escape hatch: send explicit code/value pairs as one command.
    pub async fn send_command(&self, pairs: Vec<(String, i64)>) -> Result<DeviceSnapshot> {
        self.request(|reply| Command::Set { pairs, reply }).await
    }

    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Stop the event loop: cancels the poll and retry timers, rejects any
    /// pending request, and releases the socket.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    async fn request<F>(&self, build: F) -> Result<DeviceSnapshot>
    where
        F: FnOnce(oneshot::Sender<Result<DeviceSnapshot>>) -> Command,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| AcError::Closed)?;
        reply_rx.await.map_err(|_| AcError::Closed)?
    }
}

/// The single-threaded core: all protocol state mutation happens here, one
/// event at a time.
struct EventLoop {
    update_interval: Duration,
    retry_interval: Duration,
    max_connect_attempts: u32,
    sm: DeviceStateMachine,
    udp: UdpTransport,
    datagrams: mpsc::Receiver<Datagram>,
    cmd_rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
    correlator: Correlator,
    connect_reply: Option<oneshot::Sender<Result<()>>>,
    connect_attempts: u32,
}

impl EventLoop {
    async fn run(mut self) {
        // First discovery round goes out immediately
        let scan = self.sm.start_discovery();
        self.udp.send_to(&scan, self.sm.target()).await;
        self.connect_attempts = 1;

        let mut poll = interval_at(
            Instant::now() + self.update_interval,
            self.update_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut retry = interval_at(Instant::now() + self.retry_interval, self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.correlator.deadline();
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        // Channel closed = every client handle is gone
                        None | Some(Command::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                datagram = self.datagrams.recv() => {
                    match datagram {
                        Some((data, from)) => self.handle_datagram(&data, from).await,
                        None => break,
                    }
                }
                _ = poll.tick(), if self.sm.is_bound() => {
                    self.handle_poll_tick().await;
                }
                _ = retry.tick(), if !self.sm.is_bound() => {
                    if !self.handle_retry_tick().await {
                        break;
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE)),
                    if deadline.is_some() =>
                {
                    self.correlator.expire(Instant::now());
                }
            }
        }

        // Teardown: nothing survives the loop - no timer fires again, no
        // caller is left hanging, the socket task stops.
        self.correlator.abort(AcError::Closed);
        if let Some(reply) = self.connect_reply.take() {
            let _ = reply.send(Err(AcError::Closed));
        }
        self.udp.shutdown();
        info!("device client stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Status { refresh: false, reply } => {
                let _ = reply.send(Ok(self.sm.snapshot()));
            }
            Command::Status { refresh: true, reply } => {
                if !self.sm.is_bound() {
                    let _ = reply.send(Err(AcError::NotBound));
                    return;
                }
                if self.correlator.begin(RequestKind::Status, reply).is_err() {
                    return;
                }
                match self.sm.status_wire() {
                    Ok(wire) => self.udp.send_to(&wire, self.sm.target()).await,
                    Err(e) => self.correlator.abort(e),
                }
            }
            Command::Set { pairs, reply } => {
                if !self.sm.is_bound() {
                    let _ = reply.send(Err(AcError::NotBound));
                    return;
                }
                if pairs.is_empty() {
                    let _ = reply.send(Ok(self.sm.snapshot()));
                    return;
                }
                if self.correlator.begin(RequestKind::Command, reply).is_err() {
                    return;
                }
                match self.sm.cmd_wire(&pairs) {
                    Ok(wire) => self.udp.send_to(&wire, self.sm.target()).await,
                    Err(e) => self.correlator.abort(e),
                }
            }
            Command::Shutdown => {}
        }
    }

    async fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) {
        match self.sm.handle_datagram(data, from) {
            Inbound::DeviceFound => match self.sm.bind_wire() {
                Ok(wire) => self.udp.send_to(&wire, self.sm.target()).await,
                Err(e) => warn!("bind request build failed: {}", e),
            },
            Inbound::Bound => {
                let snapshot = self.sm.snapshot();
                info!(id = %snapshot.id, name = %snapshot.name, "bound to device");
                if let Some(reply) = self.connect_reply.take() {
                    let _ = reply.send(Ok(()));
                }
                self.emit(Event::Connected(snapshot));
                // Prime the property map right away instead of waiting a
                // full poll interval
                if self.sm.poll_tick() == PollAction::SendStatus {
                    if let Ok(wire) = self.sm.status_wire() {
                        self.udp.send_to(&wire, self.sm.target()).await;
                    }
                }
            }
            Inbound::Status(snapshot) => {
                self.correlator.resolve(RequestKind::Status, &snapshot);
                self.emit(Event::Status(snapshot));
            }
            Inbound::Update(snapshot) => {
                self.correlator.resolve(RequestKind::Command, &snapshot);
                self.emit(Event::Update(snapshot));
            }
            Inbound::Error(detail) => self.emit(Event::Error { detail }),
            Inbound::Ignored => {}
        }
    }

    async fn handle_poll_tick(&mut self) {
        if self.correlator.has_pending() {
            // A caller-driven request is in flight; coalesce this tick
            return;
        }
        match self.sm.poll_tick() {
            PollAction::SendStatus => match self.sm.status_wire() {
                Ok(wire) => self.udp.send_to(&wire, self.sm.target()).await,
                Err(e) => warn!("status request build failed: {}", e),
            },
            PollAction::Demoted => {
                self.emit(Event::Disconnected);
                let scan = self.sm.start_discovery();
                self.udp.send_to(&scan, self.sm.target()).await;
            }
        }
    }

    /// Returns false when the connect retry budget is spent and the loop
    /// should stop.
    async fn handle_retry_tick(&mut self) -> bool {
        if self.connect_reply.is_some() {
            if self.connect_attempts >= self.max_connect_attempts {
                let reply = self.connect_reply.take().expect("checked above");
                let _ = reply.send(Err(AcError::Bind {
                    attempts: self.connect_attempts,
                }));
                return false;
            }
            self.connect_attempts += 1;
        }
        debug!(attempt = self.connect_attempts, "discovery scan");
        let scan = self.sm.start_discovery();
        self.udp.send_to(&scan, self.sm.target()).await;
        true
    }

    fn emit(&self, event: Event) {
        debug!(kind = event.kind(), "event");
        // Send fails only when nobody subscribes, which is fine
        let _ = self.events.send(event);
    }
}
