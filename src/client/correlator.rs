//! Request correlation
//!
//! Strict single-flight: one logical request may be outstanding at a time.
//! The device answers on one socket with no sequence numbers, so there is
//! nothing to key concurrent requests on. A second request while one is
//! pending fails fast with `Busy`; a response arriving after its request
//! timed out finds an empty slot and is treated as an unsolicited update.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{AcError, Result};
use crate::protocol::DeviceSnapshot;

/// Which response resolves the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Resolved by a `dat` status answer
    Status,
    /// Resolved by a `res` command acknowledgement
    Command,
}

struct PendingRequest {
    kind: RequestKind,
    reply: oneshot::Sender<Result<DeviceSnapshot>>,
    deadline: Instant,
}

/// The single request slot.
pub struct Correlator {
    slot: Option<PendingRequest>,
    timeout: Duration,
}

impl Correlator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slot: None,
            timeout,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.slot.is_some()
    }

    /// Deadline of the pending request, if any. The event loop arms a sleep
    /// on this.
    pub fn deadline(&self) -> Option<Instant> {
        self.slot.as_ref().map(|p| p.deadline)
    }

    /// Occupy the slot. Fails with `Busy` when a request is already in
    /// flight; the reply channel is answered before the error returns.
    pub fn begin(
        &mut self,
        kind: RequestKind,
        reply: oneshot::Sender<Result<DeviceSnapshot>>,
    ) -> Result<()> {
        if self.slot.is_some() {
            let _ = reply.send(Err(AcError::Busy));
            return Err(AcError::Busy);
        }
        self.slot = Some(PendingRequest {
            kind,
            reply,
            deadline: Instant::now() + self.timeout,
        });
        Ok(())
    }

    /// Resolve the pending request if `kind` matches. Returns true when a
    /// caller was answered.
    pub fn resolve(&mut self, kind: RequestKind, snapshot: &DeviceSnapshot) -> bool {
        if self.slot.as_ref().map(|p| p.kind) != Some(kind) {
            return false;
        }
        let pending = self.slot.take().expect("checked above");
        let _ = pending.reply.send(Ok(snapshot.clone()));
        true
    }

    /// Expire the pending request if its deadline has passed, freeing the
    /// slot for the next caller.
    pub fn expire(&mut self, now: Instant) {
        let expired = self.slot.as_ref().is_some_and(|p| now >= p.deadline);
        if expired {
            let pending = self.slot.take().expect("checked above");
            let _ = pending.reply.send(Err(AcError::Timeout {
                after: self.timeout,
            }));
        }
    }

    /// Fail the pending request, if any, with the given error.
    pub fn abort(&mut self, err: AcError) {
        if let Some(pending) = self.slot.take() {
            let _ = pending.reply.send(Err(err));
        }
    }
}
