//! Pending response registry
//!
//! Requests that expect an answer register the `(command class, command)`
//! they are waiting for. Inbound commands are offered to the registry in
//! registration order; the first live entry that accepts the payload wins.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::core::command_class;
use crate::core::commands::{network_management_proxy, zip_nd};
use crate::transport::{Deadline, TimerCheck};

/// Handle to a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseToken(u64);

impl ResponseToken {
    #[cfg(test)]
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw token value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A command received from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Command class.
    pub command_class: u8,
    /// Command.
    pub command: u8,
    /// Command payload.
    pub payload: Vec<u8>,
}

/// How a registration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// A matching command arrived.
    Received(Response),
    /// Nothing matched before the deadline.
    TimedOut,
    /// The session closed first.
    Closed,
}

/// Payload offset holding the correlation value for a response command.
///
/// Node List Report and Node Info Cached Report echo the request's sequence
/// number in byte 0; Node Advertisement carries the node id in byte 1.
/// Other commands have no offset, and a correlation value registered for
/// them is ignored.
pub fn correlation_offset(command_class: u8, command: u8) -> Option<usize> {
    match (command_class, command) {
        (command_class::NETWORK_MANAGEMENT_PROXY, network_management_proxy::NODE_LIST_REPORT)
        | (
            command_class::NETWORK_MANAGEMENT_PROXY,
            network_management_proxy::NODE_INFO_CACHED_REPORT,
        ) => Some(0),
        (command_class::ZIP_ND, zip_nd::NODE_ADVERTISEMENT) => Some(1),
        _ => None,
    }
}

#[derive(Debug)]
struct PendingResponse {
    token: ResponseToken,
    command_class: u8,
    command: u8,
    correlation: Option<u8>,
    wrapped: bool,
    deadline: Deadline,
    completion: oneshot::Sender<ResponseOutcome>,
    timer: Option<AbortHandle>,
}

impl PendingResponse {
    fn accepts(&self, command_class: u8, command: u8, wrapped: bool, payload: &[u8]) -> bool {
        if self.command_class != command_class || self.command != command || self.wrapped != wrapped
        {
            return false;
        }
        if self.deadline.has_elapsed() {
            // its timer will remove it
            return false;
        }
        match (self.correlation, correlation_offset(command_class, command)) {
            (Some(expected), Some(offset)) => payload.get(offset) == Some(&expected),
            _ => true,
        }
    }

    fn complete(self, outcome: ResponseOutcome) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        let _ = self.completion.send(outcome);
    }
}

/// Per-session table of requests waiting for a response.
#[derive(Debug, Default)]
pub struct ResponseRegistry {
    entries: Vec<PendingResponse>,
    next_token: u64,
}

impl ResponseRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a response.
    ///
    /// `correlation` is compared with the payload byte given by
    /// [`correlation_offset`]; `None` accepts any payload. `wrapped` selects
    /// Z/IP Packet or raw responses.
    pub fn register(
        &mut self,
        command_class: u8,
        command: u8,
        correlation: Option<u8>,
        timeout: Duration,
        wrapped: bool,
        completion: oneshot::Sender<ResponseOutcome>,
    ) -> ResponseToken {
        let token = ResponseToken(self.next_token);
        self.next_token += 1;

        self.entries.push(PendingResponse {
            token,
            command_class,
            command,
            correlation,
            wrapped,
            deadline: Deadline::after(timeout),
            completion,
            timer: None,
        });
        token
    }

    /// Attach the timer watching a registration.
    pub fn attach_timer(&mut self, token: ResponseToken, timer: AbortHandle) {
        match self.entries.iter_mut().find(|e| e.token == token) {
            Some(entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }
    }

    /// Offer an inbound command. Returns `true` if a registration took it.
    pub fn match_and_complete(
        &mut self,
        command_class: u8,
        command: u8,
        wrapped: bool,
        payload: &[u8],
    ) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|e| e.accepts(command_class, command, wrapped, payload))
        else {
            trace!(command_class, command, "unmatched response discarded");
            return false;
        };

        let entry = self.entries.remove(index);
        debug!(token = entry.token.0, "response matched");
        entry.complete(ResponseOutcome::Received(Response {
            command_class,
            command,
            payload: payload.to_vec(),
        }));
        true
    }

    /// Handle the timer of a registration firing.
    pub fn on_timer(&mut self, token: ResponseToken) -> TimerCheck {
        let Some(index) = self.position(token) else {
            return TimerCheck::Done;
        };

        let deadline = self.entries[index].deadline;
        if !deadline.has_elapsed() {
            return TimerCheck::Rearm(deadline.remaining());
        }

        let mut entry = self.entries.remove(index);
        debug!(token = token.0, "response timed out");
        entry.timer = None;
        entry.complete(ResponseOutcome::TimedOut);
        TimerCheck::Done
    }

    /// Remove a registration without completing it.
    pub fn cancel(&mut self, token: ResponseToken) -> bool {
        let Some(index) = self.position(token) else {
            return false;
        };
        let entry = self.entries.remove(index);
        if let Some(timer) = &entry.timer {
            timer.abort();
        }
        true
    }

    /// Move a registration's deadline to `timeout` from now.
    pub fn extend(&mut self, token: ResponseToken, timeout: Duration) -> bool {
        match self.entries.iter_mut().find(|e| e.token == token) {
            Some(entry) => {
                entry.deadline.reset_after(timeout);
                true
            }
            None => false,
        }
    }

    /// Time left before a registration expires.
    pub fn remaining(&self, token: ResponseToken) -> Option<Duration> {
        self.position(token)
            .map(|index| self.entries[index].deadline.remaining())
    }

    /// Complete every registration with `outcome` and empty the registry.
    pub fn drain(&mut self, outcome: ResponseOutcome) {
        for entry in self.entries.drain(..) {
            entry.complete(outcome.clone());
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no registration is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, token: ResponseToken) -> Option<usize> {
        self.entries.iter().position(|e| e.token == token)
    }
}
