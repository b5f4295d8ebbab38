//! ACK reservation table
//!
//! Maps each 8-bit sequence number to the outbound Z/IP Packet waiting for
//! the gateway's ACK. A sequence number stays reserved until its entry is
//! acknowledged, rejected, or expires; NAK qualifiers only push the deadline.

use std::time::Duration;

use rand::{rngs::OsRng, Rng};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::pending::ResponseToken;
use crate::core::SEQUENCE_SPACE;
use crate::transport::{Deadline, TimerCheck};

/// How an ACK reservation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The gateway acknowledged the packet.
    Acked,
    /// The gateway rejected the packet (plain NAK).
    Rejected,
    /// No ACK arrived before the deadline.
    TimedOut,
    /// The session closed first.
    Closed,
}

/// NAK qualifier carried in the first flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakKind {
    /// No qualifier: the request is refused.
    Reject,
    /// The gateway queue is full; send again later.
    QueueFull,
    /// The gateway is still working on the request.
    Waiting,
}

/// What the session has to do after a NAK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NakAction {
    /// The reservation was removed and completed as rejected.
    Rejected,
    /// Deadline extended; the stored packet must be sent again after the
    /// back-off, and the linked response (if any) extended.
    Retransmit {
        /// Reservation generation, to detect reuse of the sequence number.
        id: u64,
        /// Linked response registration.
        linked: Option<ResponseToken>,
    },
    /// Deadline extended; the linked response (if any) must be extended too.
    Extended {
        /// Linked response registration.
        linked: Option<ResponseToken>,
    },
    /// No live reservation for this sequence number.
    Ignored,
}

/// A claimed sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Sequence number to put on the wire.
    pub sequence_number: u8,
    /// Generation of this reservation.
    pub id: u64,
}

#[derive(Debug)]
struct AckReservation {
    id: u64,
    deadline: Deadline,
    packet: Vec<u8>,
    linked: Option<ResponseToken>,
    completion: oneshot::Sender<AckOutcome>,
    timer: Option<AbortHandle>,
}

impl AckReservation {
    fn complete(self, outcome: AckOutcome) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
        // the waiter may have given up already
        let _ = self.completion.send(outcome);
    }
}

/// Per-session table of packets awaiting an ACK.
#[derive(Debug)]
pub struct AckTable {
    slots: Vec<Option<AckReservation>>,
    current: u8,
    next_id: u64,
    queue_full_extension: Duration,
    waiting_extension: Duration,
}

impl AckTable {
    /// Create a table whose first reservation is `current + 1`.
    pub fn new(current: u8, queue_full_extension: Duration, waiting_extension: Duration) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(SEQUENCE_SPACE).collect(),
            current,
            next_id: 0,
            queue_full_extension,
            waiting_extension,
        }
    }

    /// Create a table with a cryptographically random starting point.
    pub fn with_random_start(queue_full_extension: Duration, waiting_extension: Duration) -> Self {
        Self::new(OsRng.r#gen(), queue_full_extension, waiting_extension)
    }

    /// Claim the next free sequence number.
    ///
    /// Probes all 256 numbers starting after the last one handed out. Free
    /// slots are claimed, expired entries are evicted (completing them as
    /// timed out) and live entries are skipped. Returns `None` only when
    /// every number has a live, unexpired reservation.
    pub fn reserve(
        &mut self,
        timeout: Duration,
        linked: Option<ResponseToken>,
        completion: oneshot::Sender<AckOutcome>,
    ) -> Option<Reservation> {
        for step in 1..=SEQUENCE_SPACE {
            let candidate = self.current.wrapping_add(step as u8);
            let slot = &mut self.slots[candidate as usize];

            if let Some(existing) = slot {
                if !existing.deadline.has_elapsed() {
                    continue;
                }
                if let Some(evicted) = slot.take() {
                    debug!(seq = candidate, "evicting expired reservation");
                    evicted.complete(AckOutcome::TimedOut);
                }
            }

            let id = self.next_id;
            self.next_id += 1;
            *slot = Some(AckReservation {
                id,
                deadline: Deadline::after(timeout),
                packet: Vec::new(),
                linked,
                completion,
                timer: None,
            });
            self.current = candidate;

            debug!(seq = candidate, id, "reserved sequence number");
            return Some(Reservation {
                sequence_number: candidate,
                id,
            });
        }

        warn!("all {} sequence numbers are in use", SEQUENCE_SPACE);
        None
    }

    /// Store the encoded packet for retransmission.
    pub fn store_packet(&mut self, reservation: Reservation, packet: Vec<u8>) {
        if let Some(entry) = self.entry_mut(reservation) {
            entry.packet = packet;
        }
    }

    /// Attach the timer watching a reservation.
    pub fn attach_timer(&mut self, reservation: Reservation, timer: AbortHandle) {
        match self.entry_mut(reservation) {
            Some(entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }
    }

    /// Handle an ACK. Returns `true` if a waiting request was completed.
    ///
    /// An ACK arriving after the deadline is ignored; the entry's timer
    /// completes it as timed out.
    pub fn on_ack(&mut self, sequence_number: u8) -> bool {
        let slot = &mut self.slots[sequence_number as usize];
        let Some(entry) = slot.as_ref() else {
            return false;
        };
        if entry.deadline.has_elapsed() {
            debug!(seq = sequence_number, "late ACK left to the timer");
            return false;
        }

        if let Some(entry) = slot.take() {
            debug!(seq = sequence_number, "ACK received");
            entry.complete(AckOutcome::Acked);
        }
        true
    }

    /// Handle a NAK.
    pub fn on_nak(&mut self, sequence_number: u8, kind: NakKind) -> NakAction {
        let (queue_full_extension, waiting_extension) =
            (self.queue_full_extension, self.waiting_extension);
        let slot = &mut self.slots[sequence_number as usize];

        let Some(entry) = slot.as_mut() else {
            return NakAction::Ignored;
        };
        if entry.deadline.has_elapsed() {
            return NakAction::Ignored;
        }

        match kind {
            NakKind::Reject => {
                if let Some(entry) = slot.take() {
                    debug!(seq = sequence_number, "NAK received, request rejected");
                    entry.complete(AckOutcome::Rejected);
                }
                NakAction::Rejected
            }
            NakKind::QueueFull => {
                entry.deadline.reset_after(queue_full_extension);
                debug!(seq = sequence_number, "NAK queue full, retransmit scheduled");
                NakAction::Retransmit {
                    id: entry.id,
                    linked: entry.linked,
                }
            }
            NakKind::Waiting => {
                entry.deadline.reset_after(waiting_extension);
                debug!(seq = sequence_number, "NAK waiting, deadline extended");
                NakAction::Extended {
                    linked: entry.linked,
                }
            }
        }
    }

    /// Handle the timer of a reservation firing.
    pub fn on_timer(&mut self, reservation: Reservation) -> TimerCheck {
        let slot = &mut self.slots[reservation.sequence_number as usize];
        let Some(entry) = slot.as_ref().filter(|e| e.id == reservation.id) else {
            return TimerCheck::Done;
        };

        if !entry.deadline.has_elapsed() {
            return TimerCheck::Rearm(entry.deadline.remaining());
        }

        if let Some(mut entry) = slot.take() {
            debug!(seq = reservation.sequence_number, "ACK timed out");
            // this is the running timer, nothing to abort
            entry.timer = None;
            entry.complete(AckOutcome::TimedOut);
        }
        TimerCheck::Done
    }

    /// Remove a reservation without completing it (transmission failed).
    pub fn remove(&mut self, reservation: Reservation) -> Option<ResponseToken> {
        let slot = &mut self.slots[reservation.sequence_number as usize];
        if slot.as_ref().is_some_and(|e| e.id == reservation.id) {
            let entry = slot.take()?;
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
            return entry.linked;
        }
        None
    }

    /// Get the stored packet of a live reservation.
    pub fn packet(&self, reservation: Reservation) -> Option<&[u8]> {
        self.slots[reservation.sequence_number as usize]
            .as_ref()
            .filter(|e| e.id == reservation.id)
            .map(|e| e.packet.as_slice())
    }

    /// Time left before a reservation expires.
    pub fn remaining(&self, sequence_number: u8) -> Option<Duration> {
        self.slots[sequence_number as usize]
            .as_ref()
            .map(|e| e.deadline.remaining())
    }

    /// Complete every reservation with `outcome` and empty the table.
    pub fn drain(&mut self, outcome: AckOutcome) {
        for slot in &mut self.slots {
            if let Some(entry) = slot.take() {
                entry.complete(outcome);
            }
        }
    }

    /// Last sequence number handed out.
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Number of live reservations.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if no reservation is held.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn entry_mut(&mut self, reservation: Reservation) -> Option<&mut AckReservation> {
        self.slots[reservation.sequence_number as usize]
            .as_mut()
            .filter(|e| e.id == reservation.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ACK_TIMEOUT, QUEUE_FULL_EXTENSION, WAITING_EXTENSION};

    fn table(current: u8) -> AckTable {
        AckTable::new(current, QUEUE_FULL_EXTENSION, WAITING_EXTENSION)
    }

    fn reserve(table: &mut AckTable) -> (Reservation, oneshot::Receiver<AckOutcome>) {
        let (tx, rx) = oneshot::channel();
        let reservation = table.reserve(ACK_TIMEOUT, None, tx).unwrap();
        (reservation, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_sequential() {
        let mut table = table(10);

        let (first, _rx1) = reserve(&mut table);
        let (second, _rx2) = reserve(&mut table);
        assert_eq!(first.sequence_number, 11);
        assert_eq!(second.sequence_number, 12);
        assert_ne!(first.id, second.id);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_wraps_around() {
        let mut table = table(255);
        let (reservation, _rx) = reserve(&mut table);
        assert_eq!(reservation.sequence_number, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_exhaustion() {
        let mut table = table(0);
        let mut receivers = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..256 {
            let (reservation, rx) = reserve(&mut table);
            assert!(seen.insert(reservation.sequence_number));
            receivers.push(rx);
        }

        let (tx, _rx) = oneshot::channel();
        assert!(table.reserve(ACK_TIMEOUT, None, tx).is_none());
        assert_eq!(table.len(), 256);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_skips_live_entries() {
        let mut table = table(0);
        let (first, _rx) = reserve(&mut table);
        assert_eq!(first.sequence_number, 1);

        // walk the counter all the way round so the next probe starts at 1
        let mut others = Vec::new();
        for _ in 0..254 {
            others.push(reserve(&mut table));
        }
        assert_eq!(table.current(), 255);

        let (next, _rx) = reserve(&mut table);
        assert_eq!(next.sequence_number, 0);
        let (tx, _rx2) = oneshot::channel();
        assert!(table.reserve(ACK_TIMEOUT, None, tx).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_evicts_expired() {
        let mut table = table(0);
        let mut receivers = Vec::new();
        for _ in 0..256 {
            receivers.push(reserve(&mut table).1);
        }

        tokio::time::advance(ACK_TIMEOUT).await;

        let (reservation, _rx) = reserve(&mut table);
        assert_eq!(reservation.sequence_number, 1);

        let mut evicted = receivers.remove(0);
        assert_eq!(evicted.try_recv().unwrap(), AckOutcome::TimedOut);
        assert!(receivers[0].try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_completes() {
        let mut table = table(0);
        let (reservation, mut rx) = reserve(&mut table);

        assert!(table.on_ack(reservation.sequence_number));
        assert_eq!(rx.try_recv().unwrap(), AckOutcome::Acked);
        assert!(table.is_empty());

        // duplicate ACK is ignored
        assert!(!table.on_ack(reservation.sequence_number));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_ack_left_to_timer() {
        let mut table = table(0);
        let (reservation, mut rx) = reserve(&mut table);

        tokio::time::advance(ACK_TIMEOUT).await;
        assert!(!table.on_ack(reservation.sequence_number));
        assert!(rx.try_recv().is_err());
        assert_eq!(table.len(), 1);

        assert_eq!(table.on_timer(reservation), TimerCheck::Done);
        assert_eq!(rx.try_recv().unwrap(), AckOutcome::TimedOut);
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nak_reject() {
        let mut table = table(0);
        let (reservation, mut rx) = reserve(&mut table);

        let action = table.on_nak(reservation.sequence_number, NakKind::Reject);
        assert_eq!(action, NakAction::Rejected);
        assert_eq!(rx.try_recv().unwrap(), AckOutcome::Rejected);
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nak_queue_full_extends_and_keeps_packet() {
        let mut table = table(0);
        let token = ResponseToken::new(7);
        let (tx, mut rx) = oneshot::channel();
        let reservation = table.reserve(ACK_TIMEOUT, Some(token), tx).unwrap();
        table.store_packet(reservation, vec![0x23, 0x02, 0x80]);

        tokio::time::advance(Duration::from_millis(100)).await;
        let action = table.on_nak(reservation.sequence_number, NakKind::QueueFull);
        assert_eq!(
            action,
            NakAction::Retransmit {
                id: reservation.id,
                linked: Some(token)
            }
        );
        assert_eq!(
            table.remaining(reservation.sequence_number),
            Some(Duration::from_millis(12000))
        );
        assert_eq!(table.packet(reservation), Some(&[0x23, 0x02, 0x80][..]));
        assert!(rx.try_recv().is_err());

        // the original deadline passing must not expire the entry
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(
            table.on_timer(reservation),
            TimerCheck::Rearm(Duration::from_millis(11500))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_nak_waiting_extends() {
        let mut table = table(0);
        let (reservation, mut rx) = reserve(&mut table);

        let action = table.on_nak(reservation.sequence_number, NakKind::Waiting);
        assert_eq!(action, NakAction::Extended { linked: None });
        assert_eq!(
            table.remaining(reservation.sequence_number),
            Some(Duration::from_millis(90000))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nak_for_unknown_or_expired() {
        let mut table = table(0);
        assert_eq!(table.on_nak(42, NakKind::Reject), NakAction::Ignored);

        let (reservation, mut rx) = reserve(&mut table);
        tokio::time::advance(ACK_TIMEOUT).await;
        assert_eq!(
            table.on_nak(reservation.sequence_number, NakKind::Reject),
            NakAction::Ignored
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ignores_other_generation() {
        let mut table = table(0);
        let (reservation, mut rx) = reserve(&mut table);
        let stale = Reservation {
            sequence_number: reservation.sequence_number,
            id: reservation.id + 1,
        };

        tokio::time::advance(ACK_TIMEOUT).await;
        assert_eq!(table.on_timer(stale), TimerCheck::Done);
        assert_eq!(table.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_returns_linked() {
        let mut table = table(0);
        let (tx, mut rx) = oneshot::channel();
        let token = ResponseToken::new(3);
        let reservation = table.reserve(ACK_TIMEOUT, Some(token), tx).unwrap();

        assert_eq!(table.remove(reservation), Some(token));
        assert!(table.is_empty());
        // removed entries are not completed
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain() {
        let mut table = table(0);
        let (_, mut rx1) = reserve(&mut table);
        let (_, mut rx2) = reserve(&mut table);

        table.drain(AckOutcome::Closed);
        assert!(table.is_empty());
        assert_eq!(rx1.try_recv().unwrap(), AckOutcome::Closed);
        assert_eq!(rx2.try_recv().unwrap(), AckOutcome::Closed);
    }
}
