//! The reservation schedule: an ordered set of future transmit and
//! receive windows.
//!
//! Every planned transmission — own REQUEST/REPLY/ACK slots, own DATA
//! bursts, and windows inferred from neighbors' advertisements — is
//! recorded here. Collision checks and slot queries consult the same
//! structure, so a reservation made while processing one frame is visible
//! to every later decision. Expired entries are purged lazily at the head
//! of each query.

use core::time::Duration;

use rand::Rng;

use goal_core::time::SimTime;

/// Opaque handle to one reserved interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct SlotHandle(u64);

#[derive(Debug, Clone)]
struct SlotEntry {
    handle: SlotHandle,
    begin: SimTime,
    end: SimTime,
    /// Marks a window held for an expected reception. It blocks queries
    /// like any other entry; the flag records why the window is held.
    receive_only: bool,
}

/// Ordered interval set of reserved windows, most recent `begin` first.
pub struct ReservationSchedule {
    entries: Vec<SlotEntry>,
    next_handle: u64,
    /// Guard band applied around reservations and queries.
    min_interval: Duration,
    /// Spacing required after big (DATA) reservations.
    big_interval: Duration,
}

impl ReservationSchedule {
    pub fn new(min_interval: Duration, big_interval: Duration) -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 0,
            min_interval,
            big_interval,
        }
    }

    /// Insert a reservation, keeping the list sorted by descending begin.
    pub fn insert(&mut self, begin: SimTime, end: SimTime, receive_only: bool) -> SlotHandle {
        let handle = SlotHandle(self.next_handle);
        self.next_handle += 1;
        let pos = self
            .entries
            .iter()
            .position(|e| e.begin < begin)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            pos,
            SlotEntry {
                handle,
                begin,
                end,
                receive_only,
            },
        );
        handle
    }

    /// Remove a reservation. Returns false if it no longer exists.
    pub fn remove(&mut self, handle: SlotHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        before != self.entries.len()
    }

    /// Downgrade a reservation to receive-only, keeping its window as a
    /// receive-collision guard. Returns false if it no longer exists.
    pub fn set_receive_only(&mut self, handle: SlotHandle) -> bool {
        match self.entries.iter_mut().find(|e| e.handle == handle) {
            Some(e) => {
                e.receive_only = true;
                true
            }
            None => false,
        }
    }

    /// Whether the reservation is marked receive-only, or `None` if it no
    /// longer exists.
    #[must_use]
    pub fn is_receive_only(&self, handle: SlotHandle) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| e.receive_only)
    }

    /// Whether `[begin, end)`, expanded by the guard band on both sides,
    /// avoids every live reservation. Receive-only entries count too:
    /// overlapping an expected reception is a collision either way.
    pub fn is_available(&mut self, begin: SimTime, end: SimTime, now: SimTime) -> bool {
        self.purge_expired(now);
        let qb = begin.saturating_sub(self.min_interval);
        let qe = end + self.min_interval;
        !self.entries.iter().any(|e| qb < e.end && qe > e.begin)
    }

    /// Find a start instant for a slot of `slot_len` no earlier than
    /// `earliest`.
    ///
    /// Walks reservations in ascending begin order, pushing the candidate
    /// past each conflicting window plus the guard band. Receive-only
    /// entries push like any other: transmitting over an expected
    /// reception is a collision. Small (control) slots get a jitter pad and the
    /// returned instant is drawn uniformly from it, so independent nodes
    /// computing the same answer do not transmit in lockstep. Big (DATA)
    /// slots use no jitter and demand wider spacing.
    pub fn next_available_start(
        &mut self,
        earliest: SimTime,
        slot_len: Duration,
        big_interval: bool,
        now: SimTime,
        rng: &mut impl Rng,
    ) -> SimTime {
        self.purge_expired(now);
        let (spacing, pad) = if big_interval {
            (self.big_interval, Duration::ZERO)
        } else {
            (self.min_interval, self.min_interval)
        };

        let mut lower = earliest;
        for e in self.entries.iter().rev() {
            if e.begin > lower + slot_len + spacing + pad {
                break;
            }
            let candidate = e.end + self.min_interval;
            if candidate > lower {
                lower = candidate;
            }
        }

        if pad.is_zero() {
            lower
        } else {
            let upper = lower + pad;
            SimTime::from_nanos(rng.gen_range(lower.as_nanos()..upper.as_nanos()))
        }
    }

    /// Number of live reservations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&mut self, now: SimTime) {
        self.entries.retain(|e| e.end + self.min_interval >= now);
    }
}
