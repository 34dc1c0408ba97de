//! Debounce and in-flight bookkeeping for autosave.
//!
//! The pipeline does no I/O and keeps no clock. It hands out a ticket for
//! every armed debounce timer and decides, when a timer fires, whether a
//! patch goes out now, later, or not at all. At most one patch is in flight
//! at a time; a timer that fires while one is outstanding is deferred until
//! that patch settles, and the deferred save then sends whatever the draft
//! holds at that point.

/// Identifies one armed debounce timer.
///
/// Only the most recently issued ticket can trigger a save; a timer carrying
/// an older ticket was superseded by a later edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveTicket(u64);

impl SaveTicket {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// What to do with a fired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The ticket was superseded or cancelled.
    Stale,
    /// Send a patch now.
    Send,
    /// A patch is already in flight; send once it settles.
    Defer,
}

#[derive(Debug, Default)]
pub struct AutosavePipeline {
    last_ticket: u64,
    pending: Option<SaveTicket>,
    in_flight: bool,
    deferred: bool,
}

impl AutosavePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a new timer, superseding any pending one.
    pub fn schedule(&mut self) -> SaveTicket {
        self.last_ticket += 1;
        let ticket = SaveTicket(self.last_ticket);
        self.pending = Some(ticket);
        ticket
    }

    pub fn fire(&mut self, ticket: SaveTicket) -> FireOutcome {
        if self.pending != Some(ticket) {
            return FireOutcome::Stale;
        }
        self.pending = None;
        if self.in_flight {
            self.deferred = true;
            FireOutcome::Defer
        } else {
            self.in_flight = true;
            FireOutcome::Send
        }
    }

    /// The in-flight patch settled. Returns `true` if a deferred save must be
    /// sent now, in which case it counts as in flight already.
    pub fn settle(&mut self) -> bool {
        if std::mem::take(&mut self.deferred) {
            self.in_flight = true;
            true
        } else {
            self.in_flight = false;
            false
        }
    }

    /// Drop the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Forget everything for a new session. Tickets keep increasing so a
    /// timer from the previous session can never match.
    pub fn reset(&mut self) {
        self.pending = None;
        self.in_flight = false;
        self.deferred = false;
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}
