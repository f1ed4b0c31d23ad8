// Receive-side sequence tracking.
//
// Records must arrive with strictly increasing sequence numbers. Gaps
// (lost records) are fine; a duplicate or a regression is rejected.
// Not thread-safe on its own; the session keeps it behind the receive lock.

/// Highest-accepted tracker for one direction of a session.
#[derive(Debug, Clone, Default)]
pub struct ReplayGuard {
    highest: Option<u64>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `seq` would be accepted. Does NOT update state.
    pub fn check(&self, seq: u64) -> bool {
        match self.highest {
            None => true,
            Some(h) => seq > h,
        }
    }

    /// Mark `seq` as accepted. Returns false (and changes nothing) if it
    /// is a duplicate or a regression.
    ///
    /// Call only after the record authenticated, so a forged record cannot
    /// push the window forward.
    pub fn accept(&mut self, seq: u64) -> bool {
        if !self.check(seq) {
            return false;
        }
        self.highest = Some(seq);
        true
    }

    /// Highest sequence number accepted so far.
    pub fn highest(&self) -> Option<u64> {
        self.highest
    }
}
