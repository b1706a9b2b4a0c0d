//! The Memory-Model Oracle (spec §4.6): decides, for a pending `Read`, which prior `Write`s it
//! may legally observe, and maintains the happens-before bookkeeping every other decision in the
//! scheduler reads off of.
//!
//! Happens-before is tracked with one [`VectorClock`] per thread rather than the Design Notes'
//! O(E²) reachability matrix -- `VectorClock::partial_cmp` gives the same dominance test in
//! amortized O(E), and it's the vocabulary `stateright`'s own vector clock already speaks.

use std::collections::HashMap;

use crate::event::ThreadId;
use crate::util::{happens_before, VectorClock};
use crate::vars::VarId;

/// A write that has been committed to the execution so far, along with the vector clock in
/// effect when it happened. `thread: None` marks the virtual initial write every variable starts
/// with (value `0`, clock the zero vector) -- always a candidate floor, never HB-dominated by
/// anything.
#[derive(Clone, Debug)]
pub struct CommittedWrite {
    pub seq: u64,
    pub thread: Option<ThreadId>,
    pub clock: VectorClock,
    pub value: i64,
}

/// Every write committed to a given plain/volatile variable, in commit order. Index 0 is always
/// the virtual initial write.
#[derive(Debug)]
pub struct WriteLog {
    writes: Vec<CommittedWrite>,
}

impl WriteLog {
    pub fn new() -> Self {
        WriteLog { writes: vec![CommittedWrite { seq: 0, thread: None, clock: VectorClock::new(), value: 0 }] }
    }

    pub fn push(&mut self, write: CommittedWrite) {
        self.writes.push(write);
    }

    /// Undoes the most recent `push`. The scheduler only ever undoes events in the reverse order
    /// it committed them, so the last entry is always the one being undone.
    pub fn pop(&mut self) {
        self.writes.pop();
    }

    pub fn latest(&self) -> &CommittedWrite {
        self.writes.last().expect("a WriteLog always keeps its initial write")
    }

    pub fn as_slice(&self) -> &[CommittedWrite] {
        &self.writes
    }
}

impl Default for WriteLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Every write a plain [`crate::event::EventKind::Read`] may legally observe (spec §4.6 rule 3),
/// given:
/// - `writes`: every write committed so far to the variable being read, oldest first;
/// - `reader`: the thread performing the read;
/// - `prospective`: the clock the read would have if committed now (the reading thread's current
///   clock, not yet incremented for this read);
/// - `last_observed`: the clock of the write this thread's *previous* plain read of this same
///   variable resolved to, if any (spec §4.6 rule 4, per-thread-per-variable coherence).
///
/// A write `w` survives the filter unless some other committed write `w2` happens-before the
/// read but happens-after `w` (making `w` stale), or `w` happens strictly before the write this
/// thread already observed (violating per-thread coherence). The reading thread's own most recent
/// prior write to the variable is always included regardless of either filter: spec.md's rule 3
/// names this as an unconditional carve-out, not a tie-break.
pub fn plain_read_candidates<'w>(
    writes: &'w [CommittedWrite],
    reader: ThreadId,
    prospective: &VectorClock,
    last_observed: Option<&VectorClock>,
) -> Vec<&'w CommittedWrite> {
    let dominated = |w: &CommittedWrite| {
        writes.iter().any(|later| {
            later.seq != w.seq
                && happens_before(&w.clock, &later.clock)
                && happens_before(&later.clock, prospective)
        })
    };
    let stale = |w: &CommittedWrite| match last_observed {
        Some(last) => happens_before(&w.clock, last) && w.clock != *last,
        None => false,
    };

    let mut candidates: Vec<&CommittedWrite> =
        writes.iter().filter(|w| !dominated(w) && !stale(w)).collect();

    if let Some(own) = writes.iter().filter(|w| w.thread == Some(reader)).last() {
        if !candidates.iter().any(|c| c.seq == own.seq) {
            candidates.push(own);
        }
    }
    candidates
}

/// Tracks, per `(thread, variable)`, the clock of the write the thread's last plain read of that
/// variable resolved to -- the state spec §4.6 rule 4 needs and plain reads alone don't carry,
/// since (unlike volatile reads and lock acquires) they don't widen the reading thread's clock.
#[derive(Default)]
pub struct CoherenceTable {
    last_observed: HashMap<(ThreadId, VarId), VectorClock>,
}

impl CoherenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread: ThreadId, var: VarId) -> Option<&VectorClock> {
        self.last_observed.get(&(thread, var))
    }

    /// Records that `thread`'s plain read of `var` just resolved to `clock`, returning whatever
    /// was previously recorded so the scheduler can restore it on undo.
    pub fn record(&mut self, thread: ThreadId, var: VarId, clock: VectorClock) -> Option<VectorClock> {
        self.last_observed.insert((thread, var), clock)
    }

    /// Restores a value returned by a prior `record` call, or clears the entry if `None`.
    pub fn restore(&mut self, thread: ThreadId, var: VarId, previous: Option<VectorClock>) {
        match previous {
            Some(clock) => {
                self.last_observed.insert((thread, var), clock);
            }
            None => {
                self.last_observed.remove(&(thread, var));
            }
        }
    }
}

/// Tracks, per monitor, the clock in effect at its most recent `Unlock` -- the synchronizes-with
/// edge a subsequent `Lock` by any thread merges into its own clock. Updated unconditionally on
/// every unlock, including reentrant ones releasing to a nonzero depth; a release that doesn't
/// actually free the monitor can't enable anyone else's `Lock` yet, but recording its clock
/// anyway is harmless and keeps this table a single flat map instead of a depth-aware one.
#[derive(Default)]
pub struct MonitorSync {
    last_unlock: HashMap<VarId, VectorClock>,
}

impl MonitorSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_unlock(&self, monitor: VarId) -> Option<&VectorClock> {
        self.last_unlock.get(&monitor)
    }

    pub fn record_unlock(&mut self, monitor: VarId, clock: VectorClock) -> Option<VectorClock> {
        self.last_unlock.insert(monitor, clock)
    }

    pub fn restore(&mut self, monitor: VarId, previous: Option<VectorClock>) {
        match previous {
            Some(clock) => {
                self.last_unlock.insert(monitor, clock);
            }
            None => {
                self.last_unlock.remove(&monitor);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cw(seq: u64, thread: u32, clock: Vec<u32>, value: i64) -> CommittedWrite {
        CommittedWrite { seq, thread: Some(ThreadId::from(thread as usize)), clock: clock.into(), value }
    }

    #[test]
    fn racing_writes_are_both_candidates_when_hb_incomparable() {
        // Two threads each write once, with no synchronization between them: neither write
        // happens-before the other, so a third thread's read sees both.
        let init = CommittedWrite { seq: 0, thread: None, clock: VectorClock::new(), value: 0 };
        let w1 = cw(1, 0, vec![1, 0], 10);
        let w2 = cw(2, 1, vec![0, 1], 20);
        let writes = vec![init, w1, w2];
        let prospective: VectorClock = vec![1, 1, 1].into();
        let candidates = plain_read_candidates(&writes, ThreadId::from(2), &prospective, None);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().any(|c| c.value == 10));
        assert!(candidates.iter().any(|c| c.value == 20));
    }

    #[test]
    fn dominated_write_is_excluded_unless_it_is_the_readers_own() {
        // w1 (thread 0) happens-before w2 (thread 1), which happens-before the read: w1 is stale.
        let init = CommittedWrite { seq: 0, thread: None, clock: VectorClock::new(), value: 0 };
        let w1 = cw(1, 0, vec![1], 10);
        let w2 = cw(2, 1, vec![1, 1], 20);
        let writes = vec![init, w1, w2];
        let prospective: VectorClock = vec![1, 1].into();

        // A third thread only ever sees the latest write; the stale one is dominated.
        let candidates = plain_read_candidates(&writes, ThreadId::from(2), &prospective, None);
        assert_eq!(candidates.iter().map(|c| c.value).collect::<Vec<_>>(), vec![20]);

        // Thread 0 itself still sees its own (dominated) write, carve-out -- plus whatever else
        // survives the ordinary filter.
        let candidates = plain_read_candidates(&writes, ThreadId::from(0), &prospective, None);
        assert!(candidates.iter().any(|c| c.value == 20));
        assert!(candidates.iter().any(|c| c.value == 10));
    }

    #[test]
    fn coherence_rejects_going_backwards_even_when_not_hb_dominated() {
        // Plain reads don't widen the reader's clock, so its prospective clock can be
        // HB-incomparable with every write -- meaning dominance alone can't catch a candidate
        // this thread has already moved past. Only the coherence table can.
        let init = CommittedWrite { seq: 0, thread: None, clock: VectorClock::new(), value: 0 };
        let w_old = cw(1, 0, vec![1, 0, 0], 10);
        let w_new = cw(2, 1, vec![1, 1, 0], 20);
        let writes = vec![init, w_old, w_new];
        let prospective: VectorClock = vec![0, 0, 5].into();
        let last_observed: VectorClock = vec![1, 1, 0].into();

        let candidates =
            plain_read_candidates(&writes, ThreadId::from(2), &prospective, Some(&last_observed));
        assert!(candidates.iter().all(|c| c.value != 10), "stale write must not reappear");
    }
}
