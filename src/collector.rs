//! The Result Collector (spec §4.7): the set of distinct observables an exploration has produced.

use std::collections::HashSet;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

/// What a completed execution looks like from the outside: either every thread's print sequence,
/// or -- if any thread divided by zero -- which thread aborted first, discarding every thread's
/// print output (spec §3, §6).
///
/// Plain `enum` rather than a serialized-byte fingerprint (the Design Notes' suggestion): the
/// record is small and `Hash`-able on its own, so there's nothing a byte hash buys here that
/// deriving `Hash` doesn't already give for free.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Observable {
    Regular(Vec<Vec<i64>>),
    Excepted { thread: usize, divisor: i64 },
}

/// The deduplicated set of observables a full exploration has discovered. `ahash` is
/// `stateright`'s hasher of choice for exactly this shape of set (see its `util` module), and
/// there's no adversarial-input concern here to justify `std`'s default SipHash.
#[derive(Default)]
pub struct Collector {
    seen: HashSet<Observable, RandomState>,
}

impl Collector {
    pub fn new() -> Self {
        Collector { seen: HashSet::with_hasher(RandomState::new()) }
    }

    /// Records `observable`, returning `true` if it had not been seen before.
    pub fn record(&mut self, observable: Observable) -> bool {
        self.seen.insert(observable)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observable> {
        self.seen.iter()
    }

    pub fn into_vec(self) -> Vec<Observable> {
        self.seen.into_iter().collect()
    }
}
