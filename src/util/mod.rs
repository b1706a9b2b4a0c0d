//! Small, self-contained utilities shared across the explorer.

mod vector_clock;
pub use vector_clock::VectorClock;

/// `true` iff `before` happens-before `after` under the partial order a [`VectorClock`]
/// encodes (reflexive: an event happens-before itself).
pub fn happens_before(before: &VectorClock, after: &VectorClock) -> bool {
    matches!(
        before.partial_cmp(after),
        Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
    )
}
