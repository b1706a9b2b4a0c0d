//! Variable classification (spec §4.3): a pure function of a name, no runtime state.

/// The storage class of a variable, inferred from the first letter of its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarClass {
    /// Per-thread scratch storage (`l*`); never part of shared memory.
    Local,
    /// Shared, unsynchronized memory (`s*` and anything not otherwise recognized).
    SharedPlain,
    /// Shared memory whose every access participates in synchronization order (`v*`).
    SharedVolatile,
    /// A reentrant mutual-exclusion monitor (`m*`); has no value, only lock state.
    Monitor,
}

impl VarClass {
    pub fn is_shared(self) -> bool {
        matches!(self, VarClass::SharedPlain | VarClass::SharedVolatile)
    }
}

/// Classifies a variable name per the naming convention the test corpus assumes: `v*` is
/// volatile, `s*` is shared-plain, `l*` is a thread-local, `m*` is a monitor. Anything else is
/// treated as shared-plain with an initial value of 0.
pub fn classify(name: &str) -> VarClass {
    match name.as_bytes().first() {
        Some(b'v') => VarClass::SharedVolatile,
        Some(b's') => VarClass::SharedPlain,
        Some(b'l') => VarClass::Local,
        Some(b'm') => VarClass::Monitor,
        _ => VarClass::SharedPlain,
    }
}
