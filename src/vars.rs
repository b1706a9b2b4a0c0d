//! Interns variable and monitor names into small, `Copy` identifiers.
//!
//! Modeled on [`stateright::actor::Id`](../../examples/stateright-stateright/src/actor.rs): a
//! `u32` newtype with `From`/`Into<usize>` conversions, rather than passing owned `String`s
//! through the hot DFS path.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::classify::{classify, VarClass};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl Debug for VarId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({})", self.0)
    }
}

impl From<VarId> for usize {
    fn from(id: VarId) -> Self {
        id.0 as usize
    }
}

impl From<usize> for VarId {
    fn from(u: usize) -> Self {
        VarId(u as u32)
    }
}

/// A name table shared by every thread's lowering pass, so that the same source name (e.g.
/// `sx`) always interns to the same [`VarId`] no matter which thread mentions it first.
#[derive(Default)]
pub struct VarTable {
    names: Vec<Arc<str>>,
    index: HashMap<Arc<str>, VarId>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the [`VarId`] for `name`, interning it if this is the first occurrence.
    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = VarId::from(self.names.len());
        let arc: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&arc));
        self.index.insert(arc, id);
        id
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.names[usize::from(id)]
    }

    pub fn class(&self, id: VarId) -> VarClass {
        classify(self.name(id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
