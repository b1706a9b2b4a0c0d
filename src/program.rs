//! A small config/builder surface bundling a program's interned variables with each thread's
//! lowered trace, mirroring `stateright`'s `Model::checker()` -> `.spawn_dfs()` idiom: build the
//! immutable program once, then spawn as many tuned explorations off it as needed.

use crate::event::Trace;
use crate::scheduler::Explorer;
use crate::vars::VarTable;

/// A fully lowered multi-threaded program, ready to explore.
pub struct Program {
    vars: VarTable,
    traces: Vec<Trace>,
}

impl Program {
    pub fn new(vars: VarTable, traces: Vec<Trace>) -> Self {
        Program { vars, traces }
    }

    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Builds an [`Explorer`] over this program, mirroring `Model::checker()`.
    pub fn explorer(&self) -> Explorer<'_> {
        Explorer::new(&self.vars, self.traces.clone())
    }
}
