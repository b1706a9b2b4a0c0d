//! An exhaustive explorer for a small multi-threaded language under a simplified Java Memory
//! Model: given each thread's source text, it enumerates every legal interleaving and read-from
//! assignment and reports the distinct observable outputs they produce.
//!
//! [`analyze`] is the single entry point. Everything upstream of it (parsing, variable
//! classification, statement lowering) is ordinary, unexciting machinery; the hard engineering --
//! happens-before tracking and read-candidate selection -- lives in [`oracle`], and the DFS that
//! drives it lives in [`scheduler`].

pub mod ast;
pub mod classify;
pub mod collector;
pub mod error;
pub mod event;
pub mod lower;
pub mod oracle;
pub mod parser;
pub mod program;
pub mod scheduler;
pub mod util;
pub mod value;
pub mod vars;

use log::{debug, info};

use collector::Collector;
use event::ThreadId;
use program::Program;
use vars::VarTable;

/// Parses and lowers every thread's source text, explores every legal interleaving, and returns
/// the distinct observables the program can produce.
///
/// `thread_names` is used only for diagnostics; it must be the same length as `thread_sources`.
/// `error_sink` receives one human-readable message per parse/lowering failure. Returns `true`
/// iff at least one thread failed to parse or lower, in which case `out_results` is left
/// untouched and exploration never runs (spec §6/§7).
pub fn analyze(
    thread_names: &[&str],
    thread_sources: &[&str],
    out_results: &mut Collector,
    mut error_sink: impl FnMut(String),
) -> bool {
    assert_eq!(
        thread_names.len(),
        thread_sources.len(),
        "thread_names and thread_sources must be parallel arrays"
    );

    let mut vars = VarTable::new();
    let mut traces = Vec::with_capacity(thread_sources.len());
    let mut had_error = false;

    for (i, (name, source)) in thread_names.iter().zip(thread_sources.iter()).enumerate() {
        let tid = ThreadId::from(i);
        match parser::parse_program(source) {
            Ok(stmts) => match lower::lower_thread(tid, &stmts, &mut vars) {
                Ok(trace) => traces.push(trace),
                Err(e) => {
                    had_error = true;
                    error_sink(format!("{}: {}", name, e));
                }
            },
            Err(e) => {
                had_error = true;
                error_sink(format!("{}: {}", name, e));
            }
        }
    }

    if had_error {
        debug!("analyze: {} thread(s) failed to parse/lower, skipping exploration", thread_names.len());
        return true;
    }

    info!("analyze: exploring {} thread(s), {} variable(s) interned", traces.len(), vars.len());
    let program = Program::new(vars, traces);
    let collector = program.explorer().run();
    info!("analyze: found {} distinct observable(s)", collector.len());
    *out_results = collector;
    false
}
