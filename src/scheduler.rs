//! The Execution Scheduler (spec §4.5): exhaustively explores every legal interleaving of a fixed
//! set of thread traces, recording one [`Observable`] per distinct completed execution.
//!
//! Each recursive call to [`Run::explore`] is one DFS frame: it commits exactly one event to the
//! shared execution state, recurses, then undoes exactly what it committed before trying the next
//! enabled choice. Backtracking is plain Rust stack-frame ownership -- the undo a Design Note
//! asks for is just what happens when a local binding falls out of scope on return -- so there's
//! no separate undo-log structure to keep in sync by hand.

use std::collections::HashMap;

use log::trace;

use crate::classify::VarClass;
use crate::collector::{Collector, Observable};
use crate::event::{Event, EventKind, Slot, ThreadId, Trace, ValueExpr};
use crate::oracle::{plain_read_candidates, CoherenceTable, CommittedWrite, MonitorSync, WriteLog};
use crate::util::VectorClock;
use crate::value::{evaluate, DivisionByZero, Env};
use crate::vars::{VarId, VarTable};

/// One thread's read-write cursor into its own trace, its private environment, and its vector
/// clock -- every component other than its own index stays 0 until a volatile read or lock
/// acquire merges in another thread's frontier.
struct ThreadState {
    trace: Trace,
    cursor: usize,
    env: Env,
    clock: VectorClock,
}

impl ThreadState {
    fn done(&self) -> bool {
        self.cursor == self.trace.len()
    }

    fn next_event(&self) -> Option<&Event> {
        self.trace.get(self.cursor)
    }
}

/// `(owner, reentrant depth)`. Absent entries mean the monitor has never been locked.
type MonitorState = HashMap<VarId, (ThreadId, u32)>;

/// All mutable state one DFS walk threads through.
struct Execution {
    threads: Vec<ThreadState>,
    writes: HashMap<VarId, WriteLog>,
    coherence: CoherenceTable,
    monitor_sync: MonitorSync,
    monitor_state: MonitorState,
    print_outputs: HashMap<ThreadId, Vec<i64>>,
    next_seq: u64,
    first_abort: Option<ThreadId>,
}

/// Drives one exhaustive exploration of a fixed set of thread traces against a [`VarTable`],
/// accumulating distinct [`Observable`]s into a [`Collector`].
///
/// Built with the same "config separate from the run" shape as `stateright`'s
/// `Model::checker()` -> `.spawn_dfs()`: construct with [`Explorer::new`], tune with the `with_*`
/// builder, then run with [`Explorer::run`].
pub struct Explorer<'v> {
    vars: &'v VarTable,
    traces: Vec<Trace>,
    log_pruned: bool,
}

impl<'v> Explorer<'v> {
    pub fn new(vars: &'v VarTable, traces: Vec<Trace>) -> Self {
        Explorer { vars, traces, log_pruned: false }
    }

    /// When set, every deadlock-pruned branch is logged at `trace` level instead of silently
    /// discarded. Reserved for future depth/time bounds alongside it (spec.md §9's "optional
    /// future work").
    pub fn with_pruned_logging(mut self, log_pruned: bool) -> Self {
        self.log_pruned = log_pruned;
        self
    }

    /// Alias for [`Explorer::run`], matching the `Model::checker().spawn_dfs()` idiom this
    /// builder is modeled on.
    pub fn spawn(self) -> Collector {
        self.run()
    }

    /// Runs the exploration to completion, returning every distinct observable found.
    pub fn run(self) -> Collector {
        let threads = self
            .traces
            .into_iter()
            .map(|trace| ThreadState { trace, cursor: 0, env: Env::new(), clock: VectorClock::new() })
            .collect();

        let mut run = Run {
            vars: self.vars,
            log_pruned: self.log_pruned,
            execution: Execution {
                threads,
                writes: HashMap::new(),
                coherence: CoherenceTable::new(),
                monitor_sync: MonitorSync::new(),
                monitor_state: MonitorState::new(),
                print_outputs: HashMap::new(),
                next_seq: 1,
                first_abort: None,
            },
            collector: Collector::new(),
        };
        run.explore();
        run.collector
    }
}

/// Reverses exactly one committed event: the clock every event ticks (its own thread's component,
/// regardless of kind) plus whatever that event's kind additionally touched.
struct Undo {
    prior_clock: VectorClock,
    effect: UndoEffect,
}

enum UndoEffect {
    Read { var: VarId, dest: Slot, dest_had: Option<i64>, coherence_had: Option<VectorClock> },
    Write { var: VarId },
    Lock { monitor: VarId, prior_owner: Option<(ThreadId, u32)> },
    Unlock { monitor: VarId, prior_owner: Option<(ThreadId, u32)>, sync_had: Option<VectorClock> },
    Compute { dest: Slot, dest_had: Option<i64> },
    Print,
    Aborted { had_first_abort: bool },
}

enum Candidate {
    Write(CommittedWrite),
    Trivial,
}

struct Run<'v> {
    vars: &'v VarTable,
    log_pruned: bool,
    execution: Execution,
    collector: Collector,
}

impl<'v> Run<'v> {
    fn explore(&mut self) {
        if self.execution.threads.iter().all(|t| t.done()) {
            self.record_observable();
            return;
        }

        let enabled = self.enabled_threads();
        if enabled.is_empty() {
            if self.log_pruned {
                trace!("pruning deadlocked branch, no thread has an enabled next event");
            }
            return;
        }

        for tid in enabled {
            for choice in self.choices_for(tid) {
                let undo = self.commit(tid, choice);
                self.execution.threads[usize::from(tid)].cursor += 1;
                self.explore();
                self.execution.threads[usize::from(tid)].cursor -= 1;
                self.undo(tid, undo);
            }
        }
    }

    /// Threads whose next event can run right now. A thread blocked on `Lock` against a monitor
    /// held by a different thread is excluded; every other event kind is always enabled (spec
    /// §4.5: only monitor contention can block a thread).
    fn enabled_threads(&self) -> Vec<ThreadId> {
        (0..self.execution.threads.len())
            .map(ThreadId::from)
            .filter(|&tid| {
                match self.execution.threads[usize::from(tid)].next_event() {
                    None => false,
                    Some(event) => match &event.kind {
                        EventKind::Lock { monitor } => {
                            match self.execution.monitor_state.get(monitor) {
                                None => true,
                                Some((owner, _)) => *owner == tid,
                            }
                        }
                        _ => true,
                    },
                }
            })
            .collect()
    }

    /// One candidate per legal way `tid`'s next event could resolve: always exactly one, except a
    /// `Read` of a plain shared variable, which may branch over several writes.
    fn choices_for(&self, tid: ThreadId) -> Vec<Candidate> {
        let thread = &self.execution.threads[usize::from(tid)];
        let event = thread.next_event().expect("choices_for called on a finished thread");
        let EventKind::Read { var, .. } = &event.kind else {
            return vec![Candidate::Trivial];
        };
        let var = *var;
        let empty = WriteLog::new();
        let log = self.execution.writes.get(&var).unwrap_or(&empty);

        if self.vars.class(var) == VarClass::SharedVolatile {
            return vec![Candidate::Write(log.latest().clone())];
        }

        let last_observed = self.execution.coherence.get(tid, var);
        plain_read_candidates(log.as_slice(), tid, &thread.clock, last_observed)
            .into_iter()
            .cloned()
            .map(Candidate::Write)
            .collect()
    }

    fn commit(&mut self, tid: ThreadId, candidate: Candidate) -> Undo {
        let event = {
            let thread = &self.execution.threads[usize::from(tid)];
            thread.next_event().expect("commit called on a finished thread").clone()
        };

        let idx = usize::from(tid);
        let prior_clock = self.execution.threads[idx].clock.clone();
        self.execution.threads[idx].clock = prior_clock.clone().incremented(idx);

        let effect = match event.kind {
            EventKind::Read { var, dest } => self.commit_read(tid, var, dest, candidate),
            EventKind::Write { var, value } => self.commit_write(tid, var, &value),
            EventKind::Lock { monitor } => self.commit_lock(tid, monitor),
            EventKind::Unlock { monitor } => self.commit_unlock(tid, monitor),
            EventKind::Compute { dest, value } => self.commit_compute(tid, dest, &value),
            EventKind::Print { value } => self.commit_print(tid, &value),
        };
        Undo { prior_clock, effect }
    }

    fn commit_read(&mut self, tid: ThreadId, var: VarId, dest: Slot, candidate: Candidate) -> UndoEffect {
        let write = match candidate {
            Candidate::Write(w) => w,
            Candidate::Trivial => unreachable!("a Read always produces a Write candidate"),
        };
        let idx = usize::from(tid);
        let dest_had = self.execution.threads[idx].env.insert(dest, write.value);

        let coherence_had = if self.vars.class(var) == VarClass::SharedVolatile {
            let widened = VectorClock::merge_max(&self.execution.threads[idx].clock, &write.clock);
            self.execution.threads[idx].clock = widened;
            None
        } else {
            self.execution.coherence.record(tid, var, write.clock.clone())
        };

        UndoEffect::Read { var, dest, dest_had, coherence_had }
    }

    fn commit_write(&mut self, tid: ThreadId, var: VarId, value: &ValueExpr) -> UndoEffect {
        let value = match self.eval_or_abort(tid, value) {
            Ok(v) => v,
            Err(effect) => return effect,
        };
        let clock = self.execution.threads[usize::from(tid)].clock.clone();
        let seq = self.next_seq();
        self.execution
            .writes
            .entry(var)
            .or_insert_with(WriteLog::new)
            .push(CommittedWrite { seq, thread: Some(tid), clock, value });
        UndoEffect::Write { var }
    }

    fn commit_lock(&mut self, tid: ThreadId, monitor: VarId) -> UndoEffect {
        let prior_owner = self.execution.monitor_state.get(&monitor).copied();
        let depth = match prior_owner {
            Some((owner, depth)) if owner == tid => depth + 1,
            Some(_) => unreachable!("enabled_threads excludes Lock on a monitor owned elsewhere"),
            None => 1,
        };
        self.execution.monitor_state.insert(monitor, (tid, depth));

        if let Some(sync_clock) = self.execution.monitor_sync.last_unlock(monitor) {
            let idx = usize::from(tid);
            let widened = VectorClock::merge_max(&self.execution.threads[idx].clock, sync_clock);
            self.execution.threads[idx].clock = widened;
        }

        UndoEffect::Lock { monitor, prior_owner }
    }

    fn commit_unlock(&mut self, tid: ThreadId, monitor: VarId) -> UndoEffect {
        let (owner, depth) = self
            .execution
            .monitor_state
            .get(&monitor)
            .copied()
            .expect("Unlock only lowered after a matching Lock");
        debug_assert_eq!(owner, tid, "unlock committed by a non-owning thread");
        let prior_owner = Some((owner, depth));

        if depth == 1 {
            self.execution.monitor_state.remove(&monitor);
        } else {
            self.execution.monitor_state.insert(monitor, (owner, depth - 1));
        }

        let clock = self.execution.threads[usize::from(tid)].clock.clone();
        let sync_had = self.execution.monitor_sync.record_unlock(monitor, clock);

        UndoEffect::Unlock { monitor, prior_owner, sync_had }
    }

    fn commit_compute(&mut self, tid: ThreadId, dest: Slot, value: &ValueExpr) -> UndoEffect {
        let value = match self.eval_or_abort(tid, value) {
            Ok(v) => v,
            Err(effect) => return effect,
        };
        let dest_had = self.execution.threads[usize::from(tid)].env.insert(dest, value);
        UndoEffect::Compute { dest, dest_had }
    }

    fn commit_print(&mut self, tid: ThreadId, value: &ValueExpr) -> UndoEffect {
        let value = match self.eval_or_abort(tid, value) {
            Ok(v) => v,
            Err(effect) => return effect,
        };
        self.execution.print_outputs.entry(tid).or_insert_with(Vec::new).push(value);
        UndoEffect::Print
    }

    /// Evaluates `expr` against `tid`'s current environment, converting a division-by-zero into
    /// the whole-execution abort bookkeeping (spec §9 resolution of original-source ambiguity 3:
    /// the first thread to abort is recorded once, globally, and every thread -- including the
    /// aborting one -- keeps running around it).
    fn eval_or_abort(&mut self, tid: ThreadId, expr: &ValueExpr) -> Result<i64, UndoEffect> {
        let result = evaluate(expr, &self.execution.threads[usize::from(tid)].env);
        match result {
            Ok(value) => Ok(value),
            Err(DivisionByZero) => {
                let had_first_abort = self.execution.first_abort.is_some();
                self.execution.first_abort.get_or_insert(tid);
                Err(UndoEffect::Aborted { had_first_abort })
            }
        }
    }

    fn undo(&mut self, tid: ThreadId, undo: Undo) {
        self.execution.threads[usize::from(tid)].clock = undo.prior_clock;
        match undo.effect {
            UndoEffect::Read { var, dest, dest_had, coherence_had } => {
                restore(&mut self.execution.threads[usize::from(tid)].env, dest, dest_had);
                self.execution.coherence.restore(tid, var, coherence_had);
            }
            UndoEffect::Write { var } => {
                self.execution.writes.get_mut(&var).expect("write log exists after a commit").pop();
            }
            UndoEffect::Lock { monitor, prior_owner } => {
                restore_monitor(&mut self.execution.monitor_state, monitor, prior_owner);
            }
            UndoEffect::Unlock { monitor, prior_owner, sync_had } => {
                restore_monitor(&mut self.execution.monitor_state, monitor, prior_owner);
                self.execution.monitor_sync.restore(monitor, sync_had);
            }
            UndoEffect::Compute { dest, dest_had } => {
                restore(&mut self.execution.threads[usize::from(tid)].env, dest, dest_had);
            }
            UndoEffect::Print => {
                self.execution
                    .print_outputs
                    .get_mut(&tid)
                    .expect("print recorded before its undo runs")
                    .pop();
            }
            UndoEffect::Aborted { had_first_abort } => {
                if !had_first_abort {
                    self.execution.first_abort = None;
                }
            }
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.execution.next_seq;
        self.execution.next_seq += 1;
        seq
    }

    fn record_observable(&mut self) {
        let observable = match self.execution.first_abort {
            Some(aborted) => Observable::Excepted { thread: usize::from(aborted), divisor: 0 },
            None => {
                let prints = (0..self.execution.threads.len())
                    .map(ThreadId::from)
                    .map(|tid| self.execution.print_outputs.get(&tid).cloned().unwrap_or_default())
                    .collect();
                Observable::Regular(prints)
            }
        };
        self.collector.record(observable);
    }
}

fn restore(env: &mut Env, slot: Slot, had: Option<i64>) {
    match had {
        Some(v) => {
            env.insert(slot, v);
        }
        None => {
            env.remove(&slot);
        }
    }
}

fn restore_monitor(state: &mut MonitorState, monitor: VarId, prior: Option<(ThreadId, u32)>) {
    match prior {
        Some(owner_depth) => {
            state.insert(monitor, owner_depth);
        }
        None => {
            state.remove(&monitor);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lower::lower_thread;
    use crate::parser::parse_program;

    fn explore(sources: &[&str]) -> (Collector, VarTable) {
        let mut vars = VarTable::new();
        let traces: Vec<Trace> = sources
            .iter()
            .enumerate()
            .map(|(i, src)| {
                let stmts = parse_program(src).unwrap();
                lower_thread(ThreadId::from(i), &stmts, &mut vars).unwrap()
            })
            .collect();
        let collector = Explorer::new(&vars, traces).run();
        (collector, vars)
    }

    #[test]
    fn single_thread_is_deterministic() {
        let (collector, _) = explore(&["l=2;l=l*3;print(l);"]);
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.iter().next().unwrap(), &Observable::Regular(vec![vec![6]]));
    }

    #[test]
    fn racy_plain_writes_yield_every_interleaving_outcome() {
        // Thread 0 writes s twice; thread 1 reads it once. With no synchronization, the read may
        // observe the initial value (0), the first write, or the second -- three outcomes.
        let (collector, _) = explore(&["s=1;s=2;", "print(s);"]);
        let observed: Vec<i64> = collector
            .iter()
            .map(|o| match o {
                Observable::Regular(prints) => prints[1][0],
                Observable::Excepted { .. } => panic!("no division here"),
            })
            .collect();
        assert!(observed.contains(&0));
        assert!(observed.contains(&1));
        assert!(observed.contains(&2));
    }

    #[test]
    fn volatile_write_is_always_visible_to_a_later_read() {
        // No synchronization, but v is volatile: the reader's single legal candidate is always
        // the SO-latest write, so exactly one outcome exists.
        let (collector, _) = explore(&["v=7;", "print(v);"]);
        assert_eq!(collector.len(), 1);
        assert_eq!(
            collector.iter().next().unwrap(),
            &Observable::Regular(vec![vec![], vec![7]])
        );
    }

    #[test]
    fn monitor_protected_increments_never_lose_an_update() {
        // Both threads print s while still holding the monitor; mutual exclusion plus the
        // lock/unlock synchronizes-with edge means each print always sees a fresh, distinct
        // value -- "1, 1" (a lost update from a non-atomic interleaved increment) never appears.
        let (collector, _) =
            explore(&["m.lock();s++;print(s);m.unlock();", "m.lock();s++;print(s);m.unlock();"]);
        let sequences: Vec<Vec<i64>> = collector
            .iter()
            .map(|o| match o {
                Observable::Regular(prints) => vec![prints[0][0], prints[1][0]],
                Observable::Excepted { .. } => panic!("no division here"),
            })
            .collect();
        for seq in &sequences {
            assert_eq!(seq.iter().collect::<std::collections::HashSet<_>>().len(), 2);
        }
    }

    #[test]
    fn division_by_zero_discards_every_threads_prints() {
        let (collector, _) = explore(&["l=1;print(l/0);", "print(99);"]);
        assert_eq!(collector.len(), 1);
        match collector.iter().next().unwrap() {
            Observable::Excepted { thread, divisor } => {
                assert_eq!(*thread, 0);
                assert_eq!(*divisor, 0);
            }
            other => panic!("expected an abort, got {:?}", other),
        }
    }

    #[test]
    fn deadlock_is_pruned_not_reported() {
        // Classic lock-ordering deadlock: if each thread grabs the monitor the other wants first,
        // both block forever and that branch is silently pruned. Interleavings where one thread
        // acquires and releases both before the other starts still complete normally.
        let (collector, _) = explore(&[
            "ma.lock();mb.lock();mb.unlock();ma.unlock();",
            "mb.lock();ma.lock();ma.unlock();mb.unlock();",
        ]);
        assert!(!collector.is_empty());
        for o in collector.iter() {
            assert!(matches!(o, Observable::Regular(_)));
        }
    }
}
