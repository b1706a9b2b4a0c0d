//! Statement Lowering (spec §4.4): turns one thread's parsed statement sequence into a linear
//! event trace with symbolic data dependencies.

use crate::ast::{BinOp as AstBinOp, Expr, Stmt};
use crate::classify::VarClass;
use crate::error::LowerError;
use crate::event::{Event, EventKind, Slot, ThreadId, Trace, ValueExpr};
use crate::vars::VarTable;

/// Lowers one thread's statements into a [`Trace`], interning every variable it mentions into
/// `vars`. Read-temporaries are numbered per-thread, starting fresh for each thread since
/// they're never addressed across thread boundaries.
pub fn lower_thread(
    thread: ThreadId,
    stmts: &[Stmt],
    vars: &mut VarTable,
) -> Result<Trace, LowerError> {
    let mut lowering = Lowering { thread, vars, events: Vec::new(), next_temp: 0 };
    for stmt in stmts {
        lowering.lower_stmt(stmt)?;
    }
    Ok(lowering.events)
}

struct Lowering<'v> {
    thread: ThreadId,
    vars: &'v mut VarTable,
    events: Vec<Event>,
    next_temp: u32,
}

impl<'v> Lowering<'v> {
    fn push(&mut self, kind: EventKind) {
        let index = self.events.len();
        self.events.push(Event { thread: self.thread, index, kind });
    }

    fn fresh_temp(&mut self) -> Slot {
        let slot = Slot::Temp(self.next_temp);
        self.next_temp += 1;
        slot
    }

    /// Lowers `expr`, emitting a `Read` event (into a fresh temp) for every shared variable it
    /// mentions, left to right, and returns the post-lowering tree that references only thread
    ///-local state.
    fn lower_expr(&mut self, expr: &Expr) -> Result<ValueExpr, LowerError> {
        match expr {
            Expr::Lit(n) => Ok(ValueExpr::Lit(*n)),
            Expr::Neg(inner) => Ok(ValueExpr::Neg(Box::new(self.lower_expr(inner)?))),
            Expr::Bin(op, l, r) => {
                let l = self.lower_expr(l)?;
                let r = self.lower_expr(r)?;
                Ok(ValueExpr::Bin(*op, Box::new(l), Box::new(r)))
            }
            Expr::Var(name) => {
                let id = self.vars.intern(name);
                match self.vars.class(id) {
                    VarClass::Local => Ok(ValueExpr::Ref(Slot::Local(id))),
                    VarClass::SharedPlain | VarClass::SharedVolatile => {
                        let temp = self.fresh_temp();
                        self.push(EventKind::Read { var: id, dest: temp });
                        Ok(ValueExpr::Ref(temp))
                    }
                    VarClass::Monitor => {
                        Err(LowerError::new(format!("monitor '{}' used as a value", name)))
                    }
                }
            }
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), LowerError> {
        match stmt {
            Stmt::Assign { name, expr } => {
                let dest = self.vars.intern(name);
                let value = self.lower_expr(expr)?;
                self.emit_assignment(dest, name, value)
            }
            Stmt::CompoundAssign { name, op, expr } => {
                let dest = self.vars.intern(name);
                self.lower_compound(dest, name, *op, expr)
            }
            Stmt::Increment { name } => {
                let dest = self.vars.intern(name);
                self.lower_compound(dest, name, AstBinOp::Add, &Expr::Lit(1))
            }
            Stmt::Print { expr } => {
                let value = self.lower_expr(expr)?;
                self.push(EventKind::Print { value });
                Ok(())
            }
            Stmt::Lock { monitor } => {
                let id = self.vars.intern(monitor);
                self.check_monitor(&id, monitor)?;
                self.push(EventKind::Lock { monitor: id });
                Ok(())
            }
            Stmt::Unlock { monitor } => {
                let id = self.vars.intern(monitor);
                self.check_monitor(&id, monitor)?;
                self.push(EventKind::Unlock { monitor: id });
                Ok(())
            }
        }
    }

    fn check_monitor(&self, id: &crate::vars::VarId, name: &str) -> Result<(), LowerError> {
        if self.vars.class(*id) != VarClass::Monitor {
            return Err(LowerError::new(format!("'{}' is not a monitor", name)));
        }
        Ok(())
    }

    fn emit_assignment(
        &mut self,
        dest: crate::vars::VarId,
        name: &str,
        value: ValueExpr,
    ) -> Result<(), LowerError> {
        match self.vars.class(dest) {
            VarClass::Local => {
                self.push(EventKind::Compute { dest: Slot::Local(dest), value });
                Ok(())
            }
            VarClass::SharedPlain | VarClass::SharedVolatile => {
                self.push(EventKind::Write { var: dest, value });
                Ok(())
            }
            VarClass::Monitor => Err(LowerError::new(format!("cannot assign to monitor '{}'", name))),
        }
    }

    /// `x op= e` (and `x++`, which desugars to `x += 1`) lowers to one `Read` plus one `Write`
    /// for shared `x` -- never atomically -- or a single `Compute` for local `x` (spec §4.4).
    fn lower_compound(
        &mut self,
        dest: crate::vars::VarId,
        name: &str,
        op: AstBinOp,
        expr: &Expr,
    ) -> Result<(), LowerError> {
        match self.vars.class(dest) {
            VarClass::Local => {
                let current = ValueExpr::Ref(Slot::Local(dest));
                let rhs = self.lower_expr(expr)?;
                let value = ValueExpr::Bin(op, Box::new(current), Box::new(rhs));
                self.push(EventKind::Compute { dest: Slot::Local(dest), value });
                Ok(())
            }
            VarClass::SharedPlain | VarClass::SharedVolatile => {
                let read_temp = self.fresh_temp();
                self.push(EventKind::Read { var: dest, dest: read_temp });
                let rhs = self.lower_expr(expr)?;
                let value =
                    ValueExpr::Bin(op, Box::new(ValueExpr::Ref(read_temp)), Box::new(rhs));
                self.push(EventKind::Write { var: dest, value });
                Ok(())
            }
            VarClass::Monitor => Err(LowerError::new(format!("cannot assign to monitor '{}'", name))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_program;

    fn lower(source: &str) -> (Trace, VarTable) {
        let stmts = parse_program(source).unwrap();
        let mut vars = VarTable::new();
        let trace = lower_thread(ThreadId::from(0), &stmts, &mut vars).unwrap();
        (trace, vars)
    }

    #[test]
    fn local_arithmetic_collapses_to_one_compute() {
        let (trace, _) = lower("local=41;local++;print(local);");
        assert_eq!(trace.len(), 3);
        assert!(matches!(trace[0].kind, EventKind::Compute { .. }));
        assert!(matches!(trace[1].kind, EventKind::Compute { .. }));
        assert!(matches!(trace[2].kind, EventKind::Print { .. }));
    }

    #[test]
    fn compound_assign_on_shared_is_read_then_write() {
        let (trace, vars) = lower("s++;");
        assert_eq!(trace.len(), 2);
        match &trace[0].kind {
            EventKind::Read { var, .. } => assert_eq!(vars.name(*var), "s"),
            other => panic!("expected Read, got {:?}", other),
        }
        assert!(matches!(trace[1].kind, EventKind::Write { .. }));
    }

    #[test]
    fn reads_are_left_to_right() {
        // l1=sx;sy=l1;print(l1); -- only sx is shared, read once up front.
        let (trace, vars) = lower("l1=sx;sy=l1;print(l1);");
        let reads: Vec<_> = trace
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Read { var, .. } => Some(vars.name(*var).to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(reads, vec!["sx"]);
    }

    #[test]
    fn monitor_used_as_value_is_rejected() {
        let stmts = parse_program("print(m);").unwrap();
        let mut vars = VarTable::new();
        assert!(lower_thread(ThreadId::from(0), &stmts, &mut vars).is_err());
    }
}
