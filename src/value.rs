//! The Value & Expression Evaluator (spec §4.1).
//!
//! Operates purely on a [`ValueExpr`] (already lowered, so its only leaves are literals and
//! [`Slot`] references) plus the thread's current local environment -- it never touches shared
//! memory, since every shared read has already been pulled out into a `Read` event by
//! [`crate::lower`].

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::ast::BinOp;
use crate::event::{Slot, ValueExpr};

/// Raised when `/` or `%` is evaluated with a zero divisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DivisionByZero;

impl Display for DivisionByZero {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "division by zero")
    }
}

impl std::error::Error for DivisionByZero {}

/// A thread's local environment: named locals and ephemeral read-temporaries, all resolved to
/// concrete values by the time they're referenced.
pub type Env = HashMap<Slot, i64>;

/// Evaluates a lowered expression against a thread's current environment. Unset slots default
/// to 0 (a local read before any assignment), matching every other "absent means 0" default in
/// this language.
pub fn evaluate(expr: &ValueExpr, env: &Env) -> Result<i64, DivisionByZero> {
    match expr {
        ValueExpr::Lit(n) => Ok(*n),
        ValueExpr::Ref(slot) => Ok(*env.get(slot).unwrap_or(&0)),
        ValueExpr::Neg(inner) => Ok(-evaluate(inner, env)?),
        ValueExpr::Bin(op, lhs, rhs) => {
            let l = evaluate(lhs, env)?;
            let r = evaluate(rhs, env)?;
            apply(*op, l, r)
        }
    }
}

fn apply(op: BinOp, l: i64, r: i64) -> Result<i64, DivisionByZero> {
    match op {
        BinOp::Add => Ok(l.wrapping_add(r)),
        BinOp::Sub => Ok(l.wrapping_sub(r)),
        BinOp::Mul => Ok(l.wrapping_mul(r)),
        // Rust's `/` and `%` on signed integers already truncate toward zero.
        BinOp::Div => l.checked_div(r).ok_or(DivisionByZero),
        BinOp::Mod => l.checked_rem(r).ok_or(DivisionByZero),
        BinOp::Or => Ok(l | r),
        BinOp::Xor => Ok(l ^ r),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lit(n: i64) -> ValueExpr {
        ValueExpr::Lit(n)
    }

    fn bin(op: BinOp, l: ValueExpr, r: ValueExpr) -> ValueExpr {
        ValueExpr::Bin(op, Box::new(l), Box::new(r))
    }

    #[test]
    fn precedence_sample_from_corpus() {
        // -12*3|1 == -35
        let expr = bin(
            BinOp::Or,
            bin(BinOp::Mul, ValueExpr::Neg(Box::new(lit(12))), lit(3)),
            lit(1),
        );
        assert_eq!(evaluate(&expr, &Env::new()), Ok(-35));

        // 9^3 == 10
        let expr = bin(BinOp::Xor, lit(9), lit(3));
        assert_eq!(evaluate(&expr, &Env::new()), Ok(10));

        // 6/2*(1+2) == 9
        let expr = bin(BinOp::Mul, bin(BinOp::Div, lit(6), lit(2)), bin(BinOp::Add, lit(1), lit(2)));
        assert_eq!(evaluate(&expr, &Env::new()), Ok(9));
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(evaluate(&bin(BinOp::Div, lit(-7), lit(2)), &Env::new()), Ok(-3));
        assert_eq!(evaluate(&bin(BinOp::Mod, lit(-7), lit(2)), &Env::new()), Ok(-1));
    }

    #[test]
    fn division_by_zero_is_caught() {
        assert_eq!(evaluate(&bin(BinOp::Div, lit(1), lit(0)), &Env::new()), Err(DivisionByZero));
        assert_eq!(evaluate(&bin(BinOp::Mod, lit(1), lit(0)), &Env::new()), Err(DivisionByZero));
    }

    #[test]
    fn unset_slot_defaults_to_zero() {
        let expr = ValueExpr::Ref(Slot::Temp(0));
        assert_eq!(evaluate(&expr, &Env::new()), Ok(0));
    }
}
