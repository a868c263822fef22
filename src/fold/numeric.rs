//! Numeric folding helpers: evaluate an operator over literal four-state
//! operands at the node's declared width.
//!
//! Constant evaluation happens at the declared width; the `width_min` part of
//! the node's sort is carried over unchanged by the caller, which bridges the
//! minimal-width and declared-width conventions. String constants never reach
//! these helpers.

use crate::environment;
use crate::expr::{BinaryOp, Expr, Logic, Op, UnaryOp};
use std::collections::HashMap;

/// Tries to evaluate `expr` to a constant, assuming its operands are already
/// folded. Returns `None` when any relevant operand is not a literal logic
/// constant or the operator is not deterministically foldable.
pub fn fold(expr: &Expr) -> Option<Logic> {
    let width = expr.width();
    match expr.op() {
        Op::Unary(op) => {
            let a = expr.operands()[0].as_logic()?;
            Some(eval_unary(*op, a, width))
        }
        Op::Binary(op) => {
            let a = expr.operands()[0].as_logic()?;
            let b = expr.operands()[1].as_logic()?;
            Some(eval_binary(*op, a, b, width))
        }
        Op::Cond => {
            let c = expr.operands()[0].as_logic()?;
            let t = expr.operands()[1].as_logic()?;
            let e = expr.operands()[2].as_logic()?;
            Some(eval_cond(c, t, e))
        }
        Op::Sel => {
            let from = expr.operands()[0].as_logic()?;
            let lsb = expr.operands()[1].as_logic()?;
            Some(eval_sel(from, lsb, width))
        }
        _ => None,
    }
}

pub fn eval_unary(op: UnaryOp, a: &Logic, width: usize) -> Logic {
    match op {
        UnaryOp::Not => a.not(),
        UnaryOp::LogNot => a.log_not(),
        UnaryOp::Negate => a.negate(),
        UnaryOp::RedAnd => a.red_and(),
        UnaryOp::RedOr => a.red_or(),
        UnaryOp::RedXor => a.red_xor(),
        UnaryOp::Extend => a.extend(width),
        UnaryOp::ExtendSigned => a.extend_signed(width),
        UnaryOp::Cast => a.trunc(width),
    }
}

pub fn eval_binary(op: BinaryOp, a: &Logic, b: &Logic, width: usize) -> Logic {
    use BinaryOp::*;
    match op {
        And => a.and(b),
        Or => a.or(b),
        Xor => a.xor(b),
        Add => a.add(b),
        Sub => a.sub(b),
        Mul | MulSigned => a.mul(b),
        Div => a.div_u(b),
        DivSigned => a.div_s(b),
        Mod => a.mod_u(b),
        ModSigned => a.mod_s(b),
        Pow => a.pow_u(b),
        ShiftL => match b.value_u64() {
            Some(n) => a.shl(n.min(a.bits() as u64) as usize),
            None => Logic::all_x(a.bits()),
        },
        ShiftR => match b.value_u64() {
            Some(n) => a.shr(n.min(a.bits() as u64) as usize),
            None => Logic::all_x(a.bits()),
        },
        ShiftRSigned => match b.value_u64() {
            Some(n) => a.shr_signed(n.min(a.bits() as u64) as usize),
            None => Logic::all_x(a.bits()),
        },
        Eq => a.eq(b),
        Neq => a.neq(b),
        EqCase => a.eq_case(b),
        NeqCase => a.neq_case(b),
        EqWild => a.eq_wild(b),
        NeqWild => a.neq_wild(b),
        Lt => a.lt_u(b),
        LtSigned => a.lt_s(b),
        Lte => a.lte_u(b),
        LteSigned => a.lte_s(b),
        Gt => a.gt_u(b),
        GtSigned => a.gt_s(b),
        Gte => a.gte_u(b),
        GteSigned => a.gte_s(b),
        LogAnd => a.log_and(b),
        LogOr => a.log_or(b),
        Concat => a.concat(b),
        Replicate => match b.value_u64() {
            Some(n) => a.replicate(n as usize),
            None => Logic::all_x(width),
        },
        WordSel => match b.value_u64() {
            Some(n) => a.select(n as usize * environment::WORD_SIZE, environment::WORD_SIZE),
            None => Logic::all_x(environment::WORD_SIZE),
        },
    }
}

pub fn eval_cond(c: &Logic, t: &Logic, e: &Logic) -> Logic {
    if c.is_nonzero() {
        t.clone()
    } else if !c.has_unknown() {
        e.clone()
    } else {
        t.cond_merge(e)
    }
}

pub fn eval_sel(from: &Logic, lsb: &Logic, width: usize) -> Logic {
    match lsb.value_u64() {
        Some(n) => from.select(n as usize, width),
        None => Logic::all_x(width),
    }
}

/// Reference interpreter over an assignment of variable values. Used to
/// check evaluation equivalence of rewrites; opaque calls do not evaluate.
pub fn evaluate(expr: &Expr, bindings: &HashMap<String, Logic>) -> Option<Logic> {
    match expr.op() {
        Op::Const(c) => c.as_logic().cloned(),
        Op::Var(v) => {
            let value = bindings.get(v.name())?;
            Some(if value.bits() >= v.sort().width() {
                value.trunc(v.sort().width())
            } else {
                value.extend(v.sort().width())
            })
        }
        Op::Call(_) => None,
        Op::Unary(op) => {
            let a = evaluate(&expr.operands()[0], bindings)?;
            Some(eval_unary(*op, &a, expr.width()))
        }
        Op::Binary(op) => {
            let a = evaluate(&expr.operands()[0], bindings)?;
            let b = evaluate(&expr.operands()[1], bindings)?;
            Some(eval_binary(*op, &a, &b, expr.width()))
        }
        Op::Cond => {
            let c = evaluate(&expr.operands()[0], bindings)?;
            let t = evaluate(&expr.operands()[1], bindings)?;
            let e = evaluate(&expr.operands()[2], bindings)?;
            Some(eval_cond(&c, &t, &e))
        }
        Op::Sel => {
            let from = evaluate(&expr.operands()[0], bindings)?;
            let lsb = evaluate(&expr.operands()[1], bindings)?;
            Some(eval_sel(&from, &lsb, expr.width()))
        }
    }
}
