//! Structural guard predicates and small tree-surgery helpers shared by the
//! rule engine.

use crate::expr::{BinaryOp, Expr, Op};

/// Cheap structural "same value" check.
///
/// Deliberately restricted: identical constants, identical simple variable
/// references, and the `const & varref` duplication pattern produced by
/// coverage instrumentation. This is not semantic equivalence; rules relying
/// on it accept that it misses equal-but-differently-shaped operands.
pub fn operands_same(a: &Expr, b: &Expr) -> bool {
    match (a.op(), b.op()) {
        (Op::Const(ca), Op::Const(cb)) => match (ca.as_logic(), cb.as_logic()) {
            (Some(la), Some(lb)) => la.case_equal(lb),
            _ => ca == cb,
        },
        (Op::Var(va), Op::Var(vb)) => va == vb,
        (Op::Binary(BinaryOp::And), Op::Binary(BinaryOp::And)) => {
            let (al, ar) = (&a.operands()[0], &a.operands()[1]);
            let (bl, br) = (&b.operands()[0], &b.operands()[1]);
            al.is_const()
                && ar.as_var().is_some()
                && operands_same(al, bl)
                && operands_same(ar, br)
        }
        _ => false,
    }
}

/// Conservative scan proving that `expr` does not reference variable `name`.
/// Depth is limited; anything deeper than `depth_limit` levels counts as
/// "cannot prove", so the caller must not merge.
pub fn var_not_referenced(expr: &Expr, name: &str, depth: usize, depth_limit: usize) -> bool {
    if depth > depth_limit {
        return false;
    }
    match expr.op() {
        Op::Var(v) => v.name() != name,
        Op::Call(_) => false, // may reference anything
        _ => expr
            .operands()
            .iter()
            .all(|o| var_not_referenced(o, name, depth + 1, depth_limit)),
    }
}

/// Constant select: `(source variable name, lsb, width)` if `expr` is a
/// select of a plain variable with a constant index.
pub fn const_sel_of_var(expr: &Expr) -> Option<(&str, usize, usize)> {
    if !matches!(expr.op(), Op::Sel) {
        return None;
    }
    let var = expr.operands()[0].as_var()?;
    let lsb = expr.operands()[1].as_logic()?.value_u64()? as usize;
    Some((var.name(), lsb, expr.width()))
}

/// Whether `upper` and `lower` may be merged into a single term when their
/// concatenation is distributed over a bitwise operator: either the same
/// value, bit-adjacent selects of the same source, or concatenations whose
/// halves are pairwise mergeable. Bounded by `depth` to cap the cost on deep
/// concatenation trees.
pub fn concat_mergeable(upper: &Expr, lower: &Expr, depth: usize) -> bool {
    if depth == 0 {
        return false;
    }
    if operands_same(upper, lower) {
        return true;
    }
    if let (Some((va, lsb_a, _wa)), Some((vb, lsb_b, wb))) =
        (const_sel_of_var(upper), const_sel_of_var(lower))
    {
        if va == vb && lsb_b + wb == lsb_a {
            return true;
        }
    }
    match (upper.op(), lower.op()) {
        (Op::Binary(BinaryOp::Concat), Op::Binary(BinaryOp::Concat)) => {
            concat_mergeable(&upper.operands()[0], &lower.operands()[0], depth - 1)
                && concat_mergeable(&upper.operands()[1], &lower.operands()[1], depth - 1)
        }
        _ => false,
    }
}

/// Joins two mergeable terms (see `concat_mergeable`) into one wider term.
pub fn concat_merge(upper: &Expr, lower: &Expr, depth: usize) -> Option<Expr> {
    if operands_same(upper, lower) {
        return Some(Expr::replicate(lower.clone(), 2));
    }
    if let (Some((va, lsb_a, wa)), Some((vb, lsb_b, wb))) =
        (const_sel_of_var(upper), const_sel_of_var(lower))
    {
        if va == vb && lsb_b + wb == lsb_a {
            let source = upper.operands()[0].clone();
            return Some(Expr::sel_const(source, lsb_b, wa + wb));
        }
    }
    if depth == 0 {
        return None;
    }
    match (upper.op(), lower.op()) {
        (Op::Binary(BinaryOp::Concat), Op::Binary(BinaryOp::Concat)) => {
            let hi = concat_merge(&upper.operands()[0], &lower.operands()[0], depth - 1)?;
            let lo = concat_merge(&upper.operands()[1], &lower.operands()[1], depth - 1)?;
            Some(Expr::concat(hi, lo))
        }
        _ => None,
    }
}
