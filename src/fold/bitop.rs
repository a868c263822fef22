//! Bit-reduction-tree matching.
//!
//! A chain of one-bit AND/OR/XOR operations over bit extracts of the same
//! variables (`v[0] & v[1] & ~v[3] & ...`) evaluates one operator per leaf.
//! The same function is computable with a handful of word-wide operations:
//! an AND tree becomes a masked equality, an OR tree a masked inequality and
//! an XOR tree a masked parity reduction. This module recognizes such trees,
//! prices the replacement and installs it only when it is strictly cheaper
//! than the original.
//!
//! Two composite shapes also decompose into one-bit leaves: a reduction XOR
//! of a constant-masked variable is the XOR of the masked bits, and a
//! constant equality (inequality) with a masked variable is an AND (OR) over
//! per-bit constraints.
//!
//! Subtrees that do not look like a bit extract are frozen: they survive the
//! rewrite verbatim and are joined back with the tree operator. An impure
//! node anywhere aborts the match, since the rewrite reorders evaluation.

use crate::expr::{BinaryOp, Bit, Expr, Logic, Op, Sort, UnaryOp, Variable};
use crate::fold::Stats;
use bit_vec::BitVec;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TreeOp {
    And,
    Or,
    Xor,
}

impl TreeOp {
    fn binary(self) -> BinaryOp {
        match self {
            Self::And => BinaryOp::And,
            Self::Or => BinaryOp::Or,
            Self::Xor => BinaryOp::Xor,
        }
    }
}

/// One flattened term of the tree: either a single-bit extract of a variable
/// or an opaque subtree kept as-is. `polarity` is false under an odd number
/// of negations.
enum Term {
    Leaf {
        var: Variable,
        lsb: usize,
        polarity: bool,
    },
    Frozen {
        expr: Expr,
        polarity: bool,
    },
    /// A term decided while flattening (an impossible comparison, an empty
    /// reduction). The value is final, polarity already applied.
    Const(bool),
}

/// Per-variable occupancy planes. `set` marks bits referenced by some leaf,
/// `val` their polarity. A polarity conflict on the same bit decides the
/// whole AND (constant zero) or OR (constant one) tree.
struct VarInfo {
    var: Variable,
    set: BitVec,
    val: BitVec,
}

impl VarInfo {
    fn new(var: Variable) -> Self {
        let width = var.sort().width();
        Self {
            var,
            set: BitVec::from_elem(width, false),
            val: BitVec::from_elem(width, false),
        }
    }
}

/// Tries to rewrite `expr` as word-wide masked operations. `external_ops`
/// credits operators the caller already stripped (a unit mask around the
/// tree). Returns the replacement only when strictly cheaper.
pub fn simplify(expr: &Expr, external_ops: usize, stats: &mut Stats) -> Option<Expr> {
    if expr.width() != 1 || !expr.is_pure() {
        return None;
    }
    let op = match expr.op() {
        Op::Binary(BinaryOp::And) => TreeOp::And,
        Op::Binary(BinaryOp::Or) => TreeOp::Or,
        Op::Binary(BinaryOp::Xor) => TreeOp::Xor,
        Op::Unary(UnaryOp::RedXor) => TreeOp::Xor,
        _ => return None,
    };

    let mut terms = Vec::new();
    flatten(expr, op, true, &mut terms)?;

    let mut vars: BTreeMap<String, VarInfo> = BTreeMap::new();
    let mut frozen: Vec<(Expr, bool)> = Vec::new();
    // XOR negations commute to the outside as one final inversion.
    let mut xor_parity = false;
    let mut leaf_count = 0usize;

    for term in terms {
        match term {
            Term::Leaf { var, lsb, polarity } => {
                leaf_count += 1;
                if lsb >= var.sort().width() {
                    return None;
                }
                let info = vars
                    .entry(var.name().to_string())
                    .or_insert_with(|| VarInfo::new(var));
                match op {
                    TreeOp::And | TreeOp::Or => {
                        if info.set.get(lsb) == Some(true) {
                            if info.val.get(lsb) != Some(polarity) {
                                // v[b] & ~v[b] and v[b] | ~v[b] are decided
                                let value = if op == TreeOp::Or { 1 } else { 0 };
                                stats.bitop_trees += 1;
                                return Some(Expr::logic_u64(value, 1));
                            }
                            // duplicate leaf, drops out
                        } else {
                            info.set.set(lsb, true);
                            info.val.set(lsb, polarity);
                        }
                    }
                    TreeOp::Xor => {
                        if !polarity {
                            xor_parity = !xor_parity;
                        }
                        // double occurrence cancels
                        let present = info.set.get(lsb) == Some(true);
                        info.set.set(lsb, !present);
                    }
                }
            }
            Term::Frozen { expr, polarity } => {
                if op == TreeOp::Xor && !polarity {
                    xor_parity = !xor_parity;
                    frozen.push((expr, true));
                } else {
                    frozen.push((expr, polarity));
                }
            }
            Term::Const(value) => match op {
                TreeOp::And if !value => {
                    stats.bitop_trees += 1;
                    return Some(Expr::logic_u64(0, 1));
                }
                TreeOp::Or if value => {
                    stats.bitop_trees += 1;
                    return Some(Expr::logic_u64(1, 1));
                }
                TreeOp::Xor if value => xor_parity = !xor_parity,
                // the operator's identity element, drops out
                _ => {}
            },
        }
    }
    if leaf_count == 0 {
        return None;
    }

    let mut pieces: Vec<Expr> = Vec::new();
    for info in vars.values() {
        if let Some(piece) = synthesize(op, info) {
            pieces.push(piece);
        }
    }
    for (frozen_expr, polarity) in frozen {
        pieces.push(if polarity {
            frozen_expr
        } else {
            Expr::not(frozen_expr)
        });
    }

    let mut result = match pieces.len() {
        // everything cancelled out of an XOR tree
        0 => Expr::logic_u64(0, 1),
        _ => {
            let mut it = pieces.into_iter();
            let first = it.next()?;
            it.fold(first, |acc, piece| {
                Expr::binary(op.binary(), acc, piece, Sort::bit())
            })
        }
    };
    if xor_parity {
        result = Expr::not(result);
    }

    if op_count(&result) < op_count(expr) + external_ops {
        stats.bitop_trees += 1;
        Some(result)
    } else {
        None
    }
}

/// Flattens a same-operator chain into terms. Returns `None` when the tree
/// contains an impure node.
fn flatten(expr: &Expr, op: TreeOp, polarity: bool, terms: &mut Vec<Term>) -> Option<()> {
    match expr.op() {
        Op::Binary(b) if *b == op.binary() && expr.width() == 1 => {
            flatten(&expr.operands()[0], op, polarity, terms)?;
            flatten(&expr.operands()[1], op, polarity, terms)?;
            Some(())
        }
        Op::Unary(UnaryOp::Not) if expr.width() == 1 => {
            flatten(&expr.operands()[0], op, !polarity, terms)
        }
        Op::Unary(UnaryOp::RedXor) if op == TreeOp::Xor => {
            if !push_reduction_leaves(expr, polarity, terms) {
                terms.push(Term::Frozen {
                    expr: expr.clone(),
                    polarity,
                });
            }
            Some(())
        }
        _ => {
            if let Some((var, lsb)) = leaf_extract(expr) {
                terms.push(Term::Leaf { var, lsb, polarity });
                return Some(());
            }
            if push_compare_leaves(expr, op, polarity, terms) {
                return Some(());
            }
            if expr.is_pure() {
                terms.push(Term::Frozen {
                    expr: expr.clone(),
                    polarity,
                });
                return Some(());
            }
            None
        }
    }
}

/// A variable under an optional two-state constant mask: `v` or `mask & v`.
fn masked_var(expr: &Expr) -> Option<(Logic, Variable)> {
    match expr.op() {
        Op::Var(v) => Some((Logic::all_ones(expr.width()), v.clone())),
        Op::Binary(BinaryOp::And) => {
            let (a, b) = (&expr.operands()[0], &expr.operands()[1]);
            let (c, v) = match (a.as_logic(), b.as_var()) {
                (Some(c), Some(v)) => (c, v),
                _ => (b.as_logic()?, a.as_var()?),
            };
            c.value()?;
            Some((c.clone(), v.clone()))
        }
        _ => None,
    }
}

/// Expands `^x` into one-bit leaves when `x` is a variable or a
/// constant-masked variable. A negation over the reduction flips the parity
/// once, so only the first leaf carries it.
fn push_reduction_leaves(expr: &Expr, polarity: bool, terms: &mut Vec<Term>) -> bool {
    let (mask, var) = match masked_var(&expr.operands()[0]) {
        Some(pair) => pair,
        None => return false,
    };
    let width = var.sort().width();
    let mut polarity = polarity;
    let mut any = false;
    for b in 0..mask.bits().min(width) {
        if mask.bit(b) == Bit::One {
            terms.push(Term::Leaf {
                var: var.clone(),
                lsb: b,
                polarity,
            });
            polarity = true;
            any = true;
        }
    }
    if !any {
        // the reduction of an empty bit set is zero
        terms.push(Term::Const(!polarity));
    }
    true
}

/// Expands a constant comparison with a masked variable into one-bit leaves.
/// An equality is an AND over the masked bits and an inequality an OR, so
/// each form decomposes only under the matching root operator.
fn push_compare_leaves(expr: &Expr, op: TreeOp, polarity: bool, terms: &mut Vec<Term>) -> bool {
    let cmp = match expr.op() {
        Op::Binary(b @ (BinaryOp::Eq | BinaryOp::Neq)) => *b,
        _ => return false,
    };
    let equality = (cmp == BinaryOp::Eq) == polarity;
    match (op, equality) {
        (TreeOp::And, true) | (TreeOp::Or, false) => {}
        _ => return false,
    }
    let c = match expr.operands()[0].as_logic() {
        Some(c) if c.value().is_some() => c.clone(),
        _ => return false,
    };
    let (mask, var) = match masked_var(&expr.operands()[1]) {
        Some(pair) => pair,
        None => return false,
    };
    // a constant bit outside the mask decides the comparison on its own
    if c.and(&mask.not()).is_nonzero() {
        terms.push(Term::Const(op == TreeOp::Or));
        return true;
    }
    let width = var.sort().width();
    for b in 0..mask.bits().min(width) {
        if mask.bit(b) != Bit::One {
            continue;
        }
        let wanted = c.bit(b) == Bit::One;
        terms.push(Term::Leaf {
            var: var.clone(),
            lsb: b,
            // an OR leaf is true where the bit differs from the constant
            polarity: if op == TreeOp::And { wanted } else { !wanted },
        });
    }
    true
}

/// A single-bit read of a variable: the variable itself when one bit wide,
/// or a constant-index one-bit select.
fn leaf_extract(expr: &Expr) -> Option<(Variable, usize)> {
    match expr.op() {
        Op::Var(v) if expr.width() == 1 => Some((v.clone(), 0)),
        Op::Sel if expr.width() == 1 => {
            let var = expr.operands()[0].as_var()?;
            let lsb = expr.operands()[1].as_logic()?.value_u64()? as usize;
            Some((var.clone(), lsb))
        }
        _ => None,
    }
}

/// Builds the word-wide replacement for all leaves of one variable.
fn synthesize(op: TreeOp, info: &VarInfo) -> Option<Expr> {
    let width = info.var.sort().width();
    let occupied: Vec<usize> = (0..width)
        .filter(|&b| info.set.get(b) == Some(true))
        .collect();
    match occupied.len() {
        0 => None,
        1 => {
            let b = occupied[0];
            let bit = Expr::sel_const(Expr::variable(info.var.clone()), b, 1);
            let positive = match op {
                TreeOp::Xor => true,
                _ => info.val.get(b) == Some(true),
            };
            Some(if positive { bit } else { Expr::not(bit) })
        }
        _ => {
            let mut mask = Logic::zero(width);
            let mut expected = Logic::zero(width);
            for &b in &occupied {
                mask = mask.or(&Logic::ones_range(b, 1, width));
                let positive = info.val.get(b) == Some(true);
                let wanted = match op {
                    // the pattern on which every OR leaf is false
                    TreeOp::Or => !positive,
                    _ => positive,
                };
                if wanted {
                    expected = expected.or(&Logic::ones_range(b, 1, width));
                }
            }
            let masked = Expr::binary(
                BinaryOp::And,
                Expr::logic(mask),
                Expr::variable(info.var.clone()),
                Sort::new(width),
            );
            Some(match op {
                TreeOp::And => Expr::binary(
                    BinaryOp::Eq,
                    Expr::logic(expected),
                    masked,
                    Sort::bit(),
                ),
                TreeOp::Or => Expr::binary(
                    BinaryOp::Neq,
                    Expr::logic(expected),
                    masked,
                    Sort::bit(),
                ),
                TreeOp::Xor => Expr::red_xor(masked),
            })
        }
    }
}

/// Price of a tree: one per operator node, constants and variables are free.
fn op_count(expr: &Expr) -> usize {
    let self_cost = match expr.op() {
        Op::Const(_) | Op::Var(_) => 0,
        _ => 1,
    };
    self_cost + expr.operands().iter().map(op_count).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit_of(v: &Expr, b: usize) -> Expr {
        Expr::sel_const(v.clone(), b, 1)
    }

    fn var(name: &str, width: usize) -> Expr {
        Expr::variable(Variable::new(name, Sort::new(width)))
    }

    #[test]
    fn and_of_two_bits_becomes_masked_equality() {
        let v = var("v", 8);
        let tree = Expr::and(bit_of(&v, 0), bit_of(&v, 1)).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        // Eq(3, And(3, v)) costs two operators against the tree's three
        assert_eq!(op_count(&out), 2);
        assert!(matches!(out.op(), Op::Binary(BinaryOp::Eq)));
        assert_eq!(stats.bitop_trees, 1);
    }

    #[test]
    fn contradictory_and_collapses_to_zero() {
        let v = var("v", 8);
        let tree = Expr::and(bit_of(&v, 3), Expr::not(bit_of(&v, 3))).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(out.is_const_zero());
    }

    #[test]
    fn tautological_or_collapses_to_one() {
        let v = var("v", 8);
        let tree = Expr::or(bit_of(&v, 2), Expr::not(bit_of(&v, 2))).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(out.is_const_one());
    }

    #[test]
    fn xor_pairs_cancel() {
        let v = var("v", 8);
        let tree = Expr::xor(bit_of(&v, 5), bit_of(&v, 5)).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(out.is_const_zero());
    }

    #[test]
    fn too_small_a_tree_is_left_alone() {
        let v = var("v", 8);
        let w = var("w", 8);
        // two different variables, one bit each: no term merges, so the
        // rewrite cannot be cheaper
        let tree = Expr::and(bit_of(&v, 0), bit_of(&w, 0)).unwrap();
        let mut stats = Stats::default();
        assert!(simplify(&tree, 0, &mut stats).is_none());
    }

    #[test]
    fn frozen_subtree_survives() {
        let v = var("v", 8);
        let other = Expr::eq(var("a", 4), var("b", 4)).unwrap();
        let tree = Expr::and(
            Expr::and(bit_of(&v, 0), bit_of(&v, 1)).unwrap(),
            Expr::and(bit_of(&v, 2), other.clone()).unwrap(),
        )
        .unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        // masked equality joined with the untouched comparison
        assert!(matches!(out.op(), Op::Binary(BinaryOp::And)));
        assert!(out
            .operands()
            .iter()
            .any(|o| matches!(o.op(), Op::Binary(BinaryOp::Eq)) && o.operands()[1].as_var().is_some()
                || *o == other));
    }

    #[test]
    fn masked_reduction_xor_of_one_bit_reads_the_bit() {
        let tree = Expr::red_xor(
            Expr::and(Expr::logic_u64(8, 8), var("v", 8)).unwrap(),
        );
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(matches!(out.op(), Op::Sel));
        assert_eq!(out.operands()[1].as_logic().unwrap().value_u64(), Some(3));
    }

    #[test]
    fn bare_reduction_xor_is_already_cheapest() {
        let tree = Expr::red_xor(var("v", 8));
        let mut stats = Stats::default();
        assert!(simplify(&tree, 0, &mut stats).is_none());
    }

    #[test]
    fn reduction_xor_merges_into_an_enclosing_xor_tree() {
        // v[0] ^ ^(0x0c & v) => ^(0x0d & v)
        let v = var("v", 8);
        let red = Expr::red_xor(
            Expr::and(Expr::logic_u64(0x0c, 8), var("v", 8)).unwrap(),
        );
        let tree = Expr::xor(bit_of(&v, 0), red).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(matches!(out.op(), Op::Unary(UnaryOp::RedXor)));
        let masked = &out.operands()[0];
        assert_eq!(
            masked.operands()[0].as_logic().unwrap().value_u64(),
            Some(0x0d)
        );
    }

    #[test]
    fn equality_leaves_decompose_under_an_and_root() {
        // (1 == (1 & v)) & v[4] => (0x11 == (0x11 & v))
        let v = var("v", 8);
        let eq = Expr::eq(
            Expr::logic_u64(1, 8),
            Expr::and(Expr::logic_u64(1, 8), var("v", 8)).unwrap(),
        )
        .unwrap();
        let tree = Expr::and(eq, bit_of(&v, 4)).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(matches!(out.op(), Op::Binary(BinaryOp::Eq)));
        assert_eq!(out.operands()[0].as_logic().unwrap().value_u64(), Some(0x11));
    }

    #[test]
    fn impossible_equality_decides_the_and_tree() {
        // the constant has a bit outside the mask
        let v = var("v", 8);
        let eq = Expr::eq(
            Expr::logic_u64(2, 8),
            Expr::and(Expr::logic_u64(1, 8), var("v", 8)).unwrap(),
        )
        .unwrap();
        let tree = Expr::and(eq, bit_of(&v, 4)).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(out.is_const_zero());
    }

    #[test]
    fn inequality_leaves_decompose_under_an_or_root() {
        // (0 != (3 & v)) | v[4] => (0 != (0x13 & v))
        let v = var("v", 8);
        let neq = Expr::neq(
            Expr::logic_u64(0, 8),
            Expr::and(Expr::logic_u64(3, 8), var("v", 8)).unwrap(),
        )
        .unwrap();
        let tree = Expr::or(neq, bit_of(&v, 4)).unwrap();
        let mut stats = Stats::default();
        let out = simplify(&tree, 0, &mut stats).unwrap();
        assert!(matches!(out.op(), Op::Binary(BinaryOp::Neq)));
        assert_eq!(out.operands()[0].as_logic().unwrap().value_u64(), Some(0));
    }

    #[test]
    fn impure_node_aborts_the_match() {
        let v = var("v", 8);
        let call = Expr::call(
            crate::expr::Call::new("f", false),
            vec![],
            Sort::bit(),
        );
        let tree = Expr::and(bit_of(&v, 0), call).unwrap();
        let mut stats = Stats::default();
        assert!(simplify(&tree, 0, &mut stats).is_none());
    }
}
