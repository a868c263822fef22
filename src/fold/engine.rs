//! The bottom-up rewrite-rule engine.
//!
//! Children are folded first, then an ordered list of rules is tried on the
//! node; the first matching rule wins and its replacement is re-visited so
//! rules can chain. Rule order is load-bearing: the fully-constant fold is
//! tried first, so every later rule may assume at least one operand is not a
//! constant; the constant-to-the-left canonicalization runs before the
//! identity rules, so those only need to look at the left operand for
//! commutative operators.

use crate::environment::Environment;
use crate::error::Error;
use crate::expr::{BinaryOp, Expr, Logic, Op, UnaryOp};
use crate::fold::diagnostic::{Diagnostics, Warn};
use crate::fold::{bitop, numeric, structural, Mode, Oracle, Stats};

pub(crate) struct Folder<'a> {
    /// Verilog-level semantics (before wide signals are lowered to words).
    pub do_v: bool,
    /// Structural (non-constant) rewrites allowed.
    pub do_nconst: bool,
    /// Parameter-evaluation context: opaque calls go through the oracle.
    pub params: bool,
    /// The result must be a literal constant.
    pub required: bool,
    pub warn: bool,
    pub expensive: bool,
    /// Post-expansion/backend mode: word-size-aware rules are safe.
    pub cpp: bool,
    pub env: Environment,
    pub oracle: Option<&'a dyn Oracle>,
    pub diags: Diagnostics,
    pub stats: Stats,
    /// First hard error met while folding statements. Folding continues past
    /// it; the caller reports it once the whole unit is done.
    pub failure: Option<Error>,
}

impl<'a> Folder<'a> {
    pub fn new(mode: Mode, env: Environment, oracle: Option<&'a dyn Oracle>) -> Self {
        let mut f = Self {
            do_v: false,
            do_nconst: false,
            params: false,
            required: false,
            warn: false,
            expensive: false,
            cpp: false,
            env,
            oracle,
            diags: Diagnostics::default(),
            stats: Stats::default(),
            failure: None,
        };
        match mode {
            Mode::ParamsNoWarn => {
                f.do_v = true;
                f.do_nconst = true;
                f.params = true;
            }
            Mode::Params => {
                f.do_v = true;
                f.do_nconst = true;
                f.params = true;
                f.required = true;
                f.warn = true;
            }
            Mode::Generate => {
                f.do_v = true;
                f.do_nconst = true;
                f.params = true;
                f.required = true;
            }
            Mode::LivenessOnly => {}
            Mode::VerilogNoWarn => {
                f.do_v = true;
                f.do_nconst = true;
            }
            Mode::VerilogWarn => {
                f.do_v = true;
                f.do_nconst = true;
                f.warn = true;
            }
            Mode::Expensive => {
                f.do_v = true;
                f.do_nconst = true;
                f.warn = true;
                f.expensive = true;
            }
            Mode::Backend => {
                f.do_nconst = true;
                f.cpp = true;
            }
        }
        f
    }

    fn warn_if_enabled(&mut self, code: Warn, message: String) {
        if self.warn {
            self.diags.warn(code, message);
        }
    }

    // -----------------------------------------------------------------
    // Traversal

    pub fn fold_expr(&mut self, expr: &mut Expr) {
        for operand in expr.operands_mut() {
            self.fold_expr(operand);
        }
        if let Some(replacement) = self.rewrite(expr) {
            expr.replace_keeping_sort(replacement);
            // Rules chain: the replacement is itself a rewrite candidate.
            self.fold_expr(expr);
        }
    }

    fn rewrite(&mut self, expr: &Expr) -> Option<Expr> {
        // Fully-constant evaluation comes first for every operator, so all
        // later rules may assume a non-constant operand exists.
        if !expr.operands().is_empty() && expr.operands().iter().all(Expr::is_const) {
            if let Some(value) = numeric::fold(expr) {
                self.stats.consts_folded += 1;
                return Some(Expr::logic(value));
            }
        }
        // Everything below replaces structure or drops operand references;
        // a liveness-only pass stops at constant folding.
        if !self.do_nconst {
            return None;
        }
        match expr.op() {
            Op::Unary(op) => self.rewrite_unary(expr, *op),
            Op::Binary(op) => self.rewrite_binary(expr, *op),
            Op::Cond => self.rewrite_cond(expr),
            Op::Sel => self.rewrite_sel(expr),
            Op::Call(_) => self.rewrite_call(expr),
            Op::Const(_) | Op::Var(_) => None,
        }
    }

    // -----------------------------------------------------------------
    // Unary operators

    fn rewrite_unary(&mut self, expr: &Expr, op: UnaryOp) -> Option<Expr> {
        let a = &expr.operands()[0];
        match op {
            UnaryOp::Not => {
                // ~(~x) => x
                if let Op::Unary(UnaryOp::Not) = a.op() {
                    return Some(a.operands()[0].clone());
                }
                // Single-bit ~(a == b) => a != b and the seven other pairs.
                if expr.width() == 1 {
                    if let Op::Binary(inner) = a.op() {
                        if let Some(flipped) = inner.negated_comparison() {
                            return Some(Expr::binary(
                                flipped,
                                a.operands()[0].clone(),
                                a.operands()[1].clone(),
                                *a.sort(),
                            ));
                        }
                    }
                }
                None
            }
            UnaryOp::LogNot => {
                if let Op::Binary(inner) = a.op() {
                    if let Some(flipped) = inner.negated_comparison() {
                        return Some(Expr::binary(
                            flipped,
                            a.operands()[0].clone(),
                            a.operands()[1].clone(),
                            *a.sort(),
                        ));
                    }
                }
                // !(!x) keeps only the truthiness of x
                if let Op::Unary(UnaryOp::LogNot) = a.op() {
                    let x = &a.operands()[0];
                    return Some(if x.width() == 1 {
                        x.clone()
                    } else {
                        Expr::red_or(x.clone())
                    });
                }
                if self.do_nconst && a.width() == 1 {
                    return Some(Expr::not(a.clone()));
                }
                None
            }
            UnaryOp::Negate => {
                if let Op::Unary(UnaryOp::Negate) = a.op() {
                    return Some(a.operands()[0].clone());
                }
                None
            }
            UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor => {
                if a.width() == 1 {
                    return Some(a.clone());
                }
                if let Op::Unary(UnaryOp::Extend) = a.op() {
                    let x = &a.operands()[0];
                    match op {
                        // the zero-extended bits decide an AND reduction
                        UnaryOp::RedAnd if a.width() > x.width() => {
                            return Some(Expr::logic_u64(0, 1));
                        }
                        UnaryOp::RedOr => return Some(Expr::red_or(x.clone())),
                        UnaryOp::RedXor => return Some(Expr::red_xor(x.clone())),
                        _ => {}
                    }
                }
                if op == UnaryOp::RedXor && self.cpp {
                    if let Some(replacement) = bitop::simplify(expr, 0, &mut self.stats) {
                        return Some(replacement);
                    }
                }
                None
            }
            UnaryOp::Extend | UnaryOp::ExtendSigned => {
                if expr.width() == a.width() {
                    return Some(a.clone());
                }
                None
            }
            UnaryOp::Cast => {
                if expr.width() == a.width() {
                    return Some(a.clone());
                }
                if let Op::Unary(UnaryOp::Cast) = a.op() {
                    return Some(
                        Expr::cast(a.operands()[0].clone(), expr.width()).ok()?,
                    );
                }
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // Binary operators

    fn rewrite_binary(&mut self, expr: &Expr, op: BinaryOp) -> Option<Expr> {
        let lhs = &expr.operands()[0];
        let rhs = &expr.operands()[1];

        // Constants canonicalize to the left of commutative operators.
        if op.is_commutative() && rhs.is_const() && !lhs.is_const() {
            return Some(Expr::binary(op, rhs.clone(), lhs.clone(), *expr.sort()));
        }
        // Ordered comparisons move their constant to the left by flipping.
        if op.is_comparison() && rhs.is_const() && !lhs.is_const() {
            if let Some(swapped) = op.swapped_comparison() {
                return Some(Expr::binary(swapped, rhs.clone(), lhs.clone(), *expr.sort()));
            }
        }

        use BinaryOp::*;
        match op {
            And => self.rewrite_and(expr, lhs, rhs),
            Or => self.rewrite_or(expr, lhs, rhs),
            Xor => self.rewrite_xor(expr, lhs, rhs),
            Add => {
                if lhs.is_const_zero() && rhs.width() == expr.width() {
                    return Some(rhs.clone());
                }
                self.reassociate(expr, lhs, rhs, op)
            }
            Sub => {
                if rhs.is_const_zero() {
                    return Some(lhs.clone());
                }
                if structural::operands_same(lhs, rhs) && lhs.is_pure() {
                    return Some(Expr::logic(Logic::zero(expr.width())));
                }
                // x - c => x + (-c), so the ADD re-association sees it
                if let Some(c) = rhs.as_logic() {
                    if !c.has_unknown() {
                        return Some(Expr::binary(
                            Add,
                            lhs.clone(),
                            Expr::logic(c.negate()),
                            *expr.sort(),
                        ));
                    }
                }
                None
            }
            Mul | MulSigned => {
                if lhs.is_const_zero() && rhs.is_pure() {
                    return Some(Expr::logic(Logic::zero(expr.width())));
                }
                if lhs.is_const_one() && rhs.width() == expr.width() {
                    return Some(rhs.clone());
                }
                if op == Mul {
                    if let Some(bit) = lhs.as_logic().and_then(Logic::pow2_bit) {
                        // equal widths only; otherwise the carry-extension
                        // semantics of the multiply would be lost
                        if lhs.width() == rhs.width() {
                            return Some(Expr::shift_l(
                                rhs.clone(),
                                Expr::logic_u64(bit as u64, 32),
                            ));
                        }
                    }
                    return self.reassociate(expr, lhs, rhs, op);
                }
                None
            }
            Div | DivSigned => {
                if rhs.is_const_one() {
                    return Some(lhs.clone());
                }
                if op == Div {
                    if let Some(bit) = rhs.as_logic().and_then(Logic::pow2_bit) {
                        return Some(Expr::shift_r(
                            lhs.clone(),
                            Expr::logic_u64(bit as u64, 32),
                        ));
                    }
                }
                None
            }
            Mod | ModSigned => {
                if rhs.is_const_one() && lhs.is_pure() {
                    return Some(Expr::logic(Logic::zero(expr.width())));
                }
                if op == Mod {
                    if let Some(c) = rhs.as_logic() {
                        if c.pow2_bit().is_some() {
                            let mask = c.sub(&Logic::one(c.bits()));
                            return Some(Expr::binary(
                                And,
                                Expr::logic(mask),
                                lhs.clone(),
                                *expr.sort(),
                            ));
                        }
                    }
                }
                None
            }
            Pow => {
                if rhs.is_const_zero() && lhs.is_pure() {
                    return Some(Expr::logic(Logic::one(expr.width())));
                }
                if rhs.is_const_one() {
                    return Some(lhs.clone());
                }
                if lhs.is_const_one() && rhs.is_pure() {
                    return Some(Expr::logic(Logic::one(expr.width())));
                }
                None
            }
            ShiftL | ShiftR | ShiftRSigned => self.rewrite_shift(expr, lhs, rhs, op),
            LogAnd | LogOr => self.rewrite_logical(expr, lhs, rhs, op),
            op if op.is_comparison() => self.rewrite_compare(expr, lhs, rhs, op),
            Concat => self.rewrite_concat(expr, lhs, rhs),
            Replicate => {
                if rhs.is_const_one() {
                    return Some(lhs.clone());
                }
                None
            }
            WordSel => None,
            _ => None,
        }
    }

    fn reassociate(
        &mut self,
        expr: &Expr,
        lhs: &Expr,
        rhs: &Expr,
        op: BinaryOp,
    ) -> Option<Expr> {
        // (c1 OP (c2 OP x)) => ((c1 OP c2) OP x); constants combine and the
        // next visit folds them.
        if !op.is_associative() || !lhs.is_const() {
            return None;
        }
        if let Op::Binary(inner) = rhs.op() {
            if *inner == op && rhs.operands()[0].is_const() {
                let a = lhs.as_logic()?;
                let b = rhs.operands()[0].as_logic()?;
                let combined = numeric::eval_binary(op, a, b, expr.width());
                self.stats.consts_folded += 1;
                return Some(Expr::binary(
                    op,
                    Expr::logic(combined),
                    rhs.operands()[1].clone(),
                    *expr.sort(),
                ));
            }
        }
        None
    }

    fn rewrite_and(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
        if lhs.is_const_zero() && rhs.is_pure() {
            return Some(Expr::logic(Logic::zero(expr.width())));
        }
        if lhs.is_const_all_ones() && rhs.width() == expr.width() {
            return Some(rhs.clone());
        }
        if structural::operands_same(lhs, rhs) {
            return Some(lhs.clone());
        }
        if let Some(r) = self.reassociate(expr, lhs, rhs, BinaryOp::And) {
            return Some(r);
        }
        if let Some(r) = self.rewrite_masked(expr, lhs, rhs) {
            return Some(r);
        }
        // Push a unit mask into a conditional whose branch is constant, so
        // the next visit folds that branch.
        if self.do_nconst && lhs.is_const_one() {
            if let Op::Cond = rhs.op() {
                let (c, t, e) = (&rhs.operands()[0], &rhs.operands()[1], &rhs.operands()[2]);
                if t.is_const() || e.is_const() {
                    let then = Expr::binary(BinaryOp::And, lhs.clone(), t.clone(), *t.sort());
                    let else_ = Expr::binary(BinaryOp::And, lhs.clone(), e.clone(), *e.sort());
                    return Some(Expr::new(
                        Op::Cond,
                        vec![c.clone(), then, else_],
                        *expr.sort(),
                    ));
                }
            }
        }
        if self.cpp {
            // `1 & (tree)` strips the mask and charges it as one spent op
            if lhs.is_const_one() && rhs.width() == expr.width() {
                if let Some(r) = bitop::simplify(rhs, 1, &mut self.stats) {
                    return Some(r);
                }
            }
            if let Some(r) = bitop::simplify(expr, 0, &mut self.stats) {
                return Some(r);
            }
        }
        None
    }

    /// Mask simplifications over shifted terms: drop an OR operand whose
    /// non-zero bit range lies entirely outside the constant mask, then drop
    /// the mask itself once it exactly covers the shift's live range.
    fn rewrite_masked(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
        let mask = lhs.as_logic()?;
        let width = expr.width();
        if let Op::Binary(BinaryOp::Or) = rhs.op() {
            let a = &rhs.operands()[0];
            let b = &rhs.operands()[1];
            if mask.and(&possible_ones(a, width)).is_zero() && a.is_pure() {
                return Some(Expr::binary(
                    BinaryOp::And,
                    lhs.clone(),
                    b.clone(),
                    *expr.sort(),
                ));
            }
            if mask.and(&possible_ones(b, width)).is_zero() && b.is_pure() {
                return Some(Expr::binary(
                    BinaryOp::And,
                    lhs.clone(),
                    a.clone(),
                    *expr.sort(),
                ));
            }
        }
        // mask exactly equals the shift's non-zero range: redundant
        if let Op::Binary(shift_op @ (BinaryOp::ShiftL | BinaryOp::ShiftR)) = rhs.op() {
            let amount = rhs.operands()[1].as_logic()?.value_u64()? as usize;
            if amount < width {
                let live = match shift_op {
                    BinaryOp::ShiftL => Logic::ones_range(amount, width - amount, width),
                    _ => Logic::ones_range(0, width - amount, width),
                };
                if mask.case_equal(&live) {
                    return Some(rhs.clone());
                }
            }
        }
        None
    }

    fn rewrite_or(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
        if lhs.is_const_zero() && rhs.width() == expr.width() {
            return Some(rhs.clone());
        }
        if lhs.is_const_all_ones() && rhs.is_pure() {
            return Some(Expr::logic(Logic::all_ones(expr.width())));
        }
        if structural::operands_same(lhs, rhs) {
            return Some(lhs.clone());
        }
        if let Some(r) = self.reassociate(expr, lhs, rhs, BinaryOp::Or) {
            return Some(r);
        }
        // ~a | ~b => ~(a & b)
        if let (Op::Unary(UnaryOp::Not), Op::Unary(UnaryOp::Not)) = (lhs.op(), rhs.op()) {
            let and = Expr::binary(
                BinaryOp::And,
                lhs.operands()[0].clone(),
                rhs.operands()[0].clone(),
                *expr.sort(),
            );
            return Some(Expr::not(and));
        }
        if self.cpp {
            if let Some(r) = bitop::simplify(expr, 0, &mut self.stats) {
                return Some(r);
            }
        }
        None
    }

    fn rewrite_xor(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
        if lhs.is_const_zero() && rhs.width() == expr.width() {
            return Some(rhs.clone());
        }
        if lhs.is_const_all_ones() && rhs.width() == expr.width() {
            return Some(Expr::not(rhs.clone()));
        }
        if structural::operands_same(lhs, rhs) && lhs.is_pure() {
            return Some(Expr::logic(Logic::zero(expr.width())));
        }
        if let Some(r) = self.reassociate(expr, lhs, rhs, BinaryOp::Xor) {
            return Some(r);
        }
        if self.cpp {
            if let Some(r) = bitop::simplify(expr, 0, &mut self.stats) {
                return Some(r);
            }
        }
        None
    }

    fn rewrite_shift(
        &mut self,
        expr: &Expr,
        lhs: &Expr,
        rhs: &Expr,
        op: BinaryOp,
    ) -> Option<Expr> {
        let width = expr.width();
        // shift of a zero operand
        if lhs.is_const_zero() && rhs.is_pure() {
            return Some(Expr::logic(Logic::zero(width)));
        }
        if let Some(amount) = rhs.as_logic().and_then(Logic::value_u64) {
            if amount == 0 {
                return Some(lhs.clone());
            }
            // a shift of everything out zeroes a pure operand (arithmetic
            // right shift keeps replicating the sign instead)
            if amount as usize >= width && op != BinaryOp::ShiftRSigned && lhs.is_pure() {
                return Some(Expr::logic(Logic::zero(width)));
            }
            // chained same-direction shifts combine additively
            if let Op::Binary(inner) = lhs.op() {
                if *inner == op {
                    if let Some(inner_amount) =
                        lhs.operands()[1].as_logic().and_then(Logic::value_u64)
                    {
                        return Some(Expr::binary(
                            op,
                            lhs.operands()[0].clone(),
                            Expr::logic_u64(amount + inner_amount, rhs.width()),
                            *expr.sort(),
                        ));
                    }
                }
                // distribute the shift over a bitwise operator with a
                // constant operand, so the constant side folds next visit
                if inner.is_bitwise()
                    && op != BinaryOp::ShiftRSigned
                    && (lhs.operands()[0].is_const() || lhs.operands()[1].is_const())
                {
                    let a = Expr::binary(
                        op,
                        lhs.operands()[0].clone(),
                        rhs.clone(),
                        *expr.sort(),
                    );
                    let b = Expr::binary(
                        op,
                        lhs.operands()[1].clone(),
                        rhs.clone(),
                        *expr.sort(),
                    );
                    return Some(Expr::binary(*inner, a, b, *expr.sort()));
                }
            }
        }
        None
    }

    fn rewrite_logical(
        &mut self,
        expr: &Expr,
        lhs: &Expr,
        rhs: &Expr,
        op: BinaryOp,
    ) -> Option<Expr> {
        let truth = lhs.as_logic().map(|c| (c.is_nonzero(), c.has_unknown()));
        match (op, truth) {
            (BinaryOp::LogAnd, Some((false, false))) if rhs.is_pure() => {
                return Some(Expr::logic_u64(0, 1));
            }
            (BinaryOp::LogAnd, Some((true, _))) => {
                return Some(reduce_to_bit(rhs));
            }
            (BinaryOp::LogOr, Some((true, _))) if rhs.is_pure() => {
                return Some(Expr::logic_u64(1, 1));
            }
            (BinaryOp::LogOr, Some((false, false))) => {
                return Some(reduce_to_bit(rhs));
            }
            _ => {}
        }
        // logical to bitwise once both operands are single-bit and pure
        if self.do_nconst
            && lhs.width() == 1
            && rhs.width() == 1
            && lhs.is_pure()
            && rhs.is_pure()
        {
            let bitwise = match op {
                BinaryOp::LogAnd => BinaryOp::And,
                _ => BinaryOp::Or,
            };
            return Some(Expr::binary(bitwise, lhs.clone(), rhs.clone(), *expr.sort()));
        }
        None
    }

    fn rewrite_compare(
        &mut self,
        expr: &Expr,
        lhs: &Expr,
        rhs: &Expr,
        op: BinaryOp,
    ) -> Option<Expr> {
        use BinaryOp::*;
        // x == x, x <= x, ... regardless of purity
        if structural::operands_same(lhs, rhs) {
            let value = match op {
                Eq | EqCase | EqWild | Lte | LteSigned | Gte | GteSigned => 1,
                _ => 0,
            };
            return Some(Expr::logic_u64(value, 1));
        }
        // Canonical shape: constant on the left, variable side on the right.
        let c = lhs.as_logic()?;
        let unsigned = !matches!(op, LtSigned | LteSigned | GtSigned | GteSigned);
        if unsigned && !rhs.is_signed() && rhs.is_pure() {
            // comparisons decided by the unsigned value range
            if c.is_zero() {
                match op {
                    Gt => {
                        // 0 > unsigned
                        self.warn_if_enabled(
                            Warn::Unsigned,
                            format!("Comparison is constant zero: {}", expr),
                        );
                        return Some(Expr::logic_u64(0, 1));
                    }
                    Lte => {
                        self.warn_if_enabled(
                            Warn::Unsigned,
                            format!("Comparison is constant one: {}", expr),
                        );
                        return Some(Expr::logic_u64(1, 1));
                    }
                    _ => {}
                }
            }
            if c.is_all_ones() {
                match op {
                    Lt => {
                        // max < x never holds at this width
                        self.warn_if_enabled(
                            Warn::CmpConst,
                            format!("Comparison is constant zero: {}", expr),
                        );
                        return Some(Expr::logic_u64(0, 1));
                    }
                    Gte => {
                        self.warn_if_enabled(
                            Warn::CmpConst,
                            format!("Comparison is constant one: {}", expr),
                        );
                        return Some(Expr::logic_u64(1, 1));
                    }
                    _ => {}
                }
            }
        }
        // single-bit equality against a constant collapses to the operand
        // or its negation
        if self.do_nconst && rhs.width() == 1 && !c.has_unknown() {
            let negated = match (op, c.is_one()) {
                (Eq, true) | (Neq, false) => false,
                (Eq, false) | (Neq, true) => true,
                _ => return None,
            };
            return Some(if negated {
                Expr::not(rhs.clone())
            } else {
                rhs.clone()
            });
        }
        None
    }

    fn rewrite_concat(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
        // {v[a+w..], v[b..a+w-1]} => v[b..]
        if let (Some((va, lsb_a, wa)), Some((vb, lsb_b, wb))) = (
            structural::const_sel_of_var(lhs),
            structural::const_sel_of_var(rhs),
        ) {
            if va == vb && lsb_b + wb == lsb_a {
                return Some(Expr::sel_const(lhs.operands()[0].clone(), lsb_b, wa + wb));
            }
        }
        // {x, x} => {2{x}}, and replicate counts grow by one
        if structural::operands_same(lhs, rhs) && lhs.is_pure() {
            return Some(Expr::replicate(rhs.clone(), 2));
        }
        if let Op::Binary(BinaryOp::Replicate) = lhs.op() {
            if structural::operands_same(&lhs.operands()[0], rhs) && rhs.is_pure() {
                if let Some(count) = lhs.operands()[1].as_logic().and_then(Logic::value_u64) {
                    return Some(Expr::replicate(rhs.clone(), count as usize + 1));
                }
            }
        }
        if let Op::Binary(BinaryOp::Replicate) = rhs.op() {
            if structural::operands_same(&rhs.operands()[0], lhs) && lhs.is_pure() {
                if let Some(count) = rhs.operands()[1].as_logic().and_then(Logic::value_u64) {
                    return Some(Expr::replicate(lhs.clone(), count as usize + 1));
                }
            }
        }
        // {a1 OP b1, a2 OP b2} => {a1,a2} OP {b1,b2} when both halves merge
        if self.do_nconst {
            if let (Op::Binary(la), Op::Binary(ra)) = (lhs.op(), rhs.op()) {
                if la == ra && la.is_bitwise() {
                    let depth = self.env.concat_merge_depth;
                    let (a1, b1) = (&lhs.operands()[0], &lhs.operands()[1]);
                    let (a2, b2) = (&rhs.operands()[0], &rhs.operands()[1]);
                    if structural::concat_mergeable(a1, a2, depth)
                        && structural::concat_mergeable(b1, b2, depth)
                    {
                        let a = structural::concat_merge(a1, a2, depth)?;
                        let b = structural::concat_merge(b1, b2, depth)?;
                        self.stats.concats_merged += 1;
                        return Some(Expr::binary(*la, a, b, *expr.sort()));
                    }
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Conditionals

    fn rewrite_cond(&mut self, expr: &Expr) -> Option<Expr> {
        let cond = &expr.operands()[0];
        let then = &expr.operands()[1];
        let else_ = &expr.operands()[2];
        if let Some(c) = cond.as_logic() {
            if c.is_nonzero() {
                return Some(then.clone());
            }
            if !c.has_unknown() {
                return Some(else_.clone());
            }
            // X condition: both branches constant was already folded with a
            // bitwise merge; with live branches the choice stays visible.
        }
        if structural::operands_same(then, else_) {
            return Some(then.clone());
        }
        // cond(!c, t, e) => cond(c, e, t)
        if let Op::Unary(UnaryOp::Not | UnaryOp::LogNot) = cond.op() {
            if cond.width() == 1 {
                return Some(Expr::new(
                    Op::Cond,
                    vec![
                        cond.operands()[0].clone(),
                        else_.clone(),
                        then.clone(),
                    ],
                    *expr.sort(),
                ));
            }
        }
        // single-bit conditionals with a constant arm turn into AND/OR
        if self.do_nconst && expr.width() == 1 && cond.width() == 1 {
            if then.is_const_one() {
                return Some(Expr::binary(
                    BinaryOp::Or,
                    cond.clone(),
                    else_.clone(),
                    *expr.sort(),
                ));
            }
            if else_.is_const_zero() {
                return Some(Expr::binary(
                    BinaryOp::And,
                    cond.clone(),
                    then.clone(),
                    *expr.sort(),
                ));
            }
            if else_.is_const_one() {
                return Some(Expr::binary(
                    BinaryOp::Or,
                    Expr::not(cond.clone()),
                    then.clone(),
                    *expr.sort(),
                ));
            }
            if then.is_const_zero() {
                return Some(Expr::binary(
                    BinaryOp::And,
                    Expr::not(cond.clone()),
                    else_.clone(),
                    *expr.sort(),
                ));
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Selects

    fn rewrite_sel(&mut self, expr: &Expr) -> Option<Expr> {
        let from = &expr.operands()[0];
        let lsb_expr = &expr.operands()[1];
        let width = expr.width();
        let lsb = lsb_expr.as_logic().and_then(Logic::value_u64);

        if let Some(lsb) = lsb {
            let lsb = lsb as usize;
            // selecting the full width is a no-op
            if lsb == 0 && width == from.width() {
                return Some(from.clone());
            }
            if lsb + width > from.width() && !from.is_const() {
                self.warn_if_enabled(
                    Warn::SelRange,
                    format!(
                        "Select range [{}:{}] exceeds width {}: {}",
                        lsb + width - 1,
                        lsb,
                        from.width(),
                        expr
                    ),
                );
                if self.do_nconst && from.is_pure() {
                    return Some(Expr::logic(Logic::all_x(width)));
                }
                return None;
            }
            match from.op() {
                // sel(sel(x, a, w1), b, w2) => sel(x, a+b, w2)
                Op::Sel => {
                    if let Some(inner_lsb) =
                        from.operands()[1].as_logic().and_then(Logic::value_u64)
                    {
                        return Some(Expr::sel_const(
                            from.operands()[0].clone(),
                            inner_lsb as usize + lsb,
                            width,
                        ));
                    }
                }
                Op::Binary(BinaryOp::Concat) => {
                    let upper = &from.operands()[0];
                    let lower = &from.operands()[1];
                    let lw = lower.width();
                    if lsb >= lw {
                        // the discarded half is the lower one
                        if lower.is_pure() {
                            return Some(Expr::sel_const(upper.clone(), lsb - lw, width));
                        }
                    } else if lsb + width <= lw {
                        if upper.is_pure() {
                            return Some(Expr::sel_const(lower.clone(), lsb, width));
                        }
                    } else {
                        // split across the boundary
                        let low_w = lw - lsb;
                        return Some(Expr::concat(
                            Expr::sel_const(upper.clone(), 0, width - low_w),
                            Expr::sel_const(lower.clone(), lsb, low_w),
                        ));
                    }
                }
                Op::Binary(BinaryOp::Replicate) => {
                    let item = &from.operands()[0];
                    let iw = item.width();
                    if iw > 0 && (lsb % iw) + width <= iw {
                        return Some(Expr::sel_const(item.clone(), lsb % iw, width));
                    }
                }
                // discarding top bits commutes with bit-independent operators
                Op::Binary(inner)
                    if inner.is_bitwise()
                        && (from.operands()[0].is_const() || from.operands()[1].is_const()) =>
                {
                    let a = Expr::sel_const(from.operands()[0].clone(), lsb, width);
                    let b = Expr::sel_const(from.operands()[1].clone(), lsb, width);
                    return Some(Expr::binary(*inner, a, b, *expr.sort()));
                }
                Op::Binary(inner @ (BinaryOp::Add | BinaryOp::Sub))
                    if lsb == 0
                        && (from.operands()[0].is_const() || from.operands()[1].is_const()) =>
                {
                    let a = Expr::sel_const(from.operands()[0].clone(), 0, width);
                    let b = Expr::sel_const(from.operands()[1].clone(), 0, width);
                    return Some(Expr::binary(*inner, a, b, *expr.sort()));
                }
                Op::Unary(UnaryOp::Not) => {
                    let a = Expr::sel_const(from.operands()[0].clone(), lsb, width);
                    return Some(Expr::not(a));
                }
                Op::Unary(UnaryOp::Extend) => {
                    let x = &from.operands()[0];
                    if lsb + width <= x.width() {
                        return Some(Expr::sel_const(x.clone(), lsb, width));
                    }
                    if lsb >= x.width() {
                        return Some(Expr::logic(Logic::zero(width)));
                    }
                }
                _ => {}
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Opaque calls

    fn rewrite_call(&mut self, expr: &Expr) -> Option<Expr> {
        if !self.params {
            return None;
        }
        let oracle = self.oracle?;
        let value = oracle.evaluate(expr)?;
        let value = if value.bits() >= expr.width() {
            value.trunc(expr.width())
        } else {
            value.extend(expr.width())
        };
        self.stats.consts_folded += 1;
        Some(Expr::logic(value))
    }
}

/// Truthiness of an arbitrary-width operand as a single bit.
fn reduce_to_bit(expr: &Expr) -> Expr {
    if expr.width() == 1 {
        expr.clone()
    } else {
        Expr::red_or(expr.clone())
    }
}

/// Over-approximation of the bits that can ever be one in `expr`.
fn possible_ones(expr: &Expr, width: usize) -> Logic {
    match expr.op() {
        Op::Const(c) => c
            .as_logic()
            .map(|v| {
                let v = if v.bits() >= width {
                    v.trunc(width)
                } else {
                    v.extend(width)
                };
                v.maybe_ones()
            })
            .unwrap_or_else(|| Logic::all_ones(width)),
        Op::Binary(BinaryOp::ShiftL) => match expr.operands()[1].as_logic().and_then(Logic::value_u64)
        {
            Some(n) if (n as usize) < width => {
                Logic::ones_range(n as usize, width - n as usize, width)
            }
            Some(_) => Logic::zero(width),
            None => Logic::all_ones(width),
        },
        Op::Binary(BinaryOp::ShiftR) => match expr.operands()[1].as_logic().and_then(Logic::value_u64)
        {
            Some(n) if (n as usize) < width => Logic::ones_range(0, width - n as usize, width),
            Some(_) => Logic::zero(width),
            None => Logic::all_ones(width),
        },
        _ => Logic::all_ones(width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Call, Sort, Variable};

    fn var(name: &str, width: usize) -> Expr {
        Expr::variable(Variable::new(name, Sort::new(width)))
    }

    fn impure_call(width: usize) -> Expr {
        Expr::call(Call::new("side_effect", false), vec![], Sort::new(width))
    }

    fn fold(expr: &mut Expr, mode: Mode) -> Folder<'static> {
        let mut folder = Folder::new(mode, Environment::default(), None);
        folder.fold_expr(expr);
        folder
    }

    #[test]
    fn and_with_zero_needs_a_pure_operand() {
        let mut e = Expr::and(var("x", 8), Expr::logic_u64(0, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(e.is_const_zero());

        let mut e = Expr::and(impure_call(8), Expr::logic_u64(0, 8)).unwrap();
        let before = e.clone();
        fold(&mut e, Mode::VerilogNoWarn);
        // the call must still run; only the operand order changed
        assert_eq!(e.operands()[1], before.operands()[0]);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::And)));
    }

    #[test]
    fn and_with_all_ones_is_identity() {
        let mut e = Expr::and(var("x", 8), Expr::logic_u64(0xff, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("x"));
    }

    #[test]
    fn constants_reassociate_through_a_chain() {
        // 3 + (x + 4) => 7 + x
        let inner = Expr::add(var("x", 8), Expr::logic_u64(4, 8)).unwrap();
        let mut e = Expr::add(Expr::logic_u64(3, 8), inner).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.operands()[0].as_logic().unwrap().value_u64(), Some(7));
        assert!(e.operands()[1].as_var().is_some());
    }

    #[test]
    fn subtract_of_constant_becomes_add() {
        let mut e = Expr::sub(var("x", 8), Expr::logic_u64(1, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::Add)));
        assert_eq!(e.operands()[0].as_logic().unwrap().value_u64(), Some(0xff));
    }

    #[test]
    fn multiply_by_power_of_two_becomes_shift() {
        let mut e = Expr::mul(var("x", 8), Expr::logic_u64(8, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::ShiftL)));
        assert_eq!(e.operands()[1].as_logic().unwrap().value_u64(), Some(3));
        assert_eq!(e.width(), 8);
    }

    #[test]
    fn divide_and_modulo_by_power_of_two() {
        let mut e = Expr::div(var("x", 8), Expr::logic_u64(4, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::ShiftR)));

        let mut e = Expr::modulo(var("x", 8), Expr::logic_u64(4, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::And)));
        assert_eq!(e.operands()[0].as_logic().unwrap().value_u64(), Some(3));
    }

    #[test]
    fn equal_operands_compare_equal_even_when_impure() {
        let a = Expr::and(Expr::logic_u64(1, 8), var("c", 8)).unwrap();
        let mut e = Expr::eq(a.clone(), a).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(e.is_const_one());
        assert_eq!(e.width(), 1);
    }

    #[test]
    fn comparison_constant_moves_left() {
        let mut e =
            Expr::compare(BinaryOp::Lt, var("x", 8), Expr::logic_u64(5, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::Gt)));
        assert!(e.operands()[0].is_const());
    }

    #[test]
    fn unsigned_below_zero_warns_and_folds() {
        let mut e =
            Expr::compare(BinaryOp::Lt, var("x", 8), Expr::logic_u64(0, 8)).unwrap();
        let folder = fold(&mut e, Mode::VerilogWarn);
        assert!(e.is_const_zero());
        assert_eq!(folder.diags.items()[0].code(), Warn::Unsigned);
    }

    #[test]
    fn double_negation_cancels() {
        let mut e = Expr::not(Expr::not(var("x", 8)));
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("x"));
    }

    #[test]
    fn negated_comparison_flips() {
        let cmp = Expr::eq(var("a", 8), var("b", 8)).unwrap();
        let mut e = Expr::not(cmp);
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::Neq)));
    }

    #[test]
    fn or_of_nots_becomes_not_of_and() {
        let mut e = Expr::or(Expr::not(var("a", 8)), Expr::not(var("b", 8))).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Unary(UnaryOp::Not)));
        assert!(matches!(e.operands()[0].op(), Op::Binary(BinaryOp::And)));
    }

    #[test]
    fn select_of_select_composes() {
        let inner = Expr::sel_const(var("x", 32), 3, 8);
        let mut e = Expr::sel_const(inner, 2, 2);
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Sel));
        assert!(e.operands()[0].as_var().is_some());
        assert_eq!(e.operands()[1].as_logic().unwrap().value_u64(), Some(5));
        assert_eq!(e.width(), 2);
    }

    #[test]
    fn full_width_select_disappears() {
        let mut e = Expr::sel_const(var("x", 8), 0, 8);
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(e.as_var().is_some());
    }

    #[test]
    fn select_out_of_range_warns_and_poisons() {
        let mut e = Expr::sel_const(var("x", 8), 6, 4);
        let folder = fold(&mut e, Mode::VerilogWarn);
        assert_eq!(folder.diags.items()[0].code(), Warn::SelRange);
        assert!(e.as_logic().map_or(false, Logic::has_unknown));
    }

    #[test]
    fn select_of_concat_picks_a_side() {
        let e0 = Expr::concat(var("hi", 8), var("lo", 8));
        let mut e = Expr::sel_const(e0, 10, 4);
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.operands()[0].as_var().map(Variable::name), Some("hi"));
        assert_eq!(e.operands()[1].as_logic().unwrap().value_u64(), Some(2));
    }

    #[test]
    fn adjacent_selects_of_one_variable_concatenate_back() {
        let v = var("v", 8);
        let mut e = Expr::concat(
            Expr::sel_const(v.clone(), 4, 4),
            Expr::sel_const(v, 0, 4),
        );
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("v"));
    }

    #[test]
    fn shift_by_zero_and_chained_shifts() {
        let mut e = Expr::shift_l(var("x", 8), Expr::logic_u64(0, 8));
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(e.as_var().is_some());

        let inner = Expr::shift_l(var("x", 8), Expr::logic_u64(2, 8));
        let mut e = Expr::shift_l(inner, Expr::logic_u64(3, 8));
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.operands()[1].as_logic().unwrap().value_u64(), Some(5));
    }

    #[test]
    fn oversized_shift_zeroes_a_pure_operand() {
        let mut e = Expr::shift_r(var("x", 8), Expr::logic_u64(8, 8));
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(e.is_const_zero());
    }

    #[test]
    fn conditional_with_equal_branches_collapses() {
        let mut e = Expr::cond(var("c", 1), var("x", 8), var("x", 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("x"));
    }

    #[test]
    fn conditional_with_known_condition_picks_a_branch() {
        let mut e = Expr::cond(Expr::logic_u64(1, 1), var("a", 8), var("b", 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("a"));

        let mut e = Expr::cond(Expr::logic_u64(0, 1), var("a", 8), var("b", 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("b"));
    }

    #[test]
    fn single_bit_conditional_becomes_bitwise() {
        let mut e = Expr::cond(var("c", 1), var("t", 1), Expr::logic_u64(0, 1)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::And)));
    }

    #[test]
    fn logical_ops_collapse_to_bitwise_on_single_bits() {
        let mut e = Expr::log_and(var("a", 1), var("b", 1));
        fold(&mut e, Mode::VerilogNoWarn);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::And)));
    }

    #[test]
    fn liveness_only_keeps_logical_shape() {
        let mut e = Expr::log_and(var("a", 1), var("b", 1));
        fold(&mut e, Mode::LivenessOnly);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::LogAnd)));
        // constants still push through
        let mut e = Expr::add(Expr::logic_u64(1, 8), Expr::logic_u64(2, 8)).unwrap();
        fold(&mut e, Mode::LivenessOnly);
        assert_eq!(e.as_logic().unwrap().value_u64(), Some(3));
    }

    #[test]
    fn liveness_only_keeps_variable_references() {
        // `x | ~0` and `x * 8` drop or move references; both stay put
        let mut e = Expr::or(var("x", 8), Expr::logic_u64(0xff, 8)).unwrap();
        fold(&mut e, Mode::LivenessOnly);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::Or)));
        assert!(e.operands()[0].as_var().is_some());

        let mut e = Expr::mul(var("x", 8), Expr::logic_u64(8, 8)).unwrap();
        fold(&mut e, Mode::LivenessOnly);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::Mul)));
    }

    #[test]
    fn select_never_drops_an_impure_concat_half() {
        let from = Expr::concat(var("hi", 4), impure_call(4));
        let mut e = Expr::sel_const(from, 4, 4);
        fold(&mut e, Mode::VerilogNoWarn);
        // the call must still run, so the select stays on the concatenation
        assert!(matches!(e.op(), Op::Sel));
        assert!(!e.is_pure());

        let from = Expr::concat(var("hi", 4), var("lo", 4));
        let mut e = Expr::sel_const(from, 4, 4);
        fold(&mut e, Mode::VerilogNoWarn);
        assert_eq!(e.as_var().map(Variable::name), Some("hi"));
    }

    #[test]
    fn backend_mode_reduces_bit_trees() {
        let v = var("v", 8);
        let mut e = Expr::and(
            Expr::sel_const(v.clone(), 0, 1),
            Expr::sel_const(v, 1, 1),
        )
        .unwrap();
        let folder = fold(&mut e, Mode::Backend);
        assert!(matches!(e.op(), Op::Binary(BinaryOp::Eq)));
        assert_eq!(folder.stats.bitop_trees, 1);
    }

    #[test]
    fn backend_masked_reduction_xor_becomes_a_bit_read() {
        let mut e = Expr::red_xor(
            Expr::and(Expr::logic_u64(8, 8), var("v", 8)).unwrap(),
        );
        let folder = fold(&mut e, Mode::Backend);
        assert!(matches!(e.op(), Op::Sel));
        assert_eq!(e.operands()[1].as_logic().unwrap().value_u64(), Some(3));
        assert_eq!(folder.stats.bitop_trees, 1);
    }

    #[test]
    fn folding_keeps_the_declared_sort() {
        let mut e = Expr::add(Expr::logic_u64(200, 8), Expr::logic_u64(100, 8)).unwrap();
        fold(&mut e, Mode::VerilogNoWarn);
        // 300 wraps at the declared width
        assert_eq!(e.width(), 8);
        assert_eq!(e.as_logic().unwrap().value_u64(), Some(44));
    }

    #[test]
    fn oracle_resolves_calls_in_parameter_mode() {
        struct Fixed;
        impl Oracle for Fixed {
            fn evaluate(&self, _call: &Expr) -> Option<Logic> {
                Some(Logic::new(42, 8))
            }
        }
        let call = Expr::call(Call::new("f", true), vec![], Sort::new(8));
        let mut e = Expr::add(call, Expr::logic_u64(1, 8)).unwrap();
        let oracle = Fixed;
        let mut folder = Folder::new(Mode::Params, Environment::default(), Some(&oracle));
        folder.fold_expr(&mut e);
        assert_eq!(e.as_logic().unwrap().value_u64(), Some(43));
    }
}
