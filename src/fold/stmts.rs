//! Statement-level folding: constant conditions, assignment splitting and
//! merging, display substitution and jump cleanup.
//!
//! Expression rules run on every expression reachable from a statement; the
//! statement rules then act on the folded shapes. All structural deletions
//! are gated on the non-constant-rewrite flag, so a liveness-only pass
//! leaves the statement skeleton untouched.

use crate::error::ErrorKind;
use crate::expr::{Expr, Op};
use crate::fold::engine::Folder;
use crate::fold::structural;
use crate::ir::{AssignKind, DisplayKind, Label, Module, Stmt};
use std::collections::HashSet;

impl<'a> Folder<'a> {
    /// Folds every statement of one module. A hard error (circular
    /// continuous assignment) is recorded on the folder and reported by the
    /// caller afterwards; the offending statement stays in place and the rest
    /// of the module keeps folding, so the tree remains well-formed.
    pub fn fold_module(&mut self, module: &mut Module) {
        let mut stmts = std::mem::take(module.stmts_mut());
        self.fold_stmts(&mut stmts, module);
        if self.failure.is_none() && self.expensive && self.do_nconst {
            let mut used = HashSet::new();
            collect_jump_uses(&stmts, &mut used);
            self.stats.jumps_inlined += inline_unused_jump_blocks(&mut stmts, &used);
        }
        *module.stmts_mut() = stmts;
    }

    fn fold_stmts(&mut self, stmts: &mut Vec<Stmt>, module: &mut Module) {
        let mut out: Vec<Stmt> = Vec::with_capacity(stmts.len());
        for stmt in stmts.drain(..) {
            for folded in self.fold_stmt(stmt, module) {
                self.append_merged(&mut out, folded, module);
            }
        }
        // nothing runs after an unconditional jump
        if self.do_nconst {
            if let Some(pos) = out.iter().position(|s| matches!(s, Stmt::JumpGo { .. })) {
                if pos + 1 < out.len() {
                    self.stats.dead_stmts += out.len() - pos - 1;
                    out.truncate(pos + 1);
                }
            }
        }
        *stmts = out;
    }

    fn fold_stmt(&mut self, stmt: Stmt, module: &mut Module) -> Vec<Stmt> {
        match stmt {
            Stmt::Assign { kind, lhs, rhs } => self.fold_assign(kind, lhs, rhs, module),
            Stmt::If {
                mut cond,
                mut then_stmts,
                mut else_stmts,
            } => {
                self.fold_expr(&mut cond);
                self.fold_stmts(&mut then_stmts, module);
                self.fold_stmts(&mut else_stmts, module);
                self.fold_if(cond, then_stmts, else_stmts)
            }
            Stmt::While { mut cond, mut body } => {
                self.fold_expr(&mut cond);
                self.fold_stmts(&mut body, module);
                if self.do_nconst {
                    if let Some(c) = cond.as_logic() {
                        let never = if self.do_v {
                            !c.is_nonzero() && !c.has_unknown()
                        } else {
                            !c.is_nonzero()
                        };
                        if never {
                            self.stats.dead_stmts += 1;
                            return vec![];
                        }
                    }
                }
                vec![Stmt::While { cond, body }]
            }
            Stmt::Block(mut body) => {
                self.fold_stmts(&mut body, module);
                if body.is_empty() && self.do_nconst {
                    vec![]
                } else {
                    vec![Stmt::Block(body)]
                }
            }
            Stmt::Display {
                kind,
                format,
                mut args,
            } => {
                for arg in &mut args {
                    self.fold_expr(arg);
                }
                if self.do_nconst {
                    let (format, args) = self.substitute_display(&format, args);
                    vec![Stmt::Display { kind, format, args }]
                } else {
                    vec![Stmt::Display { kind, format, args }]
                }
            }
            Stmt::JumpBlock { label, mut body } => {
                self.fold_stmts(&mut body, module);
                if body.is_empty() && self.do_nconst {
                    vec![]
                } else {
                    vec![Stmt::JumpBlock { label, body }]
                }
            }
            Stmt::JumpGo { label } => vec![Stmt::JumpGo { label }],
            Stmt::Always { mut sens, mut body } => {
                for item in &mut sens {
                    self.fold_expr(&mut item.expr);
                }
                self.fold_stmts(&mut body, module);
                if body.is_empty() && self.do_nconst {
                    self.stats.dead_stmts += 1;
                    return vec![];
                }
                if self.expensive {
                    let before = sens.len();
                    sens.sort_by_key(|item| (item.edge, item.expr.to_string()));
                    sens.dedup();
                    self.stats.sens_deduped += before - sens.len();
                }
                vec![Stmt::Always { sens, body }]
            }
        }
    }

    fn fold_assign(
        &mut self,
        kind: AssignKind,
        mut lhs: Expr,
        mut rhs: Expr,
        module: &mut Module,
    ) -> Vec<Stmt> {
        self.fold_expr(&mut rhs);
        self.fold_lvalue(&mut lhs);

        if let (Some(l), Some(r)) = (lhs.as_var(), rhs.as_var()) {
            if l == r {
                match kind {
                    AssignKind::Continuous => {
                        // recorded once; the statement stays in place
                        if self.failure.is_none() {
                            self.failure = Some(
                                ErrorKind::CircularLogic(format!("{}", lhs)).into(),
                            );
                        }
                    }
                    AssignKind::Blocking if self.do_nconst => {
                        self.stats.dead_stmts += 1;
                        return vec![];
                    }
                    // a non-blocking self-assignment is scheduled, keep it
                    _ => {}
                }
            }
        }

        if self.do_nconst {
            if let Op::Binary(crate::expr::BinaryOp::Concat) = lhs.op() {
                return self.split_concat_assign(kind, &lhs, rhs, module);
            }
        }
        vec![Stmt::Assign { kind, lhs, rhs }]
    }

    /// Only index positions of an lvalue are expressions to fold; the
    /// written variable itself must stay in place.
    fn fold_lvalue(&mut self, lhs: &mut Expr) {
        match lhs.op() {
            Op::Sel => self.fold_expr(&mut lhs.operands_mut()[1]),
            Op::Binary(crate::expr::BinaryOp::Concat) => {
                for part in lhs.operands_mut() {
                    self.fold_lvalue(part);
                }
            }
            _ => {}
        }
    }

    /// `{a, b} = rhs` writes each part from a slice of the right-hand side.
    /// When the right-hand side has side effects or may read one of the
    /// written variables, it is captured in a temporary first.
    fn split_concat_assign(
        &mut self,
        kind: AssignKind,
        lhs: &Expr,
        rhs: Expr,
        module: &mut Module,
    ) -> Vec<Stmt> {
        let mut parts = Vec::new();
        lvalue_parts(lhs, 0, &mut parts);

        let depth_limit = self.env.var_scan_depth;
        let aliases = parts.iter().any(|(part, _)| {
            part.variables()
                .iter()
                .any(|v| !structural::var_not_referenced(&rhs, v.name(), 0, depth_limit))
        });

        let mut out = Vec::with_capacity(parts.len() + 1);
        let source = if aliases || !rhs.is_pure() {
            let temp = module.fresh_temp(rhs.width());
            let temp_ref = Expr::variable(temp);
            out.push(Stmt::Assign {
                kind: AssignKind::Blocking,
                lhs: temp_ref.clone(),
                rhs,
            });
            temp_ref
        } else {
            rhs
        };

        for (part, lsb) in parts {
            let width = part.width();
            let mut slice = Expr::sel_const(source.clone(), lsb, width);
            self.fold_expr(&mut slice);
            out.push(Stmt::Assign {
                kind,
                lhs: part,
                rhs: slice,
            });
        }
        self.stats.assigns_split += 1;
        out
    }

    fn fold_if(&mut self, cond: Expr, then_stmts: Vec<Stmt>, else_stmts: Vec<Stmt>) -> Vec<Stmt> {
        if self.do_nconst {
            if let Some(c) = cond.as_logic() {
                if c.is_nonzero() {
                    self.stats.dead_stmts += 1;
                    return then_stmts;
                }
                // an unknown condition is only decidable after X-lowering,
                // where it reads as false
                if !c.has_unknown() || !self.do_v {
                    self.stats.dead_stmts += 1;
                    return else_stmts;
                }
            }
        }
        // if (!c) A else B => if (c) B else A
        if self.do_nconst {
            if let Op::Unary(crate::expr::UnaryOp::Not | crate::expr::UnaryOp::LogNot) =
                cond.op()
            {
                if cond.width() == 1 && !else_stmts.is_empty() {
                    let inner = cond.operands()[0].clone();
                    return self.fold_if(inner, else_stmts, then_stmts);
                }
            }
        }
        if then_stmts.is_empty() && self.do_nconst {
            if else_stmts.is_empty() {
                if cond.is_pure() {
                    self.stats.dead_stmts += 1;
                    return vec![];
                }
            } else {
                // if (c) {} else B => if (!c) B
                let negated = if cond.width() == 1 {
                    Expr::not(cond)
                } else {
                    Expr::log_not(cond)
                };
                return vec![Stmt::If {
                    cond: negated,
                    then_stmts: else_stmts,
                    else_stmts: vec![],
                }];
            }
        }
        vec![Stmt::If {
            cond,
            then_stmts,
            else_stmts,
        }]
    }

    /// Pushes `stmt` onto `out`, merging it into the previous statement when
    /// the pair is an adjacent-bitfield assignment or back-to-back displays.
    fn append_merged(&mut self, out: &mut Vec<Stmt>, stmt: Stmt, module: &Module) {
        if self.do_nconst {
            if let Some(prev) = out.last_mut() {
                if let Some(merged) = self.try_merge_assigns(prev, &stmt, module) {
                    *prev = merged;
                    self.stats.assigns_merged += 1;
                    return;
                }
                if let Some(merged) = self.try_merge_displays(prev, &stmt) {
                    *prev = merged;
                    self.stats.displays_merged += 1;
                    return;
                }
            }
        }
        out.push(stmt);
    }

    /// `v[a +: w1] = r1; v[a+w1 +: w2] = r2` => `v[a +: w1+w2] = {r2, r1}`.
    /// Neither right-hand side may provably read `v`, since merging moves the
    /// second evaluation before the first write.
    fn try_merge_assigns(&mut self, prev: &Stmt, next: &Stmt, module: &Module) -> Option<Stmt> {
        let (k1, l1, r1) = as_assign(prev)?;
        let (k2, l2, r2) = as_assign(next)?;
        if k1 != k2 {
            return None;
        }
        let (v1, lsb1, w1) = structural::const_sel_of_var(l1)?;
        let (v2, lsb2, w2) = structural::const_sel_of_var(l2)?;
        if v1 != v2 || lsb2 != lsb1 + w1 {
            return None;
        }
        if module.decl(v1).map_or(true, |d| d.split_access()) {
            return None;
        }
        let depth = self.env.var_scan_depth;
        if !structural::var_not_referenced(r1, v1, 0, depth)
            || !structural::var_not_referenced(r2, v1, 0, depth)
        {
            return None;
        }
        let source = l1.operands()[0].clone();
        let mut rhs = Expr::concat(r2.clone(), r1.clone());
        self.fold_expr(&mut rhs);
        let lhs = if lsb1 == 0 && w1 + w2 == source.width() {
            source
        } else {
            Expr::sel_const(source, lsb1, w1 + w2)
        };
        Some(Stmt::Assign { kind: k1, lhs, rhs })
    }

    fn try_merge_displays(&mut self, prev: &Stmt, next: &Stmt) -> Option<Stmt> {
        let limit = self.env.display_merge_limit;
        match (prev, next) {
            (
                Stmt::Display {
                    kind: DisplayKind::Display,
                    format: f1,
                    args: a1,
                },
                Stmt::Display {
                    kind: DisplayKind::Display,
                    format: f2,
                    args: a2,
                },
            ) if f1.len() + f2.len() + 1 <= limit => {
                let mut format = String::with_capacity(f1.len() + f2.len() + 1);
                format.push_str(f1);
                format.push('\n');
                format.push_str(f2);
                let mut args = a1.clone();
                args.extend(a2.iter().cloned());
                Some(Stmt::Display {
                    kind: DisplayKind::Display,
                    format,
                    args,
                })
            }
            _ => None,
        }
    }

    /// Inlines constant arguments into the format string. Non-constant
    /// arguments and their directives stay untouched.
    fn substitute_display(&mut self, format: &str, args: Vec<Expr>) -> (String, Vec<Expr>) {
        let mut out = String::with_capacity(format.len());
        let mut remaining = Vec::new();
        let mut args = args.into_iter();
        let mut chars = format.chars();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                None => out.push('%'),
                Some('%') => out.push_str("%%"),
                // directives that take no argument
                Some('m') => out.push_str("%m"),
                Some(code @ ('b' | 'o' | 'd' | 'h' | 'x' | 'c' | 's')) => match args.next() {
                    Some(arg) => {
                        if let Some(value) = arg.as_logic() {
                            out.push_str(&value.format_with(code));
                            self.stats.display_substs += 1;
                        } else if let (true, Some(text)) = (code == 's', arg.as_string()) {
                            out.push_str(text);
                            self.stats.display_substs += 1;
                        } else {
                            out.push('%');
                            out.push(code);
                            remaining.push(arg);
                        }
                    }
                    None => {
                        out.push('%');
                        out.push(code);
                    }
                },
                Some(other) => {
                    out.push('%');
                    out.push(other);
                    if other.is_ascii_alphabetic() {
                        if let Some(arg) = args.next() {
                            remaining.push(arg);
                        }
                    }
                }
            }
        }
        remaining.extend(args);
        (out, remaining)
    }
}

fn as_assign(stmt: &Stmt) -> Option<(AssignKind, &Expr, &Expr)> {
    match stmt {
        Stmt::Assign { kind, lhs, rhs } => Some((*kind, lhs, rhs)),
        _ => None,
    }
}

/// Flattens a concatenation lvalue into `(part, lsb offset)` pairs. The
/// right operand of a concatenation holds the low bits.
fn lvalue_parts(lhs: &Expr, base: usize, out: &mut Vec<(Expr, usize)>) {
    if let Op::Binary(crate::expr::BinaryOp::Concat) = lhs.op() {
        let upper = &lhs.operands()[0];
        let lower = &lhs.operands()[1];
        lvalue_parts(lower, base, out);
        lvalue_parts(upper, base + lower.width(), out);
    } else {
        out.push((lhs.clone(), base));
    }
}

fn collect_jump_uses(stmts: &[Stmt], used: &mut HashSet<Label>) {
    for stmt in stmts {
        match stmt {
            Stmt::JumpGo { label } => {
                used.insert(*label);
            }
            Stmt::If {
                then_stmts,
                else_stmts,
                ..
            } => {
                collect_jump_uses(then_stmts, used);
                collect_jump_uses(else_stmts, used);
            }
            Stmt::While { body, .. }
            | Stmt::Block(body)
            | Stmt::JumpBlock { body, .. }
            | Stmt::Always { body, .. } => collect_jump_uses(body, used),
            _ => {}
        }
    }
}

/// A jump block nobody jumps to is plain straight-line code. Returns the
/// number of blocks inlined.
fn inline_unused_jump_blocks(stmts: &mut Vec<Stmt>, used: &HashSet<Label>) -> usize {
    let mut inlined = 0;
    let mut i = 0;
    while i < stmts.len() {
        let replace = match &stmts[i] {
            Stmt::JumpBlock { label, .. } if !used.contains(label) => true,
            _ => false,
        };
        if replace {
            if let Stmt::JumpBlock { mut body, .. } = stmts.remove(i) {
                inline_unused_jump_blocks(&mut body, used);
                let n = body.len();
                stmts.splice(i..i, body);
                i += n;
                inlined += 1;
                continue;
            }
        }
        match &mut stmts[i] {
            Stmt::If {
                then_stmts,
                else_stmts,
                ..
            } => {
                inlined += inline_unused_jump_blocks(then_stmts, used);
                inlined += inline_unused_jump_blocks(else_stmts, used);
            }
            Stmt::While { body, .. }
            | Stmt::Block(body)
            | Stmt::JumpBlock { body, .. }
            | Stmt::Always { body, .. } => {
                inlined += inline_unused_jump_blocks(body, used);
            }
            _ => {}
        }
        i += 1;
    }
    inlined
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::expr::{Expr, Sort, Variable};
    use crate::fold::{
        simplify_unit, simplify_unit_expensive, simplify_unit_liveness_only, simplify_unit_quiet,
    };
    use crate::ir::{AssignKind, DisplayKind, EdgeKind, Label, Module, SenItem, Stmt, Unit};

    fn var(name: &str, width: usize) -> Expr {
        Expr::variable(Variable::new(name, Sort::new(width)))
    }

    fn unit_with(stmts: Vec<Stmt>) -> Unit {
        let mut unit = Unit::new();
        let mut module = Module::new("top");
        for stmt in stmts {
            module.push(stmt);
        }
        unit.add_module(module);
        unit
    }

    fn assign(lhs: Expr, rhs: Expr) -> Stmt {
        Stmt::assign(AssignKind::Blocking, lhs, rhs)
    }

    #[test]
    fn constant_condition_selects_a_branch() {
        let mut unit = unit_with(vec![Stmt::if_then_else(
            Expr::logic_u64(0, 1),
            vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
            vec![assign(var("a", 8), Expr::logic_u64(2, 8))],
        )]);
        simplify_unit_quiet(&mut unit).unwrap();
        let stmts = unit.modules()[0].stmts();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Assign { rhs, .. } => {
                assert_eq!(rhs.as_logic().unwrap().value_u64(), Some(2))
            }
            other => panic!("expected assign, got {}", other),
        }
    }

    #[test]
    fn unknown_condition_survives_the_verilog_pass() {
        let x_cond = Expr::logic(crate::expr::Logic::all_x(1));
        let mut unit = unit_with(vec![Stmt::if_then(
            x_cond,
            vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
        )]);
        simplify_unit_quiet(&mut unit).unwrap();
        assert!(matches!(unit.modules()[0].stmts()[0], Stmt::If { .. }));
    }

    #[test]
    fn empty_else_arm_inverts_the_condition() {
        let mut unit = unit_with(vec![Stmt::if_then_else(
            var("c", 1),
            vec![],
            vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
        )]);
        simplify_unit_quiet(&mut unit).unwrap();
        match &unit.modules()[0].stmts()[0] {
            Stmt::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                assert!(matches!(
                    cond.op(),
                    crate::expr::Op::Unary(crate::expr::UnaryOp::Not)
                ));
                assert_eq!(then_stmts.len(), 1);
                assert!(else_stmts.is_empty());
            }
            other => panic!("expected if, got {}", other),
        }
    }

    #[test]
    fn never_taken_loop_is_deleted() {
        let mut unit = unit_with(vec![Stmt::While {
            cond: Expr::logic_u64(0, 1),
            body: vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
        }]);
        simplify_unit_quiet(&mut unit).unwrap();
        assert!(unit.modules()[0].stmts().is_empty());
    }

    #[test]
    fn blocking_self_assignment_is_deleted() {
        let mut unit = unit_with(vec![
            Stmt::assign(AssignKind::Blocking, var("a", 8), var("a", 8)),
            Stmt::assign(AssignKind::NonBlocking, var("b", 8), var("b", 8)),
        ]);
        simplify_unit_quiet(&mut unit).unwrap();
        // the scheduled non-blocking one stays
        assert_eq!(unit.modules()[0].stmts().len(), 1);
    }

    #[test]
    fn continuous_self_assignment_is_circular() {
        let mut unit = unit_with(vec![Stmt::assign(
            AssignKind::Continuous,
            var("w", 8),
            var("w", 8),
        )]);
        let err = simplify_unit_quiet(&mut unit).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CircularLogic(_)));
    }

    #[test]
    fn circular_assignment_keeps_the_module_intact() {
        let mut unit = unit_with(vec![
            assign(var("a", 8), var("b", 8)),
            Stmt::assign(AssignKind::Continuous, var("w", 8), var("w", 8)),
            assign(var("c", 8), var("d", 8)),
        ]);
        let err = simplify_unit_quiet(&mut unit).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CircularLogic(_)));
        // only the error is raised; every statement, the offender included,
        // is still there
        assert_eq!(unit.modules()[0].stmts().len(), 3);
    }

    #[test]
    fn concat_lvalue_splits_into_slices() {
        let lhs = Expr::concat(var("a", 4), var("b", 4));
        let mut unit = unit_with(vec![assign(lhs, var("r", 8))]);
        let report = simplify_unit_quiet(&mut unit).unwrap();
        let stmts = unit.modules()[0].stmts();
        assert_eq!(report.stats.assigns_split, 1);
        assert_eq!(stmts.len(), 2);
        match (&stmts[0], &stmts[1]) {
            (Stmt::Assign { lhs: l0, .. }, Stmt::Assign { lhs: l1, .. }) => {
                assert_eq!(l0.as_var().map(Variable::name), Some("b"));
                assert_eq!(l1.as_var().map(Variable::name), Some("a"));
            }
            _ => panic!("expected two assigns"),
        }
    }

    #[test]
    fn aliasing_concat_split_goes_through_a_temporary() {
        let lhs = Expr::concat(var("a", 4), var("b", 4));
        let rhs = Expr::concat(var("b", 4), var("a", 4));
        let mut unit = unit_with(vec![assign(lhs, rhs)]);
        simplify_unit_quiet(&mut unit).unwrap();
        let stmts = unit.modules()[0].stmts();
        assert_eq!(stmts.len(), 3);
        match &stmts[0] {
            Stmt::Assign { lhs, .. } => {
                assert!(lhs.as_var().unwrap().name().starts_with("__Vsplit"))
            }
            other => panic!("expected temp assign, got {}", other),
        }
    }

    #[test]
    fn adjacent_bitfield_assignments_merge() {
        let v = var("v", 8);
        let mut unit = unit_with(vec![
            assign(Expr::sel_const(v.clone(), 0, 4), var("x", 4)),
            assign(Expr::sel_const(v.clone(), 4, 4), var("y", 4)),
        ]);
        unit.modules_mut()[0].declare(Variable::new("v", Sort::new(8)));
        let report = simplify_unit_quiet(&mut unit).unwrap();
        let stmts = unit.modules()[0].stmts();
        assert_eq!(report.stats.assigns_merged, 1);
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Assign { lhs, rhs, .. } => {
                // v[7:0] = {y, x}, and the full-width select collapsed
                assert_eq!(lhs.as_var().map(Variable::name), Some("v"));
                assert_eq!(rhs.width(), 8);
            }
            other => panic!("expected merged assign, got {}", other),
        }
    }

    #[test]
    fn merge_requires_both_sources_free_of_the_target() {
        let v = var("v", 8);
        let mut unit = unit_with(vec![
            assign(
                Expr::sel_const(v.clone(), 0, 4),
                Expr::sel_const(v.clone(), 4, 4),
            ),
            assign(Expr::sel_const(v, 4, 4), var("y", 4)),
        ]);
        unit.modules_mut()[0].declare(Variable::new("v", Sort::new(8)));
        simplify_unit_quiet(&mut unit).unwrap();
        // the first source reads v, so the writes stay separate
        assert_eq!(unit.modules()[0].stmts().len(), 2);
    }

    #[test]
    fn split_access_variables_never_merge() {
        let v = var("v", 8);
        let mut unit = unit_with(vec![
            assign(Expr::sel_const(v.clone(), 0, 4), var("x", 4)),
            assign(Expr::sel_const(v.clone(), 4, 4), var("y", 4)),
        ]);
        unit.modules_mut()[0]
            .declare(Variable::new("v", Sort::new(8)))
            .set_split_access(true);
        simplify_unit_quiet(&mut unit).unwrap();
        assert_eq!(unit.modules()[0].stmts().len(), 2);
    }

    #[test]
    fn display_arguments_substitute_into_the_format() {
        let mut unit = unit_with(vec![Stmt::display(
            DisplayKind::Display,
            "value=%d flag=%b rest=%d",
            vec![
                Expr::logic_u64(42, 8),
                Expr::logic_u64(1, 1),
                var("x", 8),
            ],
        )]);
        simplify_unit_quiet(&mut unit).unwrap();
        match &unit.modules()[0].stmts()[0] {
            Stmt::Display { format, args, .. } => {
                assert_eq!(format, "value=42 flag=1 rest=%d");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected display, got {}", other),
        }
    }

    #[test]
    fn back_to_back_displays_merge_with_a_newline() {
        let mut unit = unit_with(vec![
            Stmt::display(DisplayKind::Display, "first", vec![]),
            Stmt::display(DisplayKind::Display, "second %d", vec![var("x", 8)]),
        ]);
        let report = simplify_unit_quiet(&mut unit).unwrap();
        assert_eq!(report.stats.displays_merged, 1);
        match &unit.modules()[0].stmts()[0] {
            Stmt::Display { format, args, .. } => {
                assert_eq!(format, "first\nsecond %d");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected display, got {}", other),
        }
    }

    #[test]
    fn statements_after_a_jump_are_unreachable() {
        let mut unit = unit_with(vec![Stmt::JumpBlock {
            label: Label(0),
            body: vec![
                Stmt::JumpGo { label: Label(0) },
                assign(var("a", 8), Expr::logic_u64(1, 8)),
            ],
        }]);
        simplify_unit_quiet(&mut unit).unwrap();
        match &unit.modules()[0].stmts()[0] {
            Stmt::JumpBlock { body, .. } => assert_eq!(body.len(), 1),
            other => panic!("expected jump block, got {}", other),
        }
    }

    #[test]
    fn unreferenced_jump_blocks_inline_in_expensive_mode() {
        let body = vec![assign(var("a", 8), Expr::logic_u64(1, 8))];
        let mut unit = unit_with(vec![Stmt::JumpBlock {
            label: Label(7),
            body: body.clone(),
        }]);
        simplify_unit(&mut unit).unwrap();
        assert!(matches!(unit.modules()[0].stmts()[0], Stmt::JumpBlock { .. }));

        let mut unit = unit_with(vec![Stmt::JumpBlock {
            label: Label(7),
            body,
        }]);
        let report = simplify_unit_expensive(&mut unit).unwrap();
        assert_eq!(report.stats.jumps_inlined, 1);
        assert!(matches!(unit.modules()[0].stmts()[0], Stmt::Assign { .. }));
    }

    #[test]
    fn sensitivity_lists_dedupe_in_expensive_mode() {
        let clk = || SenItem::new(EdgeKind::Pos, var("clk", 1));
        let mut unit = unit_with(vec![Stmt::Always {
            sens: vec![clk(), SenItem::new(EdgeKind::Neg, var("rst", 1)), clk()],
            body: vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
        }]);
        let report = simplify_unit_expensive(&mut unit).unwrap();
        assert_eq!(report.stats.sens_deduped, 1);
        match &unit.modules()[0].stmts()[0] {
            Stmt::Always { sens, .. } => assert_eq!(sens.len(), 2),
            other => panic!("expected process, got {}", other),
        }
    }

    #[test]
    fn liveness_only_never_deletes_statements() {
        let mut unit = unit_with(vec![
            Stmt::if_then(
                Expr::logic_u64(0, 1),
                vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
            ),
            Stmt::assign(AssignKind::Blocking, var("b", 8), var("b", 8)),
        ]);
        simplify_unit_liveness_only(&mut unit).unwrap();
        assert_eq!(unit.modules()[0].stmts().len(), 2);
    }

    #[test]
    fn liveness_only_keeps_branch_order() {
        let mut unit = unit_with(vec![Stmt::if_then_else(
            Expr::not(var("c", 1)),
            vec![assign(var("a", 8), Expr::logic_u64(1, 8))],
            vec![assign(var("b", 8), Expr::logic_u64(2, 8))],
        )]);
        simplify_unit_liveness_only(&mut unit).unwrap();
        match &unit.modules()[0].stmts()[0] {
            Stmt::If { cond, .. } => {
                assert!(matches!(
                    cond.op(),
                    crate::expr::Op::Unary(crate::expr::UnaryOp::Not)
                ));
            }
            other => panic!("expected if, got {}", other),
        }
    }
}
