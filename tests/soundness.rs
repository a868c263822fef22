//! Random-tree equivalence checking: simplification must never change what
//! an expression evaluates to. Bindings are two-state here; the four-state
//! corner cases are covered by the unit tests next to the rules.

use proptest::prelude::*;
use std::collections::HashMap;
use vfold::expr::{BinaryOp, Expr, Logic, Sort, Variable};
use vfold::fold::{self, evaluate};

const W: usize = 8;

fn leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (0u64..=255).prop_map(|v| Expr::logic_u64(v, W)),
        Just(Expr::variable(Variable::new("a", Sort::new(W)))),
        Just(Expr::variable(Variable::new("b", Sort::new(W)))),
    ]
}

fn expr() -> impl Strategy<Value = Expr> {
    leaf().prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::add(a, b).unwrap()),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::sub(a, b).unwrap()),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::mul(a, b).unwrap()),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::and(a, b).unwrap()),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::or(a, b).unwrap()),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::xor(a, b).unwrap()),
            inner.clone().prop_map(Expr::not),
            inner.clone().prop_map(Expr::negate),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Expr::zext(Expr::eq(a, b).unwrap(), W).unwrap()),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| {
                Expr::zext(Expr::compare(BinaryOp::Lt, a, b).unwrap(), W).unwrap()
            }),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(c, t, e)| Expr::cond(c, t, e).unwrap()),
            (inner.clone(), 0usize..5)
                .prop_map(|(x, lsb)| Expr::zext(Expr::sel_const(x, lsb, 4), W).unwrap()),
            (inner.clone(), 0u64..16)
                .prop_map(|(x, n)| Expr::shift_r(x, Expr::logic_u64(n, W))),
            (inner, 0u64..16).prop_map(|(x, n)| Expr::shift_l(x, Expr::logic_u64(n, W))),
        ]
    })
}

fn bindings(a: u64, b: u64) -> HashMap<String, Logic> {
    let mut bindings = HashMap::new();
    bindings.insert("a".to_string(), Logic::new(a, W));
    bindings.insert("b".to_string(), Logic::new(b, W));
    bindings
}

proptest! {
    #[test]
    fn simplify_preserves_evaluation(e in expr(), a in 0u64..=255, b in 0u64..=255) {
        let bindings = bindings(a, b);
        let before = evaluate(&e, &bindings).unwrap();
        let mut simplified = e.clone();
        fold::simplify(&mut simplified).unwrap();
        let after = evaluate(&simplified, &bindings).unwrap();
        prop_assert!(
            before.case_equal(&after),
            "{} != {} after simplifying {} to {}",
            before, after, e, simplified
        );
    }

    #[test]
    fn simplify_is_idempotent(e in expr()) {
        let mut once = e;
        fold::simplify(&mut once).unwrap();
        let mut twice = once.clone();
        fold::simplify(&mut twice).unwrap();
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn backend_simplify_preserves_evaluation(e in expr(), a in 0u64..=255, b in 0u64..=255) {
        let bindings = bindings(a, b);
        let before = evaluate(&e, &bindings).unwrap();
        let mut simplified = e.clone();
        fold::simplify_backend(&mut simplified).unwrap();
        let after = evaluate(&simplified, &bindings).unwrap();
        prop_assert!(
            before.case_equal(&after),
            "{} != {} after simplifying {} to {}",
            before, after, e, simplified
        );
    }
}
