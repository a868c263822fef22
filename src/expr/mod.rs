use crate::error::Result;
use std::fmt;

mod constant;
mod logic;
mod op;
mod sort;
mod variable;

pub use self::constant::Constant;
pub use self::logic::{Bit, Logic};
pub use self::op::{BinaryOp, UnaryOp};
pub use self::sort::Sort;
pub use self::variable::Variable;

/// An opaque call into code the simplifier cannot see through. The purity
/// flag decides whether the call may be duplicated, reordered or elided.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Call {
    name: String,
    pure: bool,
}

impl Call {
    pub fn new<S>(name: S, pure: bool) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            pure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Op {
    Const(Constant),
    Var(Variable),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Cond,
    Sel,
    Call(Call),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(c) => c.fmt(f),
            Self::Var(v) => v.fmt(f),
            Self::Unary(op) => op.fmt(f),
            Self::Binary(op) => op.fmt(f),
            Self::Cond => write!(f, "cond"),
            Self::Sel => write!(f, "sel"),
            Self::Call(c) => write!(f, "{}()", c.name()),
        }
    }
}

/// A node of the expression tree.
///
/// Every node carries a fully determined `Sort`; rewrites either keep it
/// (`replace_keeping_sort`) or construct the replacement with an explicitly
/// recomputed one.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Expr {
    op: Op,
    operands: Vec<Expr>,
    sort: Sort,
}

impl Expr {
    pub fn new(op: Op, operands: Vec<Expr>, sort: Sort) -> Self {
        Self { op, operands, sort }
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn operands(&self) -> &[Expr] {
        &self.operands
    }

    pub fn operands_mut(&mut self) -> &mut Vec<Expr> {
        &mut self.operands
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn width(&self) -> usize {
        self.sort.width()
    }

    pub fn is_signed(&self) -> bool {
        self.sort.is_signed()
    }

    /// Install `with` in place of this node, keeping the declared sort.
    pub fn replace_keeping_sort(&mut self, with: Expr) {
        let sort = self.sort;
        *self = with;
        self.sort = sort;
    }

    pub fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
    }

    // ---------------------------------------------------------------------
    // Queries

    pub fn is_const(&self) -> bool {
        matches!(self.op, Op::Const(_))
    }

    pub fn as_logic(&self) -> Option<&Logic> {
        match &self.op {
            Op::Const(c) => c.as_logic(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.op {
            Op::Const(c) => c.as_string(),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&Variable> {
        match &self.op {
            Op::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_const_zero(&self) -> bool {
        self.as_logic().map_or(false, Logic::is_zero)
    }

    pub fn is_const_one(&self) -> bool {
        self.as_logic().map_or(false, Logic::is_one)
    }

    pub fn is_const_all_ones(&self) -> bool {
        self.as_logic().map_or(false, Logic::is_all_ones)
    }

    /// No observable side effects anywhere in the subtree.
    pub fn is_pure(&self) -> bool {
        let self_pure = match &self.op {
            Op::Call(c) => c.is_pure(),
            _ => true,
        };
        self_pure && self.operands.iter().all(Expr::is_pure)
    }

    /// The result is provably exactly zero or one (no stray high bits).
    pub fn is_clean_bool(&self) -> bool {
        match &self.op {
            Op::Const(c) => c.as_logic().map_or(false, |v| v.bits() == 1),
            Op::Unary(op) => matches!(
                op,
                UnaryOp::LogNot | UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor
            ),
            Op::Binary(op) => {
                op.is_comparison() || matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr)
            }
            _ => false,
        }
    }

    pub fn variables(&self) -> Vec<&Variable> {
        let mut variables = Vec::new();
        match &self.op {
            Op::Var(variable) => variables.push(variable),
            _ => {
                for operand in &self.operands {
                    variables.append(&mut operand.variables())
                }
            }
        }
        variables
    }

    // ---------------------------------------------------------------------
    // Leaf constructors

    pub fn logic(value: Logic) -> Expr {
        let sort = Sort::new(value.bits()).with_width_min(value.min_width());
        Expr::new(Op::Const(Constant::logic(value)), vec![], sort)
    }

    pub fn logic_u64(value: u64, bits: usize) -> Expr {
        Expr::logic(Logic::new(value, bits))
    }

    pub fn string<S>(value: S) -> Expr
    where
        S: Into<String>,
    {
        let value = value.into();
        let sort = Sort::new((value.len() * 8).max(8));
        Expr::new(Op::Const(Constant::string(value)), vec![], sort)
    }

    pub fn variable(variable: Variable) -> Expr {
        let sort = *variable.sort();
        Expr::new(Op::Var(variable), vec![], sort)
    }

    pub fn call(call: Call, arguments: Vec<Expr>, sort: Sort) -> Expr {
        Expr::new(Op::Call(call), arguments, sort)
    }

    // ---------------------------------------------------------------------
    // Unary constructors

    fn unary(op: UnaryOp, operand: Expr, sort: Sort) -> Expr {
        Expr::new(Op::Unary(op), vec![operand], sort)
    }

    pub fn not(operand: Expr) -> Expr {
        let sort = *operand.sort();
        Expr::unary(UnaryOp::Not, operand, sort)
    }

    pub fn log_not(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::LogNot, operand, Sort::bit())
    }

    pub fn negate(operand: Expr) -> Expr {
        let sort = *operand.sort();
        Expr::unary(UnaryOp::Negate, operand, sort)
    }

    pub fn red_and(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::RedAnd, operand, Sort::bit())
    }

    pub fn red_or(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::RedOr, operand, Sort::bit())
    }

    pub fn red_xor(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::RedXor, operand, Sort::bit())
    }

    pub fn zext(operand: Expr, width: usize) -> Result<Expr> {
        if width < operand.width() {
            return Err(format!("Cannot zero-extend {} to {}", operand.width(), width).into());
        }
        let sort = Sort::new(width).with_width_min(operand.sort().width_min());
        Ok(Expr::unary(UnaryOp::Extend, operand, sort))
    }

    pub fn sext(operand: Expr, width: usize) -> Result<Expr> {
        if width < operand.width() {
            return Err(format!("Cannot sign-extend {} to {}", operand.width(), width).into());
        }
        let sort = Sort::new(width)
            .with_width_min(operand.sort().width_min())
            .with_signed(true);
        Ok(Expr::unary(UnaryOp::ExtendSigned, operand, sort))
    }

    /// Narrowing cast dropping the operand's top bits.
    pub fn cast(operand: Expr, width: usize) -> Result<Expr> {
        if width > operand.width() {
            return Err(format!("Cannot narrow {} to {}", operand.width(), width).into());
        }
        Ok(Expr::unary(UnaryOp::Cast, operand, Sort::new(width)))
    }

    // ---------------------------------------------------------------------
    // Binary constructors

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, sort: Sort) -> Expr {
        Expr::new(Op::Binary(op), vec![lhs, rhs], sort)
    }

    fn bitwise(op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr> {
        lhs.sort().expect_width(rhs.sort())?;
        let sort = Sort::new(lhs.width())
            .with_width_min(lhs.sort().width_min().max(rhs.sort().width_min()))
            .with_signed(lhs.is_signed() && rhs.is_signed());
        Ok(Expr::binary(op, lhs, rhs, sort))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Or, lhs, rhs)
    }

    pub fn xor(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Xor, lhs, rhs)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Div, lhs, rhs)
    }

    pub fn modulo(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Mod, lhs, rhs)
    }

    pub fn pow(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::bitwise(BinaryOp::Pow, lhs, rhs)
    }

    pub fn shift_l(lhs: Expr, rhs: Expr) -> Expr {
        let sort = *lhs.sort();
        Expr::binary(BinaryOp::ShiftL, lhs, rhs, sort)
    }

    pub fn shift_r(lhs: Expr, rhs: Expr) -> Expr {
        let sort = *lhs.sort();
        Expr::binary(BinaryOp::ShiftR, lhs, rhs, sort)
    }

    pub fn shift_r_signed(lhs: Expr, rhs: Expr) -> Expr {
        let sort = *lhs.sort();
        Expr::binary(BinaryOp::ShiftRSigned, lhs, rhs, sort)
    }

    pub fn compare(op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr> {
        debug_assert!(op.is_comparison());
        lhs.sort().expect_width(rhs.sort())?;
        Ok(Expr::binary(op, lhs, rhs, Sort::bit()))
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::compare(BinaryOp::Eq, lhs, rhs)
    }

    pub fn neq(lhs: Expr, rhs: Expr) -> Result<Expr> {
        Expr::compare(BinaryOp::Neq, lhs, rhs)
    }

    pub fn log_and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::LogAnd, lhs, rhs, Sort::bit())
    }

    pub fn log_or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::LogOr, lhs, rhs, Sort::bit())
    }

    pub fn concat(msbs: Expr, lsbs: Expr) -> Expr {
        let sort = Sort::new(msbs.width() + lsbs.width());
        Expr::binary(BinaryOp::Concat, msbs, lsbs, sort)
    }

    pub fn replicate(operand: Expr, count: usize) -> Expr {
        let sort = Sort::new(operand.width() * count);
        let count = Expr::logic_u64(count as u64, 32);
        Expr::binary(BinaryOp::Replicate, operand, count, sort)
    }

    pub fn word_sel(from: Expr, index: Expr) -> Expr {
        Expr::binary(BinaryOp::WordSel, from, index, Sort::word())
    }

    // ---------------------------------------------------------------------
    // Other constructors

    pub fn cond(cond: Expr, then: Expr, else_: Expr) -> Result<Expr> {
        then.sort().expect_width(else_.sort())?;
        let sort = Sort::new(then.width())
            .with_width_min(then.sort().width_min().max(else_.sort().width_min()))
            .with_signed(then.is_signed() && else_.is_signed());
        Ok(Expr::new(Op::Cond, vec![cond, then, else_], sort))
    }

    pub fn sel(from: Expr, lsb: Expr, width: usize) -> Expr {
        Expr::new(Op::Sel, vec![from, lsb], Sort::new(width))
    }

    pub fn sel_const(from: Expr, lsb: usize, width: usize) -> Expr {
        Expr::sel(from, Expr::logic_u64(lsb as u64, 32), width)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            self.op.fmt(f)
        } else {
            write!(f, "({}", self.op)?;
            for operand in &self.operands {
                write!(f, " {}", operand)?;
            }
            write!(f, ")")
        }
    }
}
