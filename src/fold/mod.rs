//! Constant folding and algebraic simplification over the expression and
//! statement IR.
//!
//! One rule engine serves every caller; the [`Mode`] decides which rule
//! classes may fire. Parameter evaluation demands a constant result and may
//! consult an [`Oracle`] for opaque calls, the Verilog-level passes rewrite
//! structure while preserving four-state semantics, and the backend pass
//! additionally knows that X has been lowered away and that operations are
//! priced per machine word.

use crate::environment::{Environment, OptimizationLevel};
use crate::error::{ErrorKind, Result};
use crate::expr::{Expr, Logic};
use crate::ir::{Transform, Unit};
use std::fmt;

mod bitop;
mod diagnostic;
mod engine;
mod numeric;
mod stmts;
mod structural;

pub use self::diagnostic::{Diagnostic, Diagnostics, Warn};
pub use self::numeric::evaluate;

use self::engine::Folder;

/// Which rule classes a pass may apply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Parameter evaluation that is allowed to fail silently.
    ParamsNoWarn,
    /// Parameter evaluation; a non-constant result is an error.
    Params,
    /// Generate-time evaluation; an error on non-constant results but no
    /// user-facing warnings.
    Generate,
    /// Only push constants through; never delete or restructure.
    LivenessOnly,
    /// Full Verilog-level simplification without warnings.
    VerilogNoWarn,
    /// Full Verilog-level simplification with warnings.
    VerilogWarn,
    /// Adds the slow rules: jump-block inlining and sensitivity-list
    /// deduplication.
    Expensive,
    /// Post-X-lowering backend simplification, including bit-reduction-tree
    /// rewrites.
    Backend,
}

/// Evaluates opaque calls during parameter folding.
pub trait Oracle {
    /// The constant value of `call`, if the callee is evaluatable at
    /// compile time. The result is resized to the call's width.
    fn evaluate(&self, call: &Expr) -> Option<Logic>;
}

/// An oracle that answers nothing; every opaque call stays.
pub struct NoOracle;

impl Oracle for NoOracle {
    fn evaluate(&self, _call: &Expr) -> Option<Logic> {
        None
    }
}

/// Counters of rule applications during one pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    pub consts_folded: usize,
    pub concats_merged: usize,
    pub bitop_trees: usize,
    pub assigns_split: usize,
    pub assigns_merged: usize,
    pub displays_merged: usize,
    pub display_substs: usize,
    pub dead_stmts: usize,
    pub jumps_inlined: usize,
    pub sens_deduped: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "constants folded:      {}", self.consts_folded)?;
        writeln!(f, "concats merged:        {}", self.concats_merged)?;
        writeln!(f, "bit-op trees reduced:  {}", self.bitop_trees)?;
        writeln!(f, "assignments split:     {}", self.assigns_split)?;
        writeln!(f, "assignments merged:    {}", self.assigns_merged)?;
        writeln!(f, "displays merged:       {}", self.displays_merged)?;
        writeln!(f, "display substitutions: {}", self.display_substs)?;
        writeln!(f, "dead statements:       {}", self.dead_stmts)?;
        writeln!(f, "jump blocks inlined:   {}", self.jumps_inlined)?;
        writeln!(f, "sense items deduped:   {}", self.sens_deduped)
    }
}

/// Outcome of one pass: the warnings raised and what the rules did.
#[derive(Clone, Debug, Default)]
pub struct FoldReport {
    pub diagnostics: Diagnostics,
    pub stats: Stats,
}

/// The configured pass. Build one, then run it over an expression or a
/// whole unit.
pub struct ConstFold<'o> {
    mode: Mode,
    env: Environment,
    oracle: Option<&'o dyn Oracle>,
}

impl<'o> ConstFold<'o> {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            env: Environment::default(),
            oracle: None,
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn with_oracle(mut self, oracle: &'o dyn Oracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// The mode actually run, after the environment's optimization level is
    /// applied.
    fn effective_mode(&self) -> Option<Mode> {
        match (self.env.optimization_level, self.mode) {
            // correctness-relevant passes always run
            (OptimizationLevel::Disabled, Mode::Params)
            | (OptimizationLevel::Disabled, Mode::ParamsNoWarn)
            | (OptimizationLevel::Disabled, Mode::Generate) => Some(self.mode),
            (OptimizationLevel::Disabled, _) => None,
            (OptimizationLevel::Basic, Mode::Expensive) => Some(Mode::VerilogWarn),
            (_, mode) => Some(mode),
        }
    }

    pub fn expression(&self, expr: &mut Expr) -> Result<FoldReport> {
        let mode = match self.effective_mode() {
            Some(mode) => mode,
            None => return Ok(FoldReport::default()),
        };
        let mut folder = Folder::new(mode, self.env.clone(), self.oracle);
        folder.fold_expr(expr);
        let report = FoldReport {
            diagnostics: folder.diags,
            stats: folder.stats,
        };
        if folder.required && !expr.is_const() {
            let offender = format!("{}", first_non_constant(expr));
            expr.replace_keeping_sort(Expr::logic(Logic::zero(expr.width())));
            return Err(ErrorKind::ConstantRequired(offender).into());
        }
        Ok(report)
    }

    /// Runs the pass over every module. A hard error (circular continuous
    /// assignment) is reported only after the whole unit is folded; the
    /// offending statement stays in place, so the tree is usable either way.
    pub fn unit(&self, unit: &mut Unit) -> Result<FoldReport> {
        let mode = match self.effective_mode() {
            Some(mode) => mode,
            None => return Ok(FoldReport::default()),
        };
        let mut folder = Folder::new(mode, self.env.clone(), self.oracle);
        for module in unit.modules_mut() {
            folder.fold_module(module);
        }
        if let Some(error) = folder.failure.take() {
            return Err(error);
        }
        Ok(FoldReport {
            diagnostics: folder.diags,
            stats: folder.stats,
        })
    }
}

impl<'o> Transform<Unit> for ConstFold<'o> {
    fn name(&self) -> &'static str {
        "const-fold"
    }

    fn description(&self) -> &'static str {
        "Constant folding and algebraic simplification"
    }

    fn transform(&self, program: &mut Unit) -> Result<()> {
        self.unit(program).map(|_| ())
    }
}

/// The sub-expression blocking constant evaluation, for error reporting.
fn first_non_constant(expr: &Expr) -> &Expr {
    for operand in expr.operands() {
        if !operand.is_const() {
            return first_non_constant(operand);
        }
    }
    expr
}

// ---------------------------------------------------------------------
// Entry points

/// Evaluates a parameter value. Fails when the expression does not reduce
/// to a constant; the expression is then replaced by zero so later passes
/// see a well-formed tree.
pub fn constify_for_parameter(expr: &mut Expr, oracle: &dyn Oracle) -> Result<FoldReport> {
    ConstFold::new(Mode::Params).with_oracle(oracle).expression(expr)
}

/// Like [`constify_for_parameter`], but a non-constant result is not an
/// error and nothing is warned; the caller probes whether the value is
/// known yet.
pub fn constify_for_parameter_speculative(
    expr: &mut Expr,
    oracle: &dyn Oracle,
) -> Result<FoldReport> {
    ConstFold::new(Mode::ParamsNoWarn)
        .with_oracle(oracle)
        .expression(expr)
}

/// Evaluates a generate-time condition or bound. Must be constant, but
/// raises no user-facing warnings.
pub fn constify_for_generate(expr: &mut Expr, oracle: &dyn Oracle) -> Result<FoldReport> {
    ConstFold::new(Mode::Generate)
        .with_oracle(oracle)
        .expression(expr)
}

/// Simplifies one expression with Verilog four-state semantics.
pub fn simplify(expr: &mut Expr) -> Result<FoldReport> {
    ConstFold::new(Mode::VerilogNoWarn).expression(expr)
}

/// Simplifies one expression for the backend, where X has been lowered away
/// and bit-reduction trees pay off.
pub fn simplify_backend(expr: &mut Expr) -> Result<FoldReport> {
    ConstFold::new(Mode::Backend).expression(expr)
}

/// Simplifies a whole unit, with warnings.
pub fn simplify_unit(unit: &mut Unit) -> Result<FoldReport> {
    ConstFold::new(Mode::VerilogWarn).unit(unit)
}

/// Simplifies a whole unit without raising warnings.
pub fn simplify_unit_quiet(unit: &mut Unit) -> Result<FoldReport> {
    ConstFold::new(Mode::VerilogNoWarn).unit(unit)
}

/// Simplifies a whole unit including the slow rules.
pub fn simplify_unit_expensive(unit: &mut Unit) -> Result<FoldReport> {
    ConstFold::new(Mode::Expensive).unit(unit)
}

/// Pushes constants through a unit without deleting or restructuring
/// anything; safe while liveness information is still in use.
pub fn simplify_unit_liveness_only(unit: &mut Unit) -> Result<FoldReport> {
    ConstFold::new(Mode::LivenessOnly).unit(unit)
}
