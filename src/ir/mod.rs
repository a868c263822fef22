//! Statement-level IR: processes, assignments, control flow and the
//! per-module declaration table.

use crate::expr::{Expr, Sort, Variable};
use std::collections::BTreeMap;
use std::fmt;

mod transform;

pub use self::transform::Transform;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AssignKind {
    /// Procedural blocking assignment.
    Blocking,
    /// Procedural non-blocking assignment; scheduled, so a self-assignment
    /// is observable and must not be deleted.
    NonBlocking,
    /// Continuous (wire) assignment.
    Continuous,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DisplayKind {
    /// Appends a newline after the formatted text.
    Display,
    /// Prints the formatted text as-is.
    Write,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum EdgeKind {
    Pos,
    Neg,
    Any,
}

/// One entry of a process sensitivity list.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SenItem {
    pub edge: EdgeKind,
    pub expr: Expr,
}

impl SenItem {
    pub fn new(edge: EdgeKind, expr: Expr) -> Self {
        Self { edge, expr }
    }
}

/// Identifier of a jump target block within one module.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(pub usize);

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Stmt {
    Assign {
        kind: AssignKind,
        lhs: Expr,
        rhs: Expr,
    },
    If {
        cond: Expr,
        then_stmts: Vec<Stmt>,
        else_stmts: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Display {
        kind: DisplayKind,
        format: String,
        args: Vec<Expr>,
    },
    /// A statement container that a `JumpGo` may exit to the end of.
    JumpBlock {
        label: Label,
        body: Vec<Stmt>,
    },
    /// Unconditional jump to the end of the enclosing block with `label`.
    JumpGo {
        label: Label,
    },
    /// A process with a sensitivity list.
    Always {
        sens: Vec<SenItem>,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn assign(kind: AssignKind, lhs: Expr, rhs: Expr) -> Self {
        Self::Assign { kind, lhs, rhs }
    }

    pub fn if_then(cond: Expr, then_stmts: Vec<Stmt>) -> Self {
        Self::If {
            cond,
            then_stmts,
            else_stmts: vec![],
        }
    }

    pub fn if_then_else(cond: Expr, then_stmts: Vec<Stmt>, else_stmts: Vec<Stmt>) -> Self {
        Self::If {
            cond,
            then_stmts,
            else_stmts,
        }
    }

    pub fn display<S>(kind: DisplayKind, format: S, args: Vec<Expr>) -> Self
    where
        S: Into<String>,
    {
        Self::Display {
            kind,
            format: format.into(),
            args,
        }
    }
}

/// A declared variable plus its simplification-relevant attributes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VarDecl {
    variable: Variable,
    split_access: bool,
}

impl VarDecl {
    pub fn new(variable: Variable) -> Self {
        Self {
            variable,
            split_access: false,
        }
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// Marks the variable as "do not merge bit accesses".
    pub fn set_split_access(&mut self, split_access: bool) {
        self.split_access = split_access;
    }

    pub fn split_access(&self) -> bool {
        self.split_access
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Module {
    name: String,
    decls: BTreeMap<String, VarDecl>,
    stmts: Vec<Stmt>,
    next_temp: usize,
}

impl Module {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            decls: BTreeMap::new(),
            stmts: Vec::new(),
            next_temp: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declare(&mut self, variable: Variable) -> &mut VarDecl {
        self.decls
            .entry(variable.name().to_string())
            .or_insert_with(|| VarDecl::new(variable))
    }

    pub fn decl(&self, name: &str) -> Option<&VarDecl> {
        self.decls.get(name)
    }

    pub fn decls(&self) -> impl Iterator<Item = &VarDecl> {
        self.decls.values()
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn stmts_mut(&mut self) -> &mut Vec<Stmt> {
        &mut self.stmts
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    /// Declares a fresh temporary for assignment splitting.
    pub fn fresh_temp(&mut self, width: usize) -> Variable {
        let variable = Variable::new(format!("__Vsplit{}", self.next_temp), Sort::new(width));
        self.next_temp += 1;
        self.declare(variable.clone());
        variable
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Unit {
    modules: Vec<Module>,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: Module) -> &mut Module {
        self.modules.push(module);
        self.modules.last_mut().unwrap()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut Vec<Module> {
        &mut self.modules
    }
}

fn fmt_stmts(f: &mut fmt::Formatter<'_>, stmts: &[Stmt], indent: usize) -> fmt::Result {
    for stmt in stmts {
        stmt.fmt_indented(f, indent)?;
    }
    Ok(())
}

impl Stmt {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Self::Assign { kind, lhs, rhs } => {
                let op = match kind {
                    AssignKind::Blocking => "=",
                    AssignKind::NonBlocking => "<=",
                    AssignKind::Continuous => ":=",
                };
                writeln!(f, "{}{} {} {}", pad, lhs, op, rhs)
            }
            Self::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                writeln!(f, "{}if {} {{", pad, cond)?;
                fmt_stmts(f, then_stmts, indent + 1)?;
                if !else_stmts.is_empty() {
                    writeln!(f, "{}}} else {{", pad)?;
                    fmt_stmts(f, else_stmts, indent + 1)?;
                }
                writeln!(f, "{}}}", pad)
            }
            Self::While { cond, body } => {
                writeln!(f, "{}while {} {{", pad, cond)?;
                fmt_stmts(f, body, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
            Self::Block(stmts) => {
                writeln!(f, "{}{{", pad)?;
                fmt_stmts(f, stmts, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
            Self::Display { kind, format, args } => {
                let name = match kind {
                    DisplayKind::Display => "display",
                    DisplayKind::Write => "write",
                };
                write!(f, "{}{}({:?}", pad, name, format)?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                writeln!(f, ")")
            }
            Self::JumpBlock { label, body } => {
                writeln!(f, "{}block L{} {{", pad, label.0)?;
                fmt_stmts(f, body, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
            Self::JumpGo { label } => writeln!(f, "{}jump L{}", pad, label.0),
            Self::Always { sens, body } => {
                write!(f, "{}always @(", pad)?;
                for (i, item) in sens.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let edge = match item.edge {
                        EdgeKind::Pos => "posedge ",
                        EdgeKind::Neg => "negedge ",
                        EdgeKind::Any => "",
                    };
                    write!(f, "{}{}", edge, item.expr)?;
                }
                writeln!(f, ") {{")?;
                fmt_stmts(f, body, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} {{", self.name)?;
        fmt_stmts(f, &self.stmts, 1)?;
        writeln!(f, "}}")
    }
}
