use std::fmt;

/// Advisory warning classes emitted as a side effect of rules firing.
/// These never block a rewrite.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Warn {
    /// Comparison is constant because the operand is unsigned.
    Unsigned,
    /// Comparison is constant because of the operand's limited range.
    CmpConst,
    /// Constant select index lies outside the declared range.
    SelRange,
}

impl fmt::Display for Warn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned => write!(f, "UNSIGNED"),
            Self::CmpConst => write!(f, "CMPCONST"),
            Self::SelRange => write!(f, "SELRANGE"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    code: Warn,
    message: String,
}

impl Diagnostic {
    pub fn new<S>(code: Warn, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Warn {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%Warning-{}: {}", self.code, self.message)
    }
}

/// The warnings collected during one pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn warn<S>(&mut self, code: Warn, message: S)
    where
        S: Into<String>,
    {
        self.items.push(Diagnostic::new(code, message));
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
