use crate::error::Result;
use crate::expr::Logic;
use std::fmt;

/// A literal constant payload.
///
/// String payloads carry no width semantics and bypass the minimal/declared
/// width conversions of the numeric folding layer.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Constant {
    Logic(Logic),
    Str(String),
}

impl Constant {
    pub fn logic(value: Logic) -> Self {
        Self::Logic(value)
    }

    pub fn logic_u64(value: u64, bits: usize) -> Self {
        Self::Logic(Logic::new(value, bits))
    }

    pub fn string<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self::Str(value.into())
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, Self::Logic(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::Str(_))
    }

    pub fn as_logic(&self) -> Option<&Logic> {
        match self {
            Self::Logic(value) => Some(value),
            Self::Str(_) => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            Self::Logic(_) => None,
        }
    }

    pub fn expect_logic(&self) -> Result<&Logic> {
        self.as_logic().ok_or_else(|| "Expected Logic".into())
    }

    pub fn expect_string(&self) -> Result<&str> {
        self.as_string().ok_or_else(|| "Expected Str".into())
    }
}

impl From<Logic> for Constant {
    fn from(value: Logic) -> Self {
        Self::Logic(value)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logic(value) => value.fmt(f),
            Self::Str(value) => write!(f, "\"{}\"", value),
        }
    }
}
