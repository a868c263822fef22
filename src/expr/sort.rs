use crate::environment;
use crate::error::Result;
use std::fmt;

/// The type of an expression node: declared bit width, the minimal width that
/// still represents the value exactly, and signedness.
///
/// `width_min` tracks the "minimal width" convention used during constant
/// evaluation; storage and code generation always use the declared `width`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    width: usize,
    width_min: usize,
    signed: bool,
}

impl Sort {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            width_min: width,
            signed: false,
        }
    }

    pub fn bit() -> Self {
        Self::new(1)
    }

    pub fn word() -> Self {
        Self::new(environment::WORD_SIZE)
    }

    pub fn with_width_min(mut self, width_min: usize) -> Self {
        self.width_min = width_min;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn width_min(&self) -> usize {
        self.width_min
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_bit(&self) -> bool {
        self.width == 1
    }

    /// Whether values of this sort span more than one machine word.
    pub fn is_wide(&self) -> bool {
        self.width > environment::WORD_SIZE
    }

    pub fn expect_width(&self, other: &Sort) -> Result<()> {
        if self.width == other.width {
            Ok(())
        } else {
            Err(format!("Expected width {} but got {}", self.width, other.width).into())
        }
    }

    pub fn expect_bit(&self) -> Result<()> {
        if self.is_bit() {
            Ok(())
        } else {
            Err(format!("Expected single bit but got width {}", self.width).into())
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signed {
            write!(f, "s{}", self.width)
        } else {
            write!(f, "u{}", self.width)
        }
    }
}
