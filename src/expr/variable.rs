use crate::expr::Sort;
use std::fmt;

/// A reference to a declared signal or variable.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Variable {
    name: String,
    sort: Sort,
}

impl Variable {
    pub fn new<S>(name: S, sort: Sort) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_wide(&self) -> bool {
        self.sort.is_wide()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if cfg!(debug_assertions) {
            write!(f, "{}:{}", self.name, self.sort)
        } else {
            write!(f, "{}", self.name)
        }
    }
}
