use std::fmt;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Not,
    LogNot,
    Negate,
    RedAnd,
    RedOr,
    RedXor,
    Extend,
    ExtendSigned,
    Cast,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    MulSigned,
    Div,
    DivSigned,
    Mod,
    ModSigned,
    Pow,
    ShiftL,
    ShiftR,
    ShiftRSigned,
    Eq,
    Neq,
    EqCase,
    NeqCase,
    EqWild,
    NeqWild,
    Lt,
    LtSigned,
    Lte,
    LteSigned,
    Gt,
    GtSigned,
    Gte,
    GteSigned,
    LogAnd,
    LogOr,
    Concat,
    Replicate,
    WordSel,
}

impl BinaryOp {
    pub fn is_commutative(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            And | Or | Xor | Add | Mul | MulSigned | Eq | Neq | EqCase | NeqCase | LogAnd | LogOr
        )
    }

    /// Operators whose chains may be re-associated to combine constants.
    pub fn is_associative(&self) -> bool {
        use BinaryOp::*;
        matches!(self, And | Or | Xor | Add | Mul)
    }

    pub fn is_comparison(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            Eq | Neq
                | EqCase
                | NeqCase
                | EqWild
                | NeqWild
                | Lt
                | LtSigned
                | Lte
                | LteSigned
                | Gt
                | GtSigned
                | Gte
                | GteSigned
        )
    }

    /// The comparison computing the logical negation of this one, if any.
    pub fn negated_comparison(&self) -> Option<BinaryOp> {
        use BinaryOp::*;
        let flipped = match self {
            Eq => Neq,
            Neq => Eq,
            EqCase => NeqCase,
            NeqCase => EqCase,
            EqWild => NeqWild,
            NeqWild => EqWild,
            Lt => Gte,
            Gte => Lt,
            Gt => Lte,
            Lte => Gt,
            LtSigned => GteSigned,
            GteSigned => LtSigned,
            GtSigned => LteSigned,
            LteSigned => GtSigned,
            _ => return None,
        };
        Some(flipped)
    }

    /// The comparison equivalent to this one with its operands swapped.
    pub fn swapped_comparison(&self) -> Option<BinaryOp> {
        use BinaryOp::*;
        let swapped = match self {
            Eq => Eq,
            Neq => Neq,
            EqCase => EqCase,
            NeqCase => NeqCase,
            Lt => Gt,
            Gt => Lt,
            Lte => Gte,
            Gte => Lte,
            LtSigned => GtSigned,
            GtSigned => LtSigned,
            LteSigned => GteSigned,
            GteSigned => LteSigned,
            _ => return None,
        };
        Some(swapped)
    }

    /// Bitwise operators whose result bits depend only on the operand bits at
    /// the same position, so a select may be pushed below them.
    pub fn is_bitwise(&self) -> bool {
        use BinaryOp::*;
        matches!(self, And | Or | Xor)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => write!(f, "~"),
            Self::LogNot => write!(f, "!"),
            Self::Negate => write!(f, "-"),
            Self::RedAnd => write!(f, "&red"),
            Self::RedOr => write!(f, "|red"),
            Self::RedXor => write!(f, "^red"),
            Self::Extend => write!(f, "zext"),
            Self::ExtendSigned => write!(f, "sext"),
            Self::Cast => write!(f, "cast"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "&"),
            Self::Or => write!(f, "|"),
            Self::Xor => write!(f, "^"),
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::MulSigned => write!(f, "*s"),
            Self::Div => write!(f, "/"),
            Self::DivSigned => write!(f, "/s"),
            Self::Mod => write!(f, "%"),
            Self::ModSigned => write!(f, "%s"),
            Self::Pow => write!(f, "**"),
            Self::ShiftL => write!(f, "<<"),
            Self::ShiftR => write!(f, ">>"),
            Self::ShiftRSigned => write!(f, ">>>"),
            Self::Eq => write!(f, "=="),
            Self::Neq => write!(f, "!="),
            Self::EqCase => write!(f, "==="),
            Self::NeqCase => write!(f, "!=="),
            Self::EqWild => write!(f, "==?"),
            Self::NeqWild => write!(f, "!=?"),
            Self::Lt => write!(f, "<"),
            Self::LtSigned => write!(f, "<s"),
            Self::Lte => write!(f, "<="),
            Self::LteSigned => write!(f, "<=s"),
            Self::Gt => write!(f, ">"),
            Self::GtSigned => write!(f, ">s"),
            Self::Gte => write!(f, ">="),
            Self::GteSigned => write!(f, ">=s"),
            Self::LogAnd => write!(f, "&&"),
            Self::LogOr => write!(f, "||"),
            Self::Concat => write!(f, "concat"),
            Self::Replicate => write!(f, "replicate"),
            Self::WordSel => write!(f, "wordsel"),
        }
    }
}
