use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use std::fmt;

/// A single four-state bit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bit {
    Zero,
    One,
    X,
    Z,
}

/// An arbitrary-width four-state bit vector.
///
/// Stored as three disjoint bit planes over the value's width: bits that are
/// known one, bits that are X and bits that are Z. A bit set in none of the
/// planes is known zero. All operations keep the planes disjoint and truncated
/// to `bits`.
///
/// Logical operations use the Verilog per-bit tables (`0 & x == 0`,
/// `1 | x == 1`, ...). Arithmetic and ordered comparisons poison the whole
/// result to X as soon as any operand bit is unknown; case equality compares
/// all four states exactly. Division and modulo by zero produce all-X.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Logic {
    bits: usize,
    ones: BigUint,
    xs: BigUint,
    zs: BigUint,
}

fn mask(bits: usize) -> BigUint {
    (BigUint::one() << bits) - BigUint::one()
}

fn plane_bit(plane: &BigUint, index: usize) -> bool {
    !((plane >> index) & BigUint::one()).is_zero()
}

impl Logic {
    pub fn new(value: u64, bits: usize) -> Self {
        Self::new_big(BigUint::from(value), bits)
    }

    pub fn new_big(value: BigUint, bits: usize) -> Self {
        Self {
            bits,
            ones: value & mask(bits),
            xs: BigUint::zero(),
            zs: BigUint::zero(),
        }
    }

    pub fn from_planes(ones: BigUint, xs: BigUint, zs: BigUint, bits: usize) -> Self {
        let m = mask(bits);
        let xs = xs & &m;
        let zs = (zs & &m) & (&m ^ &xs); // X wins over Z
        let ones = (ones & &m) & ((&m ^ &xs) ^ &zs);
        Self { bits, ones, xs, zs }
    }

    pub fn zero(bits: usize) -> Self {
        Self::new(0, bits)
    }

    pub fn one(bits: usize) -> Self {
        Self::new(1, bits)
    }

    pub fn all_ones(bits: usize) -> Self {
        Self {
            bits,
            ones: mask(bits),
            xs: BigUint::zero(),
            zs: BigUint::zero(),
        }
    }

    pub fn all_x(bits: usize) -> Self {
        Self {
            bits,
            ones: BigUint::zero(),
            xs: mask(bits),
            zs: BigUint::zero(),
        }
    }

    pub fn all_z(bits: usize) -> Self {
        Self {
            bits,
            ones: BigUint::zero(),
            xs: BigUint::zero(),
            zs: mask(bits),
        }
    }

    /// Mask with ones in `[lsb, lsb + width)`.
    pub fn ones_range(lsb: usize, width: usize, bits: usize) -> Self {
        Self::new_big(mask(width) << lsb, bits)
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    fn zeros_plane(&self) -> BigUint {
        mask(self.bits) ^ (&self.ones | &self.xs | &self.zs)
    }

    pub fn has_unknown(&self) -> bool {
        !self.xs.is_zero() || !self.zs.is_zero()
    }

    /// The known two-state value, or `None` if any bit is X or Z.
    pub fn value(&self) -> Option<&BigUint> {
        if self.has_unknown() {
            None
        } else {
            Some(&self.ones)
        }
    }

    pub fn value_u64(&self) -> Option<u64> {
        self.value().and_then(|v| v.to_u64())
    }

    /// Signed interpretation of the known value.
    pub fn value_signed(&self) -> Option<BigInt> {
        let v = self.value()?;
        if self.bits > 0 && plane_bit(v, self.bits - 1) {
            Some(BigInt::from(v.clone()) - (BigInt::one() << self.bits))
        } else {
            Some(BigInt::from(v.clone()))
        }
    }

    pub fn bit(&self, index: usize) -> Bit {
        if index >= self.bits {
            return Bit::Zero;
        }
        if plane_bit(&self.xs, index) {
            Bit::X
        } else if plane_bit(&self.zs, index) {
            Bit::Z
        } else if plane_bit(&self.ones, index) {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    pub fn is_zero(&self) -> bool {
        !self.has_unknown() && self.ones.is_zero()
    }

    pub fn is_one(&self) -> bool {
        !self.has_unknown() && self.ones == BigUint::one()
    }

    pub fn is_all_ones(&self) -> bool {
        !self.has_unknown() && self.ones == mask(self.bits)
    }

    /// Known non-zero: at least one bit is a definite one.
    pub fn is_nonzero(&self) -> bool {
        !self.ones.is_zero()
    }

    /// If the value is an exact power of two, returns its bit position.
    pub fn pow2_bit(&self) -> Option<usize> {
        let v = self.value()?;
        if v.count_ones() == 1 {
            Some((v.bits() - 1) as usize)
        } else {
            None
        }
    }

    pub fn count_ones(&self) -> u64 {
        self.ones.count_ones()
    }

    /// Bits that may possibly be one: definite ones plus X and Z bits.
    pub fn maybe_ones(&self) -> Self {
        Self::new_big(&self.ones | &self.xs | &self.zs, self.bits)
    }

    /// Smallest width that still represents this value exactly.
    pub fn min_width(&self) -> usize {
        let top = (&self.ones | &self.xs | &self.zs).bits() as usize;
        top.max(1)
    }

    /// Exact four-state equality (the `===` operator, as a plain bool).
    pub fn case_equal(&self, other: &Self) -> bool {
        self.bits == other.bits
            && self.ones == other.ones
            && self.xs == other.xs
            && self.zs == other.zs
    }

    // ---------------------------------------------------------------------
    // Width changes

    pub fn trunc(&self, bits: usize) -> Self {
        let m = mask(bits);
        Self {
            bits,
            ones: &self.ones & &m,
            xs: &self.xs & &m,
            zs: &self.zs & &m,
        }
    }

    pub fn extend(&self, bits: usize) -> Self {
        debug_assert!(bits >= self.bits);
        Self {
            bits,
            ones: self.ones.clone(),
            xs: self.xs.clone(),
            zs: self.zs.clone(),
        }
    }

    pub fn extend_signed(&self, bits: usize) -> Self {
        debug_assert!(bits >= self.bits);
        if self.bits == 0 || bits == self.bits {
            return self.extend(bits);
        }
        let top = self.bit(self.bits - 1);
        let fill = mask(bits) ^ mask(self.bits);
        let mut out = self.extend(bits);
        match top {
            Bit::One => out.ones |= &fill,
            Bit::X => out.xs |= &fill,
            Bit::Z => out.zs |= &fill,
            Bit::Zero => {}
        }
        out
    }

    pub fn select(&self, lsb: usize, width: usize) -> Self {
        // Bits past the end of the value read as X.
        let shifted = Self {
            bits: self.bits.saturating_sub(lsb),
            ones: &self.ones >> lsb,
            xs: &self.xs >> lsb,
            zs: &self.zs >> lsb,
        };
        if shifted.bits >= width {
            shifted.trunc(width)
        } else {
            let fill = mask(width) ^ mask(shifted.bits);
            let mut out = shifted.trunc(width);
            out.bits = width;
            out.xs |= fill;
            out
        }
    }

    pub fn concat(&self, lsbs: &Self) -> Self {
        Self {
            bits: self.bits + lsbs.bits,
            ones: (&self.ones << lsbs.bits) | &lsbs.ones,
            xs: (&self.xs << lsbs.bits) | &lsbs.xs,
            zs: (&self.zs << lsbs.bits) | &lsbs.zs,
        }
    }

    pub fn replicate(&self, count: usize) -> Self {
        let mut out = Self::zero(0);
        for _ in 0..count {
            out = out.concat(self);
        }
        out
    }

    // ---------------------------------------------------------------------
    // Bitwise operations (per-bit four-state tables; Z behaves as X)

    pub fn not(&self) -> Self {
        Self {
            bits: self.bits,
            ones: self.zeros_plane(),
            xs: &self.xs | &self.zs,
            zs: BigUint::zero(),
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        debug_assert_eq!(self.bits, other.bits);
        let zeros = self.zeros_plane() | other.zeros_plane();
        let ones = &self.ones & &other.ones;
        let xs = mask(self.bits) ^ (&zeros | &ones);
        Self {
            bits: self.bits,
            ones,
            xs,
            zs: BigUint::zero(),
        }
    }

    pub fn or(&self, other: &Self) -> Self {
        debug_assert_eq!(self.bits, other.bits);
        let ones = &self.ones | &other.ones;
        let zeros = self.zeros_plane() & other.zeros_plane();
        let xs = mask(self.bits) ^ (&zeros | &ones);
        Self {
            bits: self.bits,
            ones,
            xs,
            zs: BigUint::zero(),
        }
    }

    pub fn xor(&self, other: &Self) -> Self {
        debug_assert_eq!(self.bits, other.bits);
        let xs = (&self.xs | &self.zs) | (&other.xs | &other.zs);
        let ones = (&self.ones ^ &other.ones) & (mask(self.bits) ^ &xs);
        Self {
            bits: self.bits,
            ones,
            xs,
            zs: BigUint::zero(),
        }
    }

    // ---------------------------------------------------------------------
    // Reductions (1-bit results)

    pub fn red_and(&self) -> Self {
        if !self.zeros_plane().is_zero() {
            Self::zero(1)
        } else if self.has_unknown() {
            Self::all_x(1)
        } else {
            Self::one(1)
        }
    }

    pub fn red_or(&self) -> Self {
        if self.is_nonzero() {
            Self::one(1)
        } else if self.has_unknown() {
            Self::all_x(1)
        } else {
            Self::zero(1)
        }
    }

    pub fn red_xor(&self) -> Self {
        if self.has_unknown() {
            Self::all_x(1)
        } else if self.ones.count_ones() % 2 == 1 {
            Self::one(1)
        } else {
            Self::zero(1)
        }
    }

    // ---------------------------------------------------------------------
    // Logical operations (truthiness: any definite one => true)

    fn truth(&self) -> Option<bool> {
        if self.is_nonzero() {
            Some(true)
        } else if self.has_unknown() {
            None
        } else {
            Some(false)
        }
    }

    fn from_truth(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::one(1),
            Some(false) => Self::zero(1),
            None => Self::all_x(1),
        }
    }

    pub fn log_not(&self) -> Self {
        Self::from_truth(self.truth().map(|b| !b))
    }

    pub fn log_and(&self, other: &Self) -> Self {
        let out = match (self.truth(), other.truth()) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        };
        Self::from_truth(out)
    }

    pub fn log_or(&self, other: &Self) -> Self {
        let out = match (self.truth(), other.truth()) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        };
        Self::from_truth(out)
    }

    // ---------------------------------------------------------------------
    // Arithmetic (whole-value X poisoning)

    fn wrap(value: BigInt, bits: usize) -> Self {
        let modulus = BigInt::one() << bits;
        let mut v = value % &modulus;
        if v.sign() == Sign::Minus {
            v += &modulus;
        }
        Self::new_big(v.to_biguint().unwrap_or_default(), bits)
    }

    pub fn negate(&self) -> Self {
        match self.value() {
            Some(v) => Self::wrap(-BigInt::from(v.clone()), self.bits),
            None => Self::all_x(self.bits),
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => Self::new_big(a + b, self.bits),
            _ => Self::all_x(self.bits),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => {
                Self::wrap(BigInt::from(a.clone()) - BigInt::from(b.clone()), self.bits)
            }
            _ => Self::all_x(self.bits),
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => Self::new_big(a * b, self.bits),
            _ => Self::all_x(self.bits),
        }
    }

    pub fn div_u(&self, other: &Self) -> Self {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) if !b.is_zero() => Self::new_big(a / b, self.bits),
            _ => Self::all_x(self.bits),
        }
    }

    pub fn div_s(&self, other: &Self) -> Self {
        match (self.value_signed(), other.value_signed()) {
            (Some(a), Some(b)) if !b.is_zero() => Self::wrap(a / b, self.bits),
            _ => Self::all_x(self.bits),
        }
    }

    pub fn mod_u(&self, other: &Self) -> Self {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) if !b.is_zero() => Self::new_big(a % b, self.bits),
            _ => Self::all_x(self.bits),
        }
    }

    pub fn mod_s(&self, other: &Self) -> Self {
        match (self.value_signed(), other.value_signed()) {
            (Some(a), Some(b)) if !b.is_zero() => Self::wrap(a % b, self.bits),
            _ => Self::all_x(self.bits),
        }
    }

    pub fn pow_u(&self, other: &Self) -> Self {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => {
                let modulus = BigUint::one() << self.bits;
                Self::new_big(a.modpow(b, &modulus), self.bits)
            }
            _ => Self::all_x(self.bits),
        }
    }

    // ---------------------------------------------------------------------
    // Shifts (shift amount already validated by the caller)

    pub fn shl(&self, amount: usize) -> Self {
        if amount >= self.bits {
            return Self::zero(self.bits);
        }
        let m = mask(self.bits);
        Self {
            bits: self.bits,
            ones: (&self.ones << amount) & &m,
            xs: (&self.xs << amount) & &m,
            zs: (&self.zs << amount) & &m,
        }
    }

    pub fn shr(&self, amount: usize) -> Self {
        Self {
            bits: self.bits,
            ones: &self.ones >> amount,
            xs: &self.xs >> amount,
            zs: &self.zs >> amount,
        }
    }

    pub fn shr_signed(&self, amount: usize) -> Self {
        if self.bits == 0 {
            return self.clone();
        }
        let top = self.bit(self.bits - 1);
        let amount = amount.min(self.bits);
        let fill = if amount == 0 {
            BigUint::zero()
        } else {
            mask(self.bits) ^ mask(self.bits - amount)
        };
        let mut out = self.shr(amount);
        match top {
            Bit::One => out.ones |= &fill,
            Bit::X => out.xs |= &fill,
            Bit::Z => out.zs |= &fill,
            Bit::Zero => {}
        }
        out
    }

    // ---------------------------------------------------------------------
    // Comparisons (1-bit results)

    pub fn eq(&self, other: &Self) -> Self {
        if self.has_unknown() || other.has_unknown() {
            Self::all_x(1)
        } else {
            Self::from_truth(Some(self.ones == other.ones))
        }
    }

    pub fn neq(&self, other: &Self) -> Self {
        self.eq(other).log_not()
    }

    pub fn eq_case(&self, other: &Self) -> Self {
        Self::from_truth(Some(self.case_equal(other)))
    }

    pub fn neq_case(&self, other: &Self) -> Self {
        Self::from_truth(Some(!self.case_equal(other)))
    }

    /// Wildcard equality: X/Z bits of `other` are don't-care positions.
    pub fn eq_wild(&self, other: &Self) -> Self {
        let care = mask(self.bits) ^ (&other.xs | &other.zs);
        let lhs = Self {
            bits: self.bits,
            ones: &self.ones & &care,
            xs: &self.xs & &care,
            zs: &self.zs & &care,
        };
        if lhs.has_unknown() {
            Self::all_x(1)
        } else {
            Self::from_truth(Some(lhs.ones == (&other.ones & &care)))
        }
    }

    pub fn neq_wild(&self, other: &Self) -> Self {
        self.eq_wild(other).log_not()
    }

    fn cmp_u(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn cmp_s(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self.value_signed(), other.value_signed()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }

    pub fn lt_u(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_u(other).map(|o| o == std::cmp::Ordering::Less))
    }

    pub fn lte_u(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_u(other).map(|o| o != std::cmp::Ordering::Greater))
    }

    pub fn gt_u(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_u(other).map(|o| o == std::cmp::Ordering::Greater))
    }

    pub fn gte_u(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_u(other).map(|o| o != std::cmp::Ordering::Less))
    }

    pub fn lt_s(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_s(other).map(|o| o == std::cmp::Ordering::Less))
    }

    pub fn lte_s(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_s(other).map(|o| o != std::cmp::Ordering::Greater))
    }

    pub fn gt_s(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_s(other).map(|o| o == std::cmp::Ordering::Greater))
    }

    pub fn gte_s(&self, other: &Self) -> Self {
        Self::from_truth(self.cmp_s(other).map(|o| o != std::cmp::Ordering::Less))
    }

    /// Bitwise merge for a conditional with an unknown condition: bits where
    /// both branches agree keep their value, all others become X.
    pub fn cond_merge(&self, other: &Self) -> Self {
        debug_assert_eq!(self.bits, other.bits);
        let same = !(self.has_unknown() || other.has_unknown());
        if same && self.ones == other.ones {
            return self.clone();
        }
        let agree_ones = &self.ones & &other.ones;
        let agree_zeros = self.zeros_plane() & other.zeros_plane();
        let xs = mask(self.bits) ^ (&agree_ones | &agree_zeros);
        Self {
            bits: self.bits,
            ones: agree_ones,
            xs,
            zs: BigUint::zero(),
        }
    }

    // ---------------------------------------------------------------------
    // Formatting for display substitution

    /// Render the value the way a formatted-print statement would for the
    /// given conversion letter.
    pub fn format_with(&self, letter: char) -> String {
        match letter {
            'b' => (0..self.bits.max(1))
                .rev()
                .map(|i| match self.bit(i) {
                    Bit::Zero => '0',
                    Bit::One => '1',
                    Bit::X => 'x',
                    Bit::Z => 'z',
                })
                .collect(),
            'o' => match self.value() {
                Some(v) => format!("{:o}", v),
                None => self.format_with('b'),
            },
            'h' | 'x' => match self.value() {
                Some(v) => format!("{:x}", v),
                None => self.format_with('b'),
            },
            'c' => match self.value_u64() {
                Some(v) => ((v & 0xff) as u8 as char).to_string(),
                None => "x".to_string(),
            },
            's' => match self.value() {
                Some(v) => v
                    .to_bytes_be()
                    .iter()
                    .filter(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect(),
                None => "x".to_string(),
            },
            _ => match self.value() {
                Some(v) => format!("{}", v),
                None => "x".to_string(),
            },
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_unknown() {
            write!(f, "{}'b{}", self.bits, self.format_with('b'))
        } else {
            write!(f, "{}'h{:x}", self.bits, self.ones)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_with_unknown_zero_dominates() {
        let zero = Logic::zero(4);
        let x = Logic::all_x(4);
        assert!(zero.and(&x).is_zero());
        assert!(x.and(&zero).is_zero());
    }

    #[test]
    fn or_with_unknown_one_dominates() {
        let ones = Logic::all_ones(4);
        let x = Logic::all_x(4);
        assert!(ones.or(&x).is_all_ones());
    }

    #[test]
    fn xor_with_unknown_poisons() {
        let v = Logic::new(0b1010, 4);
        let x = Logic::all_x(4);
        assert!(v.xor(&x).has_unknown());
    }

    #[test]
    fn add_wraps_at_width() {
        let a = Logic::new(0xff, 8);
        let b = Logic::new(1, 8);
        assert!(a.add(&b).is_zero());
    }

    #[test]
    fn sub_wraps_below_zero() {
        let a = Logic::new(0, 8);
        let b = Logic::new(1, 8);
        assert_eq!(a.sub(&b).value_u64(), Some(0xff));
    }

    #[test]
    fn div_by_zero_is_all_x() {
        let a = Logic::new(10, 8);
        let b = Logic::zero(8);
        assert!(a.div_u(&b).has_unknown());
        assert!(a.mod_u(&b).has_unknown());
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        let a = Logic::new(0xf9, 8); // -7
        let b = Logic::new(2, 8);
        assert_eq!(a.div_s(&b).value_signed(), Some((-3).into()));
        assert_eq!(a.mod_s(&b).value_signed(), Some((-1).into()));
    }

    #[test]
    fn select_past_end_reads_x() {
        let v = Logic::new(0xff, 8);
        let out = v.select(6, 4);
        assert_eq!(out.bit(0), Bit::One);
        assert_eq!(out.bit(1), Bit::One);
        assert_eq!(out.bit(2), Bit::X);
        assert_eq!(out.bit(3), Bit::X);
    }

    #[test]
    fn case_equality_distinguishes_x_and_z() {
        let x = Logic::all_x(2);
        let z = Logic::all_z(2);
        assert!(x.eq_case(&z).is_zero());
        assert!(x.eq_case(&x).is_one());
        // ordinary equality cannot decide
        assert!(x.eq(&x).has_unknown());
    }

    #[test]
    fn wildcard_equality_ignores_rhs_unknowns() {
        let v = Logic::new(0b1010, 4);
        let pattern = Logic::from_planes(
            BigUint::from(0b1000u8),
            BigUint::from(0b0011u8),
            BigUint::zero(),
            4,
        );
        assert!(v.eq_wild(&pattern).is_one());
    }

    #[test]
    fn arithmetic_shift_replicates_top_bit() {
        let v = Logic::new(0x80, 8);
        assert_eq!(v.shr_signed(3).value_u64(), Some(0xf0));
        let x = Logic::all_x(8);
        assert_eq!(x.shr_signed(3).bit(7), Bit::X);
    }

    #[test]
    fn reduction_tables() {
        let v = Logic::new(0b0110, 4);
        assert!(v.red_and().is_zero());
        assert!(v.red_or().is_one());
        assert!(v.red_xor().is_zero());
        let mixed = Logic::from_planes(
            BigUint::from(0b0001u8),
            BigUint::from(0b1000u8),
            BigUint::zero(),
            4,
        );
        // any definite one decides the OR, X decides nothing else
        assert!(mixed.red_or().is_one());
        assert!(mixed.red_and().is_zero()); // bit1/bit2 are definite zeros
        assert!(mixed.red_xor().has_unknown());
    }

    #[test]
    fn cond_merge_keeps_agreeing_bits() {
        let a = Logic::new(0b1100, 4);
        let b = Logic::new(0b1010, 4);
        let merged = a.cond_merge(&b);
        assert_eq!(merged.bit(3), Bit::One);
        assert_eq!(merged.bit(0), Bit::Zero);
        assert_eq!(merged.bit(1), Bit::X);
        assert_eq!(merged.bit(2), Bit::X);
    }

    #[test]
    fn pow2_detection() {
        assert_eq!(Logic::new(8, 16).pow2_bit(), Some(3));
        assert_eq!(Logic::new(6, 16).pow2_bit(), None);
        assert_eq!(Logic::all_x(16).pow2_bit(), None);
    }
}
