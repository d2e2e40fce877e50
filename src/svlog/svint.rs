// Copyright (c) 2016-2020 Fabian Schuiki

//! Arbitrary-width four-state integers.
//!
//! This module implements the primary numeric type of the constant evaluator:
//! an integer of arbitrary bit width whose bits may each carry one of the four
//! values `0`, `1`, `x`, and `z`. The known bits are kept in a `BigInt`, with
//! a `BitVec` marking the positions that carry `x` or `z`. For a marked
//! position the corresponding value bit distinguishes `x` (0) from `z` (1).
//!
//! Arithmetic follows the SystemVerilog rules for unknown propagation: the
//! bitwise operators propagate unknowns per bit, while arithmetic, shifts by
//! unknown amounts, and comparisons collapse to all-`x` respectively `x`.

use bit_vec::BitVec;
use num::{BigInt, One, ToPrimitive, Zero};
use std::fmt;

/// A single four-state bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logic {
    Zero,
    One,
    X,
    Z,
}

impl Logic {
    /// Check whether this is an `x` or `z` bit.
    pub fn is_unknown(self) -> bool {
        match self {
            Logic::X | Logic::Z => true,
            _ => false,
        }
    }

    /// Logical negation. Unknown bits yield `x`.
    pub fn not(self) -> Logic {
        match self {
            Logic::Zero => Logic::One,
            Logic::One => Logic::Zero,
            _ => Logic::X,
        }
    }
}

impl From<bool> for Logic {
    fn from(b: bool) -> Logic {
        if b {
            Logic::One
        } else {
            Logic::Zero
        }
    }
}

/// An arbitrary-width four-state integer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SVInt {
    width: usize,
    signed: bool,
    value: BigInt,
    unknown: BitVec,
}

fn mask(width: usize) -> BigInt {
    (BigInt::one() << width) - BigInt::one()
}

fn get_bit(v: &BigInt, index: usize) -> bool {
    ((v >> index) & BigInt::one()) == BigInt::one()
}

fn set_bit(v: &mut BigInt, index: usize, bit: bool) {
    let current = get_bit(v, index);
    if current != bit {
        if bit {
            *v += BigInt::one() << index;
        } else {
            *v -= BigInt::one() << index;
        }
    }
}

impl SVInt {
    /// Create a new integer, truncating the value to `width` bits. Negative
    /// values wrap to their two's complement representation.
    pub fn new(width: usize, value: BigInt, signed: bool) -> SVInt {
        assert!(width > 0, "integer width must be positive");
        let m = mask(width);
        let value = ((value % (&m + BigInt::one())) + (&m + BigInt::one())) % (&m + BigInt::one());
        SVInt {
            width,
            signed,
            value,
            unknown: BitVec::from_elem(width, false),
        }
    }

    /// Create a new integer from a `u64`.
    pub fn from_u64(width: usize, value: u64, signed: bool) -> SVInt {
        SVInt::new(width, BigInt::from(value), signed)
    }

    /// Create a zero-valued integer.
    pub fn zero(width: usize, signed: bool) -> SVInt {
        SVInt::new(width, BigInt::zero(), signed)
    }

    /// Create an integer with all bits set to one.
    pub fn all_ones(width: usize, signed: bool) -> SVInt {
        SVInt::new(width, mask(width), signed)
    }

    /// Create an integer with all bits `x`.
    pub fn fill_x(width: usize, signed: bool) -> SVInt {
        SVInt {
            width,
            signed,
            value: BigInt::zero(),
            unknown: BitVec::from_elem(width, true),
        }
    }

    /// Create an integer with all bits `z`.
    pub fn fill_z(width: usize, signed: bool) -> SVInt {
        SVInt {
            width,
            signed,
            value: mask(width),
            unknown: BitVec::from_elem(width, true),
        }
    }

    /// Create a one-bit integer from a logic value.
    pub fn from_logic(logic: Logic) -> SVInt {
        let mut v = SVInt::zero(1, false);
        v.set_bit(0, logic);
        v
    }

    /// Create a one-bit integer from a boolean.
    pub fn from_bool(b: bool) -> SVInt {
        SVInt::from_logic(Logic::from(b))
    }

    /// The width of this integer in bits.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether this integer participates in signed arithmetic.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Whether any bit is `x` or `z`.
    pub fn has_unknown(&self) -> bool {
        self.unknown.any()
    }

    /// Get the four-state value of a single bit.
    pub fn bit(&self, index: usize) -> Logic {
        if index >= self.width {
            return Logic::X;
        }
        let v = get_bit(&self.value, index);
        if self.unknown.get(index).unwrap_or(false) {
            if v {
                Logic::Z
            } else {
                Logic::X
            }
        } else {
            Logic::from(v)
        }
    }

    /// Set the four-state value of a single bit.
    pub fn set_bit(&mut self, index: usize, logic: Logic) {
        assert!(index < self.width);
        match logic {
            Logic::Zero => {
                set_bit(&mut self.value, index, false);
                self.unknown.set(index, false);
            }
            Logic::One => {
                set_bit(&mut self.value, index, true);
                self.unknown.set(index, false);
            }
            Logic::X => {
                set_bit(&mut self.value, index, false);
                self.unknown.set(index, true);
            }
            Logic::Z => {
                set_bit(&mut self.value, index, true);
                self.unknown.set(index, true);
            }
        }
    }

    /// Interpret the known bits as a signed or unsigned number, depending on
    /// the integer's signedness.
    fn interp(&self) -> BigInt {
        if self.signed && self.width > 0 && get_bit(&self.value, self.width - 1) {
            &self.value - (BigInt::one() << self.width)
        } else {
            self.value.clone()
        }
    }

    /// Convert to an `i64` if the value is fully known and fits.
    pub fn as_i64(&self) -> Option<i64> {
        if self.has_unknown() {
            return None;
        }
        self.interp().to_i64()
    }

    /// Convert to an `i32` if the value is fully known and fits.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| {
            if v >= i32::min_value() as i64 && v <= i32::max_value() as i64 {
                Some(v as i32)
            } else {
                None
            }
        })
    }

    /// Convert to a `usize` if the value is fully known, non-negative, and
    /// fits.
    pub fn as_usize(&self) -> Option<usize> {
        if self.has_unknown() {
            return None;
        }
        self.interp().to_usize()
    }

    /// The truthiness of this integer: true if any bit is a known one, `x` if
    /// no bit is one but some are unknown, false otherwise.
    pub fn as_logic(&self) -> Logic {
        for i in 0..self.width {
            if let Logic::One = self.bit(i) {
                return Logic::One;
            }
        }
        if self.has_unknown() {
            Logic::X
        } else {
            Logic::Zero
        }
    }

    /// Check whether the value is known to be non-zero.
    pub fn is_true(&self) -> bool {
        self.as_logic() == Logic::One
    }

    /// Check whether the value is known to be zero.
    pub fn is_false(&self) -> bool {
        self.as_logic() == Logic::Zero
    }

    /// Change the signedness without altering the bit pattern.
    pub fn with_signed(mut self, signed: bool) -> SVInt {
        self.signed = signed;
        self
    }

    /// Resize to a new width. Truncates or extends; extension replicates the
    /// sign bit (including its unknown state) for signed values and inserts
    /// zeroes for unsigned ones.
    pub fn resize(&self, width: usize) -> SVInt {
        assert!(width > 0);
        if width == self.width {
            return self.clone();
        }
        let mut result = SVInt::zero(width, self.signed);
        if width < self.width {
            for i in 0..width {
                result.set_bit(i, self.bit(i));
            }
        } else {
            for i in 0..self.width {
                result.set_bit(i, self.bit(i));
            }
            let ext = if self.signed {
                self.bit(self.width - 1)
            } else {
                Logic::Zero
            };
            for i in self.width..width {
                result.set_bit(i, ext);
            }
        }
        result
    }

    fn common_width(&self, other: &SVInt) -> usize {
        std::cmp::max(self.width, other.width)
    }

    fn common_signed(&self, other: &SVInt) -> bool {
        self.signed && other.signed
    }

    /// Addition. Unknown operand bits yield an all-`x` result.
    pub fn add(&self, other: &SVInt) -> SVInt {
        self.arith(other, |a, b| a + b)
    }

    /// Subtraction.
    pub fn sub(&self, other: &SVInt) -> SVInt {
        self.arith(other, |a, b| a - b)
    }

    /// Multiplication.
    pub fn mul(&self, other: &SVInt) -> SVInt {
        self.arith(other, |a, b| a * b)
    }

    /// Division. Division by zero yields all-`x`.
    pub fn div(&self, other: &SVInt) -> SVInt {
        let w = self.common_width(other);
        let s = self.common_signed(other);
        if self.has_unknown() || other.has_unknown() || other.value.is_zero() {
            return SVInt::fill_x(w, s);
        }
        self.arith(other, |a, b| a / b)
    }

    /// Remainder. The result takes the sign of the dividend.
    pub fn rem(&self, other: &SVInt) -> SVInt {
        let w = self.common_width(other);
        let s = self.common_signed(other);
        if self.has_unknown() || other.has_unknown() || other.value.is_zero() {
            return SVInt::fill_x(w, s);
        }
        self.arith(other, |a, b| a % b)
    }

    fn arith<F>(&self, other: &SVInt, f: F) -> SVInt
    where
        F: FnOnce(BigInt, BigInt) -> BigInt,
    {
        let w = self.common_width(other);
        let s = self.common_signed(other);
        if self.has_unknown() || other.has_unknown() {
            return SVInt::fill_x(w, s);
        }
        let l = self.resize(w).with_signed(s);
        let r = other.resize(w).with_signed(s);
        SVInt::new(w, f(l.interp(), r.interp()), s)
    }

    /// Arithmetic negation.
    pub fn neg(&self) -> SVInt {
        if self.has_unknown() {
            return SVInt::fill_x(self.width, self.signed);
        }
        SVInt::new(self.width, -self.interp(), self.signed)
    }

    /// Bitwise complement. `x` and `z` bits yield `x`.
    pub fn not(&self) -> SVInt {
        let mut result = SVInt::zero(self.width, self.signed);
        for i in 0..self.width {
            result.set_bit(i, self.bit(i).not());
        }
        result
    }

    fn bitwise<F>(&self, other: &SVInt, f: F) -> SVInt
    where
        F: Fn(Logic, Logic) -> Logic,
    {
        let w = self.common_width(other);
        let s = self.common_signed(other);
        let l = self.resize(w);
        let r = other.resize(w);
        let mut result = SVInt::zero(w, s);
        for i in 0..w {
            result.set_bit(i, f(l.bit(i), r.bit(i)));
        }
        result
    }

    /// Bitwise and.
    pub fn and(&self, other: &SVInt) -> SVInt {
        self.bitwise(other, |a, b| match (a, b) {
            (Logic::Zero, _) | (_, Logic::Zero) => Logic::Zero,
            (Logic::One, Logic::One) => Logic::One,
            _ => Logic::X,
        })
    }

    /// Bitwise or.
    pub fn or(&self, other: &SVInt) -> SVInt {
        self.bitwise(other, |a, b| match (a, b) {
            (Logic::One, _) | (_, Logic::One) => Logic::One,
            (Logic::Zero, Logic::Zero) => Logic::Zero,
            _ => Logic::X,
        })
    }

    /// Bitwise xor.
    pub fn xor(&self, other: &SVInt) -> SVInt {
        self.bitwise(other, |a, b| {
            if a.is_unknown() || b.is_unknown() {
                Logic::X
            } else {
                Logic::from(a != b)
            }
        })
    }

    /// Bitwise xnor.
    pub fn xnor(&self, other: &SVInt) -> SVInt {
        self.xor(other).not()
    }

    /// Logical shift left. Unknown shift amounts yield all-`x`.
    pub fn shl(&self, amount: &SVInt) -> SVInt {
        let n = match amount.as_usize() {
            Some(n) => n,
            None => return SVInt::fill_x(self.width, self.signed),
        };
        let mut result = SVInt::zero(self.width, self.signed);
        for i in n..self.width {
            result.set_bit(i, self.bit(i - n));
        }
        result
    }

    /// Logical shift right.
    pub fn lshr(&self, amount: &SVInt) -> SVInt {
        let n = match amount.as_usize() {
            Some(n) => n,
            None => return SVInt::fill_x(self.width, self.signed),
        };
        let mut result = SVInt::zero(self.width, self.signed);
        for i in 0..self.width.saturating_sub(n) {
            result.set_bit(i, self.bit(i + n));
        }
        result
    }

    /// Arithmetic shift right. Fills with the sign bit for signed values.
    pub fn ashr(&self, amount: &SVInt) -> SVInt {
        let n = match amount.as_usize() {
            Some(n) => n,
            None => return SVInt::fill_x(self.width, self.signed),
        };
        let fill = if self.signed {
            self.bit(self.width - 1)
        } else {
            Logic::Zero
        };
        let mut result = SVInt::zero(self.width, self.signed);
        for i in 0..self.width {
            let src = i + n;
            result.set_bit(i, if src < self.width { self.bit(src) } else { fill });
        }
        result
    }

    fn compare(&self, other: &SVInt) -> Option<std::cmp::Ordering> {
        if self.has_unknown() || other.has_unknown() {
            return None;
        }
        let w = self.common_width(other);
        let s = self.common_signed(other);
        let l = self.resize(w).with_signed(s).interp();
        let r = other.resize(w).with_signed(s).interp();
        Some(l.cmp(&r))
    }

    /// Logical equality. Unknown bits yield `x`.
    pub fn logic_eq(&self, other: &SVInt) -> Logic {
        match self.compare(other) {
            Some(ord) => Logic::from(ord == std::cmp::Ordering::Equal),
            None => Logic::X,
        }
    }

    /// Logical inequality.
    pub fn logic_ne(&self, other: &SVInt) -> Logic {
        self.logic_eq(other).not()
    }

    /// Relational comparison. Unknown bits yield `x`.
    pub fn logic_cmp(&self, other: &SVInt, allow: fn(std::cmp::Ordering) -> bool) -> Logic {
        match self.compare(other) {
            Some(ord) => Logic::from(allow(ord)),
            None => Logic::X,
        }
    }

    /// Case equality: `x` and `z` are treated as ordinary values and must
    /// match exactly.
    pub fn case_eq(&self, other: &SVInt) -> bool {
        let w = self.common_width(other);
        let l = self.resize(w);
        let r = other.resize(w);
        (0..w).all(|i| l.bit(i) == r.bit(i))
    }

    /// Wildcard equality: `x` and `z` bits in `other` are don't-care. Unknown
    /// bits of `self` at positions that are cared about yield `x`.
    pub fn wildcard_eq(&self, other: &SVInt) -> Logic {
        let w = self.common_width(other);
        let l = self.resize(w);
        let r = other.resize(w);
        let mut result = Logic::One;
        for i in 0..w {
            let rb = r.bit(i);
            if rb.is_unknown() {
                continue;
            }
            let lb = l.bit(i);
            if lb.is_unknown() {
                result = Logic::X;
            } else if lb != rb {
                return Logic::Zero;
            }
        }
        result
    }

    /// And-reduction over all bits.
    pub fn reduction_and(&self) -> Logic {
        let mut unknown = false;
        for i in 0..self.width {
            match self.bit(i) {
                Logic::Zero => return Logic::Zero,
                Logic::One => (),
                _ => unknown = true,
            }
        }
        if unknown {
            Logic::X
        } else {
            Logic::One
        }
    }

    /// Or-reduction over all bits.
    pub fn reduction_or(&self) -> Logic {
        let mut unknown = false;
        for i in 0..self.width {
            match self.bit(i) {
                Logic::One => return Logic::One,
                Logic::Zero => (),
                _ => unknown = true,
            }
        }
        if unknown {
            Logic::X
        } else {
            Logic::Zero
        }
    }

    /// Xor-reduction over all bits.
    pub fn reduction_xor(&self) -> Logic {
        let mut parity = false;
        for i in 0..self.width {
            match self.bit(i) {
                Logic::One => parity = !parity,
                Logic::Zero => (),
                _ => return Logic::X,
            }
        }
        Logic::from(parity)
    }

    /// Exponentiation per the SystemVerilog power operator table.
    pub fn pow(&self, other: &SVInt) -> SVInt {
        let w = self.width;
        let s = self.common_signed(other);
        if self.has_unknown() || other.has_unknown() {
            return SVInt::fill_x(w, s);
        }
        let base = self.interp();
        let exp = other.interp();
        if exp < BigInt::zero() {
            // Negative exponents only have defined results for -1, 0, and 1.
            let result = if base == BigInt::one() {
                BigInt::one()
            } else if base == -BigInt::one() {
                if (&exp % 2u8).is_zero() {
                    BigInt::one()
                } else {
                    -BigInt::one()
                }
            } else if base.is_zero() {
                return SVInt::fill_x(w, s);
            } else {
                BigInt::zero()
            };
            return SVInt::new(w, result, s);
        }
        // Square-and-multiply, masking each step to keep the numbers small.
        let modulus = BigInt::one() << w;
        let mut result = BigInt::one();
        let mut base = ((base % &modulus) + &modulus) % &modulus;
        let mut exp = exp;
        while exp > BigInt::zero() {
            if !((&exp % 2u8).is_zero()) {
                result = (result * &base) % &modulus;
            }
            base = (&base * &base) % &modulus;
            exp = exp >> 1;
        }
        SVInt::new(w, result, s)
    }

    /// Extract the bits `hi` down to `lo`, inclusive.
    pub fn slice(&self, hi: usize, lo: usize) -> SVInt {
        assert!(hi >= lo);
        let mut result = SVInt::zero(hi - lo + 1, false);
        for i in lo..=hi {
            result.set_bit(i - lo, self.bit(i));
        }
        result
    }

    /// Replace the bits `hi` down to `lo` with the given value.
    pub fn set_slice(&mut self, hi: usize, lo: usize, value: &SVInt) {
        assert!(hi >= lo && hi < self.width);
        for i in lo..=hi {
            self.set_bit(i, value.bit(i - lo));
        }
    }

    /// Concatenate values, with the first operand forming the most significant
    /// bits.
    pub fn concat<I>(operands: I) -> SVInt
    where
        I: IntoIterator<Item = SVInt>,
    {
        let operands: Vec<_> = operands.into_iter().collect();
        let width: usize = operands.iter().map(|v| v.width).sum();
        let mut result = SVInt::zero(std::cmp::max(width, 1), false);
        let mut offset = width;
        for op in &operands {
            offset -= op.width;
            for i in 0..op.width {
                result.set_bit(offset + i, op.bit(i));
            }
        }
        result
    }

    /// Replicate this value `count` times.
    pub fn replicate(&self, count: usize) -> SVInt {
        SVInt::concat(std::iter::repeat(self.clone()).take(count))
    }

    /// Merge two values under an unknown predicate: positions where both
    /// agree keep their value, all others become `x`.
    pub fn conditional_merge(left: &SVInt, right: &SVInt) -> SVInt {
        let w = std::cmp::max(left.width, right.width);
        let s = left.signed && right.signed;
        let l = left.resize(w);
        let r = right.resize(w);
        let mut result = SVInt::zero(w, s);
        for i in 0..w {
            let (a, b) = (l.bit(i), r.bit(i));
            result.set_bit(
                i,
                if a == b && !a.is_unknown() {
                    a
                } else {
                    Logic::X
                },
            );
        }
        result
    }
}

impl fmt::Display for SVInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.has_unknown() {
            write!(f, "{}'b", self.width)?;
            for i in (0..self.width).rev() {
                let c = match self.bit(i) {
                    Logic::Zero => '0',
                    Logic::One => '1',
                    Logic::X => 'x',
                    Logic::Z => 'z',
                };
                write!(f, "{}", c)?;
            }
            Ok(())
        } else {
            write!(f, "{}", self.interp())
        }
    }
}

impl fmt::Debug for SVInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}'{}{}", self.width, if self.signed { "s" } else { "" }, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(width: usize, value: u64) -> SVInt {
        SVInt::from_u64(width, value, false)
    }

    #[test]
    fn basic_arith() {
        assert_eq!(v(8, 30).add(&v(8, 12)), v(8, 42));
        assert_eq!(v(8, 200).add(&v(8, 100)), v(8, 44));
        assert_eq!(v(8, 5).sub(&v(8, 7)), v(8, 254));
        assert_eq!(v(8, 7).mul(&v(8, 6)), v(8, 42));
        assert_eq!(v(8, 42).div(&v(8, 5)), v(8, 8));
        assert_eq!(v(8, 42).rem(&v(8, 5)), v(8, 2));
    }

    #[test]
    fn signed_arith() {
        let a = SVInt::new(8, BigInt::from(-6), true);
        let b = SVInt::new(8, BigInt::from(4), true);
        assert_eq!(a.div(&b).as_i64(), Some(-1));
        assert_eq!(a.rem(&b).as_i64(), Some(-2));
        assert_eq!(a.add(&b).as_i64(), Some(-2));
    }

    #[test]
    fn unknown_propagation() {
        let x = SVInt::fill_x(8, false);
        assert!(v(8, 1).add(&x).has_unknown());
        assert_eq!(v(8, 1).div(&v(8, 0)).has_unknown(), true);
        assert_eq!(v(8, 3).logic_eq(&x), Logic::X);
    }

    #[test]
    fn bitwise_partial_unknown() {
        // 4'b10x0 & 4'b1100 == 4'b1000
        let mut a = v(4, 0b1000);
        a.set_bit(1, Logic::X);
        let b = v(4, 0b1100);
        let r = a.and(&b);
        assert_eq!(r, v(4, 0b1000));
    }

    #[test]
    fn case_and_wildcard_equality() {
        let mut a = v(4, 0b1010);
        a.set_bit(0, Logic::X);
        let mut b = v(4, 0b1010);
        b.set_bit(0, Logic::X);
        assert!(a.case_eq(&b));
        let mut pat = v(4, 0b1010);
        pat.set_bit(0, Logic::Z);
        assert_eq!(v(4, 0b1011).wildcard_eq(&pat), Logic::One);
        assert_eq!(v(4, 0b0011).wildcard_eq(&pat), Logic::Zero);
    }

    #[test]
    fn shifts() {
        assert_eq!(v(8, 0b1011).shl(&v(8, 2)), v(8, 0b101100));
        assert_eq!(v(8, 0b1011).lshr(&v(8, 2)), v(8, 0b10));
        let a = SVInt::new(8, BigInt::from(-8), true);
        assert_eq!(a.ashr(&v(8, 2)).as_i64(), Some(-2));
    }

    #[test]
    fn concat_replicate_slice() {
        let c = SVInt::concat(vec![v(4, 0b1010), v(4, 0b0101)]);
        assert_eq!(c, v(8, 0b10100101));
        assert_eq!(v(2, 0b10).replicate(3), v(6, 0b101010));
        assert_eq!(c.slice(7, 4), v(4, 0b1010));
    }

    #[test]
    fn resize_extends_sign() {
        let a = SVInt::new(4, BigInt::from(-3), true);
        assert_eq!(a.resize(8).as_i64(), Some(-3));
        let b = v(4, 0b1101);
        assert_eq!(b.resize(8), v(8, 0b1101));
    }

    #[test]
    fn power_operator() {
        assert_eq!(v(32, 2).pow(&v(32, 10)), v(32, 1024));
        let minus_one = SVInt::new(8, BigInt::from(-1), true);
        let minus_three = SVInt::new(8, BigInt::from(-3), true);
        assert_eq!(minus_one.pow(&minus_three).as_i64(), Some(-1));
    }
}
