//! Exact sums of `f64` terms.
//!
//! [`ExactSum`] stores a sum as a signed multiword integer counting units of
//! `2^-SCALE`. Every finite `f64`, and the exact square of every finite `f64`,
//! is a whole number of such units, so adding a term never rounds. The stored
//! value is the true sum of its terms and does not depend on their order or
//! grouping. Rounding happens once, in [`ExactSum::to_f64`].
//!
//! The text form is a hexadecimal integer times a power of two, e.g. `0x3p1`
//! for 6 and `-0x1p-1` for -0.5.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Units are `2^-SCALE`. A multiple of 64 that covers the smallest square of
/// a subnormal `f64` (`2^-2148`).
const SCALE: i64 = 34 * 64;

/// Largest unit exponent accepted when parsing.
const MAX_BIT: i64 = 1 << 16;

/// Errors from parsing the text form of an [`ExactSum`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseExactSumError {
    #[error("expected `0` or `[-]0x<hex digits>p<exponent>`")]
    Syntax,

    #[error("exponent {exp} is out of range")]
    OutOfRange { exp: i64 },
}

/// Sum of `f64` terms, held without rounding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactSum {
    /// Index of `limbs[0]`. Limb `k` has weight `2^(64k - SCALE)`.
    offset: u32,
    /// Little-endian two's complement. Lowest limb nonzero, no redundant
    /// sign limb on top, empty for zero.
    limbs: Vec<u64>,
}

impl ExactSum {
    pub const ZERO: ExactSum = ExactSum {
        offset: 0,
        limbs: Vec::new(),
    };

    pub fn from_f64(x: f64) -> Self {
        let mut sum = Self::ZERO;
        sum.add(x);
        sum
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Add `x`. Non-finite terms are ignored.
    #[inline]
    pub fn add(&mut self, x: f64) {
        if let Some((negative, mantissa, exp)) = decompose(x) {
            self.add_scaled(negative, u128::from(mantissa), exp);
        }
    }

    /// Add `x * x`. Non-finite terms are ignored.
    #[inline]
    pub fn add_square(&mut self, x: f64) {
        if let Some((_, mantissa, exp)) = decompose(x) {
            let m = u128::from(mantissa);
            self.add_scaled(false, m * m, 2 * exp);
        }
    }

    /// `self += other`.
    #[inline]
    pub fn merge(&mut self, other: &ExactSum) {
        self.add_words(other.offset, &other.limbs, other.sign_fill());
    }

    /// `self -= other`.
    pub fn subtract(&mut self, other: &ExactSum) {
        if other.is_zero() {
            return;
        }
        let mut words = other.limbs.clone();
        let fill = negate(&mut words, other.sign_fill());
        self.add_words(other.offset, &words, fill);
    }

    /// Nearest `f64` (ties to even), `±inf` beyond the `f64` range.
    pub fn to_f64(&self) -> f64 {
        let Some(&top) = self.limbs.last() else {
            return 0.0;
        };
        let negative = top >> 63 == 1;
        // The lowest limb is nonzero, so negation never carries past it.
        let magnitude = |i: usize| -> u64 {
            let word = self.limbs[i];
            match (negative, i) {
                (false, _) => word,
                (true, 0) => word.wrapping_neg(),
                (true, _) => !word,
            }
        };
        let Some(t) = (0..self.limbs.len()).rev().find(|&i| magnitude(i) != 0) else {
            return 0.0;
        };

        // Top 64 significant bits, with every lower bit folded into bit 0.
        let lz = magnitude(t).leading_zeros();
        let next = if t > 0 { magnitude(t - 1) } else { 0 };
        let (mut bits, rest) = if lz == 0 {
            (magnitude(t), next)
        } else {
            ((magnitude(t) << lz) | (next >> (64 - lz)), next << lz)
        };
        let sticky = rest != 0 || (0..t.saturating_sub(1)).any(|i| magnitude(i) != 0);
        bits |= u64::from(sticky);

        let exp = 64 * (i64::from(self.offset) + t as i64) - i64::from(lz) - SCALE;
        let value = scale_by_pow2(bits as f64, exp);
        if negative {
            -value
        } else {
            value
        }
    }

    // ------------------------------------------------------------------------
    // Multiword arithmetic
    // ------------------------------------------------------------------------

    #[inline]
    fn sign_fill(&self) -> u64 {
        match self.limbs.last() {
            Some(&top) if top >> 63 == 1 => u64::MAX,
            _ => 0,
        }
    }

    /// Add `±magnitude · 2^exp`.
    fn add_scaled(&mut self, negative: bool, magnitude: u128, exp: i64) {
        if magnitude == 0 {
            return;
        }
        let bit = (exp + SCALE) as u64;
        let (limb, shift) = ((bit / 64) as u32, (bit % 64) as u32);
        let shifted = magnitude << shift;
        let mut words = [
            shifted as u64,
            (shifted >> 64) as u64,
            if shift == 0 {
                0
            } else {
                (magnitude >> (128 - shift)) as u64
            },
        ];
        let fill = if negative { negate(&mut words, 0) } else { 0 };
        self.add_words(limb, &words, fill);
    }

    /// Add the two's-complement value `words`, sign-extended with `fill`,
    /// starting at limb `at`.
    fn add_words(&mut self, at: u32, words: &[u64], fill: u64) {
        if fill == 0 && words.iter().all(|&w| w == 0) {
            return;
        }
        if self.limbs.is_empty() {
            self.offset = at;
        }
        // Cover both operands plus one limb of headroom so the sum cannot
        // overflow the window.
        let lo = self.offset.min(at);
        let hi = (self.offset + self.limbs.len() as u32).max(at + words.len() as u32) + 1;
        self.widen(lo, hi);

        let start = (at - self.offset) as usize;
        let mut carry = false;
        for (i, limb) in self.limbs[start..].iter_mut().enumerate() {
            let word = words.get(i).copied().unwrap_or(fill);
            let (partial, c1) = limb.overflowing_add(word);
            let (total, c2) = partial.overflowing_add(u64::from(carry));
            *limb = total;
            carry = c1 || c2;
        }
        self.normalize();
    }

    /// Grow the limb window to cover `[lo, hi)` without changing the value.
    fn widen(&mut self, lo: u32, hi: u32) {
        let fill = self.sign_fill();
        if lo < self.offset {
            let n = (self.offset - lo) as usize;
            self.limbs.splice(0..0, std::iter::repeat(0).take(n));
            self.offset = lo;
        }
        let len = (hi - self.offset) as usize;
        if len > self.limbs.len() {
            self.limbs.resize(len, fill);
        }
    }

    fn normalize(&mut self) {
        while self.limbs.len() >= 2 {
            let n = self.limbs.len();
            let (top, below) = (self.limbs[n - 1], self.limbs[n - 2]);
            let redundant = (top == 0 && below >> 63 == 0) || (top == u64::MAX && below >> 63 == 1);
            if !redundant {
                break;
            }
            self.limbs.pop();
        }
        let zeros = self.limbs.iter().take_while(|&&w| w == 0).count();
        if zeros == self.limbs.len() {
            self.limbs.clear();
            self.offset = 0;
            return;
        }
        self.limbs.drain(..zeros);
        self.offset += zeros as u32;
    }
}

/// `x = ±mantissa · 2^exp`, or `None` for zero and non-finite values.
#[inline]
fn decompose(x: f64) -> Option<(bool, u64, i64)> {
    if !x.is_finite() || x == 0.0 {
        return None;
    }
    let bits = x.to_bits();
    let negative = bits >> 63 == 1;
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    Some(if biased == 0 {
        (negative, fraction, -1074)
    } else {
        (negative, fraction | (1 << 52), biased - 1075)
    })
}

/// Two's-complement negation of a nonzero value in place. Returns the new
/// sign fill.
fn negate(words: &mut [u64], fill: u64) -> u64 {
    let mut carry = true;
    for word in words.iter_mut() {
        let (value, c) = (!*word).overflowing_add(u64::from(carry));
        *word = value;
        carry = c;
    }
    !fill
}

fn shift_right(words: &mut [u64], shift: u32) {
    if shift == 0 {
        return;
    }
    for i in 0..words.len() {
        let high = words.get(i + 1).map_or(0, |&w| w << (64 - shift));
        words[i] = (words[i] >> shift) | high;
    }
}

/// Requires a zero top word to receive the shifted-out bits.
fn shift_left(words: &mut [u64], shift: u32) {
    if shift == 0 {
        return;
    }
    for i in (0..words.len()).rev() {
        let low = if i > 0 { words[i - 1] >> (64 - shift) } else { 0 };
        words[i] = (words[i] << shift) | low;
    }
}

/// `x · 2^exp` in steps that keep the scale factor finite.
fn scale_by_pow2(mut x: f64, mut exp: i64) -> f64 {
    const STEP: i64 = 960;
    while exp > STEP && x.is_finite() {
        x *= 2f64.powi(STEP as i32);
        exp -= STEP;
    }
    while exp < -STEP && x != 0.0 {
        x *= 2f64.powi(-STEP as i32);
        exp += STEP;
    }
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    x * 2f64.powi(exp as i32)
}

// ============================================================================
// Text form
// ============================================================================

impl fmt::Display for ExactSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(&top) = self.limbs.last() else {
            return f.write_str("0");
        };
        let negative = top >> 63 == 1;
        let mut magnitude = self.limbs.clone();
        if negative {
            negate(&mut magnitude, u64::MAX);
        }
        // Odd integer part.
        let tz = magnitude[0].trailing_zeros();
        shift_right(&mut magnitude, tz);
        while magnitude.last() == Some(&0) {
            magnitude.pop();
        }
        let exp = 64 * i64::from(self.offset) + i64::from(tz) - SCALE;

        if negative {
            f.write_str("-")?;
        }
        f.write_str("0x")?;
        let mut words = magnitude.iter().rev();
        if let Some(first) = words.next() {
            write!(f, "{first:x}")?;
        }
        for word in words {
            write!(f, "{word:016x}")?;
        }
        write!(f, "p{exp}")
    }
}

impl FromStr for ExactSum {
    type Err = ParseExactSumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "0" {
            return Ok(Self::ZERO);
        }
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let body = body.strip_prefix("0x").ok_or(ParseExactSumError::Syntax)?;
        let (digits, exp) = body.split_once('p').ok_or(ParseExactSumError::Syntax)?;
        let exp: i64 = exp.parse().map_err(|_| ParseExactSumError::Syntax)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseExactSumError::Syntax);
        }

        // 16 hex digits per word, least significant word first.
        let mut words = digits
            .as_bytes()
            .rchunks(16)
            .map(|chunk| {
                std::str::from_utf8(chunk)
                    .ok()
                    .and_then(|hex| u64::from_str_radix(hex, 16).ok())
                    .ok_or(ParseExactSumError::Syntax)
            })
            .collect::<Result<Vec<u64>, _>>()?;
        if words.iter().all(|&w| w == 0) {
            return Ok(Self::ZERO);
        }

        let bit = exp
            .checked_add(SCALE)
            .filter(|bit| (0..MAX_BIT).contains(bit))
            .ok_or(ParseExactSumError::OutOfRange { exp })?;
        words.push(0);
        shift_left(&mut words, (bit % 64) as u32);
        let fill = if negative { negate(&mut words, 0) } else { 0 };

        let mut sum = Self::ZERO;
        sum.add_words((bit / 64) as u32, &words, fill);
        Ok(sum)
    }
}

impl Serialize for ExactSum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExactSum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
