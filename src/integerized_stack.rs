//! IntegerizedStack: a stack of naturals packed into a single natural.
//!
//! Two bijective pairing functions are provided:
//! - Rosenberg–Strong pairing, `rs_encode(x, y) = m(m+1) + x - y` with `m = max(x, y)`,
//!   used to pack an arbitrarily long right-associated sequence
//! - modulus pairing, `mod_encode(x, y, k) = x + y*k` for `x < k`, used when the
//!   range of `x` is known exactly (e.g. a rule count)
//!
//! All arithmetic is checked; a value that would not fit in `u64` is reported as
//! [`StackError::Overflow`] rather than wrapping.

use std::fmt;

/// Natural number type used for enumeration codes.
pub type EnumerationCode = u64;

/// Errors from integerized stack arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Encoding would exceed the `u64` range
    Overflow,
    /// Modulus pairing requires `x < k` and `k > 0`
    OutOfRange { x: EnumerationCode, k: EnumerationCode },
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "Integerized stack overflow"),
            Self::OutOfRange { x, k } => {
                write!(f, "Modulus pairing out of range: {} is not below {}", x, k)
            }
        }
    }
}

impl std::error::Error for StackError {}

/// Floor of the square root, exact for every `u64`.
pub fn isqrt(z: u64) -> u64 {
    if z < 2 {
        return z;
    }
    // Float estimate, then correct by at most a few steps.
    let mut r = (z as f64).sqrt() as u64;
    while r.checked_mul(r).map_or(true, |sq| sq > z) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).map_or(false, |sq| sq <= z) {
        r += 1;
    }
    r
}

/// Rosenberg–Strong pairing of `(x, y)`.
pub fn rs_encode(x: u64, y: u64) -> Result<u64, StackError> {
    let m = x.max(y);
    m.checked_add(1)
        .and_then(|m1| m.checked_mul(m1))
        .and_then(|v| v.checked_add(x))
        .map(|v| v - y)
        .ok_or(StackError::Overflow)
}

/// Inverse of [`rs_encode`].
pub fn rs_decode(z: u64) -> (u64, u64) {
    let m = isqrt(z);
    let d = z - m * m;
    if d < m {
        (d, m)
    } else {
        // z <= m^2 + 2m here, so m(m+2) - z cannot underflow.
        (m, m * (m + 2) - z)
    }
}

/// Modulus pairing of `x` (drawn from `[0, k)`) with `y`.
pub fn mod_encode(x: u64, y: u64, k: u64) -> Result<u64, StackError> {
    if k == 0 || x >= k {
        return Err(StackError::OutOfRange { x, k });
    }
    y.checked_mul(k)
        .and_then(|v| v.checked_add(x))
        .ok_or(StackError::Overflow)
}

/// Inverse of [`mod_encode`]; `k` must be nonzero.
pub fn mod_decode(z: u64, k: u64) -> Result<(u64, u64), StackError> {
    if k == 0 {
        return Err(StackError::OutOfRange { x: z, k });
    }
    Ok((z % k, z / k))
}

/// A stack of naturals stored as one natural.
///
/// `push(x)` pairs `x` with the current value; `pop()` unpairs it. A freshly
/// constructed stack holding `z` can be popped indefinitely, which is what makes
/// the enumeration of trees total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntegerizedStack {
    value: u64,
}

impl IntegerizedStack {
    pub fn new(value: u64) -> Self {
        Self { value }
    }

    /// Current packed value
    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn set_value(&mut self, value: u64) {
        self.value = value;
    }

    /// Pop the next value (Rosenberg–Strong).
    pub fn pop(&mut self) -> u64 {
        let (x, rest) = rs_decode(self.value);
        self.value = rest;
        x
    }

    /// Push `x` onto the stack (Rosenberg–Strong).
    pub fn push(&mut self, x: u64) -> Result<(), StackError> {
        self.value = rs_encode(x, self.value)?;
        Ok(())
    }

    /// Pop a value known to lie in `[0, k)`.
    pub fn mod_pop(&mut self, k: u64) -> Result<u64, StackError> {
        let (x, rest) = mod_decode(self.value, k)?;
        self.value = rest;
        Ok(x)
    }

    /// Push a value drawn from `[0, k)`.
    pub fn mod_push(&mut self, x: u64, k: u64) -> Result<(), StackError> {
        self.value = mod_encode(x, self.value, k)?;
        Ok(())
    }

    /// Split the remaining value into `n` parts: `n - 1` pops followed by the
    /// remainder, so that every `n`-tuple of naturals is reached exactly once.
    pub fn split(&mut self, n: usize) -> Vec<u64> {
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }
        for _ in 0..n - 1 {
            out.push(self.pop());
        }
        out.push(self.value);
        self.value = 0;
        out
    }

    /// Add `x` to the packed value.
    pub fn add(&mut self, x: u64) -> Result<(), StackError> {
        self.value = self.value.checked_add(x).ok_or(StackError::Overflow)?;
        Ok(())
    }

    /// Subtract `x` from the packed value.
    pub fn subtract(&mut self, x: u64) -> Result<(), StackError> {
        self.value = self.value.checked_sub(x).ok_or(StackError::Overflow)?;
        Ok(())
    }
}

impl fmt::Display for IntegerizedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntegerizedStack({})", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt_boundaries() {
        for n in 0u64..2000 {
            let r = isqrt(n);
            assert!(r * r <= n && (r + 1) * (r + 1) > n, "isqrt({}) = {}", n, r);
        }
        assert_eq!(isqrt(u64::MAX), 4_294_967_295);
    }

    #[test]
    fn test_rs_first_codes() {
        // Shell order of Rosenberg–Strong: (0,0), (0,1), (1,1), (1,0), (0,2), ...
        assert_eq!(rs_decode(0), (0, 0));
        assert_eq!(rs_decode(1), (0, 1));
        assert_eq!(rs_decode(2), (1, 1));
        assert_eq!(rs_decode(3), (1, 0));
        assert_eq!(rs_decode(4), (0, 2));
    }

    #[test]
    fn test_rs_roundtrip() {
        for x in 0..60 {
            for y in 0..60 {
                let z = rs_encode(x, y).expect("small values fit");
                assert_eq!(rs_decode(z), (x, y));
            }
        }
        for z in 0..5000 {
            let (x, y) = rs_decode(z);
            assert_eq!(rs_encode(x, y), Ok(z));
        }
    }

    #[test]
    fn test_mod_roundtrip() {
        for k in 1..8 {
            for x in 0..k {
                for y in 0..30 {
                    let z = mod_encode(x, y, k).expect("small values fit");
                    assert_eq!(mod_decode(z, k), Ok((x, y)));
                }
            }
        }
    }

    #[test]
    fn test_mod_encode_rejects_out_of_range() {
        assert_eq!(mod_encode(3, 1, 3), Err(StackError::OutOfRange { x: 3, k: 3 }));
        assert!(mod_decode(5, 0).is_err());
    }

    #[test]
    fn test_encode_overflow_detected() {
        assert_eq!(rs_encode(u64::MAX, 0), Err(StackError::Overflow));
        assert_eq!(mod_encode(1, u64::MAX, 2), Err(StackError::Overflow));
    }

    #[test]
    fn test_push_pop_identity() {
        let mut s = IntegerizedStack::new(17);
        s.push(5).unwrap();
        s.push(0).unwrap();
        assert_eq!(s.pop(), 0);
        assert_eq!(s.pop(), 5);
        assert_eq!(s.get_value(), 17);

        s.mod_push(2, 7).unwrap();
        assert_eq!(s.mod_pop(7), Ok(2));
        assert_eq!(s.get_value(), 17);
    }

    #[test]
    fn test_split_is_inverse_of_pushes() {
        let mut s = IntegerizedStack::new(9);
        s.push(4).unwrap();
        s.push(1).unwrap();
        assert_eq!(s.split(3), vec![1, 4, 9]);
        assert_eq!(s.get_value(), 0);
    }
}
