//! Fixed-point scalar quantities.
//!
//! Resource amounts such as `cpus:0.1` accumulate over thousands of
//! allocate/unallocate cycles. Storing them as `f64` drifts, so a
//! [`Scalar`] keeps integer thousandths and only converts to floating
//! point at the edges (parsing, display, share ratios).

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of fixed-point units per whole scalar.
pub const SCALAR_PRECISION: i64 = 1000;

/// A scalar resource quantity with three decimal digits of precision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Scalar(i64);

impl Scalar {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(i64::MAX);

    /// Largest whole amount that converts without saturating.
    pub const MAX_WHOLE: i64 = i64::MAX / SCALAR_PRECISION;

    /// Convert from a float, rounding to the nearest thousandth.
    pub fn from_f64(value: f64) -> Self {
        Self((value * SCALAR_PRECISION as f64).round() as i64)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALAR_PRECISION as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Scalar) -> Option<Scalar> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Scalar) -> Option<Scalar> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Ratio of `self` to `total` as a float. Zero when `total` is not positive.
    pub fn ratio(self, total: Scalar) -> f64 {
        if total.0 <= 0 {
            return 0.0;
        }
        self.0 as f64 / total.0 as f64
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

// Operators saturate; callers that must detect overflow use the
// checked variants.

impl Add for Scalar {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Scalar {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Scalar {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Scalar {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Sum for Scalar {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % SCALAR_PRECISION == 0 {
            write!(f, "{}", self.0 / SCALAR_PRECISION)
        } else {
            write!(f, "{}", self.to_f64())
        }
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({self})")
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Scalar::from_f64)
    }
}
