//! Scalar resource quantities.
//!
//! A flat, name-sorted vector of `(name, Scalar)` pairs. Resource sets
//! carry only a handful of scalar names in practice (cpus, disk, gpus,
//! mem, plus a few custom ones), so a linear scan over a small vector
//! beats hashing, and keeping it sorted lets two maps be combined by a
//! single co-iteration.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use fair_core::{Resources, Scalar};

use crate::error::{SorterError, fatal};

#[derive(Clone, Default)]
pub struct ScalarQuantities {
    // Sorted by name, names unique.
    quantities: Vec<(String, Scalar)>,
}

impl ScalarQuantities {
    pub fn new() -> Self {
        Self {
            // [cpus, disk, gpus, mem]
            quantities: Vec::with_capacity(4),
        }
    }

    /// The stripped projection of `resources`: scalar amounts per name,
    /// with reservation and volume metadata dropped.
    pub fn from_resources(resources: &Resources) -> Self {
        let mut out = Self::new();
        for (name, amount) in resources.scalars() {
            *out.entry(name) += amount;
        }
        out
    }

    /// True if there is a positive amount of `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.quantities
            .iter()
            .find(|(n, _)| n == name)
            .is_some_and(|(_, q)| q.is_positive())
    }

    /// The stored amount of `name`. The entry must exist.
    pub fn at(&self, name: &str) -> Scalar {
        match self.quantities.iter().find(|(n, _)| n == name) {
            Some((_, q)) => *q,
            None => fatal(SorterError::MissingQuantity(name.to_string())),
        }
    }

    /// The stored amount of `name`, or zero.
    pub fn get(&self, name: &str) -> Scalar {
        self.quantities
            .iter()
            .find(|(n, _)| n == name)
            .map_or(Scalar::ZERO, |(_, q)| *q)
    }

    /// Mutable slot for `name`, inserting a zero entry in sorted position.
    pub fn entry(&mut self, name: &str) -> &mut Scalar {
        let mut idx = 0;
        while idx < self.quantities.len() {
            match self.quantities[idx].0.as_str().cmp(name) {
                Ordering::Less => idx += 1,
                Ordering::Equal => return &mut self.quantities[idx].1,
                Ordering::Greater => break,
            }
        }
        self.quantities.insert(idx, (name.to_string(), Scalar::ZERO));
        &mut self.quantities[idx].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Scalar)> {
        self.quantities.iter().map(|(n, q)| (n.as_str(), *q))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.quantities.iter().map(|(n, _)| n.as_str())
    }

    /// Number of stored entries, zero-valued ones included.
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    /// True if no entry holds a non-zero amount.
    pub fn is_empty(&self) -> bool {
        self.quantities.iter().all(|(_, q)| q.is_zero())
    }

    /// True if every amount in `self` is at most the amount in `other`.
    pub fn fits_within(&self, other: &ScalarQuantities) -> bool {
        self.combine(other, |a, b| a - b)
            .iter()
            .all(|(_, q)| !q.is_positive())
    }

    // Entrywise `op` over the union of names, missing entries as zero.
    // Zero results are dropped.
    fn combine(
        &self,
        other: &ScalarQuantities,
        op: impl Fn(Scalar, Scalar) -> Scalar,
    ) -> Vec<(String, Scalar)> {
        let mut out = Vec::with_capacity(self.quantities.len().max(other.quantities.len()));
        let (mut i, mut j) = (0, 0);
        loop {
            let (name, value) = match (self.quantities.get(i), other.quantities.get(j)) {
                (Some((a, x)), Some((b, y))) => match a.cmp(b) {
                    Ordering::Less => {
                        i += 1;
                        (a, op(*x, Scalar::ZERO))
                    }
                    Ordering::Greater => {
                        j += 1;
                        (b, op(Scalar::ZERO, *y))
                    }
                    Ordering::Equal => {
                        i += 1;
                        j += 1;
                        (a, op(*x, *y))
                    }
                },
                (Some((a, x)), None) => {
                    i += 1;
                    (a, op(*x, Scalar::ZERO))
                }
                (None, Some((b, y))) => {
                    j += 1;
                    (b, op(Scalar::ZERO, *y))
                }
                (None, None) => break,
            };
            if !value.is_zero() {
                out.push((name.clone(), value));
            }
        }
        out
    }
}

fn checked_add(lhs: Scalar, rhs: Scalar) -> Scalar {
    lhs.checked_add(rhs)
        .unwrap_or_else(|| fatal(SorterError::QuantityOverflow { lhs, rhs }))
}

fn checked_sub(lhs: Scalar, rhs: Scalar) -> Scalar {
    lhs.checked_sub(rhs)
        .unwrap_or_else(|| fatal(SorterError::QuantityOverflow { lhs, rhs }))
}

impl AddAssign<&ScalarQuantities> for ScalarQuantities {
    fn add_assign(&mut self, rhs: &ScalarQuantities) {
        self.quantities = self.combine(rhs, checked_add);
    }
}

impl SubAssign<&ScalarQuantities> for ScalarQuantities {
    fn sub_assign(&mut self, rhs: &ScalarQuantities) {
        self.quantities = self.combine(rhs, checked_sub);
    }
}

impl Add for &ScalarQuantities {
    type Output = ScalarQuantities;
    fn add(self, rhs: &ScalarQuantities) -> ScalarQuantities {
        ScalarQuantities {
            quantities: self.combine(rhs, checked_add),
        }
    }
}

impl Sub for &ScalarQuantities {
    type Output = ScalarQuantities;
    fn sub(self, rhs: &ScalarQuantities) -> ScalarQuantities {
        ScalarQuantities {
            quantities: self.combine(rhs, checked_sub),
        }
    }
}

impl PartialEq for ScalarQuantities {
    fn eq(&self, other: &Self) -> bool {
        self.combine(other, |a, b| a - b).is_empty()
    }
}

impl Eq for ScalarQuantities {}

impl<S: AsRef<str>> FromIterator<(S, Scalar)> for ScalarQuantities {
    fn from_iter<I: IntoIterator<Item = (S, Scalar)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (name, amount) in iter {
            *out.entry(name.as_ref()) += amount;
        }
        out
    }
}

impl fmt::Display for ScalarQuantities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, q)) in self.quantities.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}:{q}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for ScalarQuantities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarQuantities{self}")
    }
}
