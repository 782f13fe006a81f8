//! DiscreteDistribution: values weighted by accumulated log-probability mass.
//!
//! Adding mass to a value already present combines the two with `logplusexp`, so
//! the stored number is always `log Σ p` over every path that produced the value.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use itertools::Itertools;

use crate::numerics::{logplusexp, logsumexp};

/// Map from outcome to log mass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteDistribution<T: Ord> {
    m: BTreeMap<T, f64>,
}

impl<T: Ord> Default for DiscreteDistribution<T> {
    fn default() -> Self {
        Self { m: BTreeMap::new() }
    }
}

impl<T: Ord> DiscreteDistribution<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `lp` of log mass to `x`.
    pub fn add_mass(&mut self, x: T, lp: f64) {
        self.m
            .entry(x)
            .and_modify(|v| *v = logplusexp(*v, lp))
            .or_insert(lp);
    }

    /// Log mass of `x`, if present.
    pub fn get(&self, x: &T) -> Option<f64> {
        self.m.get(x).copied()
    }

    /// Log mass of `x`, or `default` if absent.
    pub fn get_or(&self, x: &T, default: f64) -> f64 {
        self.get(x).unwrap_or(default)
    }

    pub fn contains(&self, x: &T) -> bool {
        self.m.contains_key(x)
    }

    pub fn remove(&mut self, x: &T) -> Option<f64> {
        self.m.remove(x)
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    /// Total log mass.
    pub fn z(&self) -> f64 {
        logsumexp(self.m.values().copied())
    }

    /// Normalized log-probability of `x`; `-inf` if absent.
    pub fn lp(&self, x: &T) -> f64 {
        match self.m.get(x) {
            Some(v) => v - self.z(),
            None => f64::NEG_INFINITY,
        }
    }

    /// Normalized probability of `x`.
    pub fn probability(&self, x: &T) -> f64 {
        self.lp(x).exp()
    }

    /// Outcome with the most mass; the smallest such outcome on ties.
    pub fn argmax(&self) -> Option<&T> {
        self.m
            .iter()
            .fold(None::<(&T, f64)>, |best, (k, &v)| match best {
                Some((_, bv)) if bv >= v => best,
                _ => Some((k, v)),
            })
            .map(|(k, _)| k)
    }

    /// Outcomes sorted by decreasing mass (ties in key order).
    pub fn sorted(&self) -> Vec<(&T, f64)> {
        self.m
            .iter()
            .map(|(k, &v)| (k, v))
            .sorted_by(|a, b| b.1.total_cmp(&a.1))
            .collect()
    }

    /// The `n` most probable outcomes.
    pub fn best(&self, n: usize) -> Vec<&T> {
        self.sorted().into_iter().take(n).map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, T, f64> {
        self.m.iter()
    }
}

impl<T: Ord + Clone> DiscreteDistribution<T> {
    /// Add all of `other`'s mass into this distribution.
    pub fn merge(&mut self, other: &DiscreteDistribution<T>) {
        for (k, &v) in other.iter() {
            self.add_mass(k.clone(), v);
        }
    }
}

impl<T: Ord> FromIterator<(T, f64)> for DiscreteDistribution<T> {
    fn from_iter<I: IntoIterator<Item = (T, f64)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.add_mass(k, v);
        }
        out
    }
}

impl<'a, T: Ord> IntoIterator for &'a DiscreteDistribution<T> {
    type Item = (&'a T, &'a f64);
    type IntoIter = btree_map::Iter<'a, T, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.m.iter()
    }
}

/// `{'a':-0.69, 'b':-1.2} [Z=-0.01, N=2]`, most probable first.
impl<T: Ord + fmt::Display> fmt::Display for DiscreteDistribution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .sorted()
            .into_iter()
            .map(|(k, v)| format!("'{}':{:.6}", k, v))
            .join(", ");
        write!(f, "{{{}}} [Z={}, N={}]", body, self.z(), self.len())
    }
}
