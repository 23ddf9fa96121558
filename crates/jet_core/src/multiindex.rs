//! Multiindices: exponent vectors over the variables.

use crate::combinatorics::{factorial, newton};
use crate::error::{ensure_dimension, JetError, Result};
use crate::multipointer::Multipointer;
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-variable exponents of a monomial; `module()` is its total degree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Multiindex {
    exponents: Vec<usize>,
}

impl Multiindex {
    pub fn new(exponents: Vec<usize>) -> Self {
        Self { exponents }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            exponents: vec![0; dim],
        }
    }

    /// First multiindex of the given degree in [`Multiindex::has_next`] order: `(degree,0,...,0)`.
    pub fn first(dim: usize, degree: usize) -> Self {
        let mut result = Self::zeros(dim);
        if let Some(head) = result.exponents.first_mut() {
            *head = degree;
        }
        result
    }

    /// Counts the occurrences of every variable in `mp`.
    pub fn from_multipointer(dim: usize, mp: &Multipointer) -> Result<Self> {
        let mut exponents = vec![0; dim];
        for &variable in mp.iter() {
            let slot = exponents.get_mut(variable).ok_or(JetError::IndexOutOfRange {
                what: "variable",
                index: variable,
                len: dim,
            })?;
            *slot += 1;
        }
        Ok(Self { exponents })
    }

    pub fn dimension(&self) -> usize {
        self.exponents.len()
    }

    /// Total degree, the sum of the exponents.
    pub fn module(&self) -> usize {
        self.exponents.iter().sum()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.exponents
    }

    /// Product of `entry!` over all entries.
    pub fn factorial(&self) -> Result<u64> {
        let mut result = 1u64;
        for &entry in &self.exponents {
            if entry > 1 {
                result = result
                    .checked_mul(factorial(entry)?)
                    .ok_or_else(|| JetError::Overflow(format!("factorial of {self}")))?;
            }
        }
        Ok(result)
    }

    /// Advances to the next multiindex of the same degree.
    ///
    /// The first entry drains one unit at a time into the second; once it is
    /// empty the lowest nonzero entry above it carries into its right neighbour.
    /// Starting from [`Multiindex::first`] every multiindex of the degree is
    /// visited exactly once.
    pub fn has_next(&mut self) -> bool {
        let dim = self.exponents.len();
        if dim < 2 {
            return false;
        }
        if self.exponents[0] != 0 {
            self.exponents[0] -= 1;
            self.exponents[1] += 1;
            return true;
        }
        for i in 1..dim - 1 {
            if self.exponents[i] != 0 {
                self.exponents[0] = self.exponents[i] - 1;
                self.exponents[i] = 0;
                self.exponents[i + 1] += 1;
                return true;
            }
        }
        false
    }

    /// Position inside the homogeneous block of its degree; agrees with
    /// [`Multipointer::index`] of the corresponding multipointer.
    pub fn index(&self, max_degree: usize) -> Result<usize> {
        let dim = self.exponents.len();
        let mut level = self.module();
        if level == 0 {
            return Ok(0);
        }
        if level > max_degree {
            return Err(JetError::DegreeExceeded {
                requested: level,
                max: max_degree,
            });
        }
        let mut result = 0usize;
        let mut prev = 0usize;
        for (i, &entry) in self.exponents.iter().enumerate() {
            if entry == 0 {
                continue;
            }
            if i != prev {
                result += newton(dim - prev, level)? - newton(dim - i, level)?;
                prev = i;
            }
            level -= entry;
        }
        Ok(result)
    }

    /// Steps through every decomposition `a + b = self`.
    ///
    /// Enumeration starts from `a = 0, b = self`; each call moves one unit from
    /// `b` to `a`. Returns `false` once all decompositions have been produced,
    /// leaving `a` and `b` back at the start.
    pub fn next_split(&self, a: &mut Multiindex, b: &mut Multiindex) -> Result<bool> {
        ensure_dimension("next_split", self.dimension(), a.dimension())?;
        ensure_dimension("next_split", self.dimension(), b.dimension())?;
        for i in 0..self.exponents.len() {
            if b.exponents[i] > 0 {
                b.exponents[i] -= 1;
                a.exponents[i] += 1;
                return Ok(true);
            }
            b.exponents[i] = self.exponents[i];
            a.exponents[i] = 0;
        }
        Ok(false)
    }

    /// Every ordered tuple over `[0, n)` of length `1..=k`; `result[len - 1]`
    /// holds the tuples of length `len` in lexicographic order.
    pub fn generate_tuples(n: usize, k: usize) -> Vec<Vec<Vec<usize>>> {
        let mut result: Vec<Vec<Vec<usize>>> = Vec::with_capacity(k);
        if k == 0 {
            return result;
        }
        result.push((0..n).map(|i| vec![i]).collect());
        for _ in 1..k {
            let previous = result.last().map(Vec::as_slice).unwrap_or_default();
            let mut next = Vec::with_capacity(previous.len() * n);
            for tuple in previous {
                for i in 0..n {
                    let mut extended = tuple.clone();
                    extended.push(i);
                    next.push(extended);
                }
            }
            result.push(next);
        }
        result
    }
}

impl std::ops::Index<usize> for Multiindex {
    type Output = usize;

    fn index(&self, i: usize) -> &usize {
        &self.exponents[i]
    }
}

impl From<Vec<usize>> for Multiindex {
    fn from(exponents: Vec<usize>) -> Self {
        Self::new(exponents)
    }
}

impl fmt::Display for Multiindex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, entry) in self.exponents.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{entry}")?;
        }
        write!(f, ")")
    }
}

/// `prod v[i]^mi[i]`.
pub fn power_multiindex<T: Scalar>(v: &[T], mi: &Multiindex) -> Result<T> {
    ensure_dimension("power", mi.dimension(), v.len())?;
    let mut result = T::one();
    for (&x, &exponent) in v.iter().zip(mi.as_slice()) {
        if exponent > 0 {
            result *= num_traits::pow(x, exponent);
        }
    }
    Ok(result)
}
