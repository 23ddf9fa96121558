//! Multipointers: sorted lists of differentiated variables.
//!
//! `(1,1,4)` names the third derivative taken twice in `x_1` and once in
//! `x_4`; read as a monomial it is `x_1^2 x_4`.

use crate::combinatorics::{factorial, newton};
use crate::error::{ensure_index, JetError, Result};
use crate::multiindex::Multiindex;
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-decreasing list of variable indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Multipointer {
    indices: Vec<usize>,
}

impl Multipointer {
    /// Builds a multipointer, rejecting lists that are not sorted.
    pub fn new(indices: Vec<usize>) -> Result<Self> {
        if indices.windows(2).any(|w| w[0] > w[1]) {
            return Err(JetError::UnorderedIndices(indices));
        }
        Ok(Self { indices })
    }

    /// Sorts the given variable list into a multipointer.
    pub fn from_unsorted(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        Self { indices }
    }

    /// The first multipointer of a given degree, `(0,...,0)`.
    pub fn first(degree: usize) -> Self {
        Self {
            indices: vec![0; degree],
        }
    }

    /// Order of the derivative.
    pub fn module(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.indices.iter()
    }

    /// Advances to the next non-decreasing tuple over `[0, dim)`.
    ///
    /// Returns `false` after the last tuple `(dim-1,...,dim-1)`; the entries
    /// are then left past the valid range.
    pub fn has_next(&mut self, dim: usize) -> bool {
        if dim == 0 {
            return false;
        }
        let len = self.indices.len();
        let mut pos = len;
        while pos > 0 {
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] % dim != 0 {
                let carried = self.indices[pos];
                for entry in &mut self.indices[pos + 1..] {
                    *entry = carried;
                }
                return true;
            }
        }
        false
    }

    /// Product of `run!` over maximal runs of equal entries.
    pub fn factorial(&self) -> Result<u64> {
        let mut result = 1u64;
        for run in self.runs() {
            if run.1 > 1 {
                result = result
                    .checked_mul(factorial(run.1)?)
                    .ok_or_else(|| JetError::Overflow(format!("factorial of {self}")))?;
            }
        }
        Ok(result)
    }

    /// Position of this multipointer inside the homogeneous block of its degree.
    ///
    /// Bijective onto `[0, C(dim+level-1, level))` for a fixed `level`.
    pub fn index(&self, dim: usize, max_degree: usize) -> Result<usize> {
        self.index_with(dim, max_degree, self.indices.len(), |i| self.indices[i])
    }

    /// Index of the multipointer `(self[sub[0]], self[sub[1]], ...)` without building it.
    pub fn index_of_sub(&self, dim: usize, max_degree: usize, sub: &Multipointer) -> Result<usize> {
        for &position in &sub.indices {
            if position >= self.indices.len() {
                return Err(JetError::IndexOutOfRange {
                    what: "multipointer position",
                    index: position,
                    len: self.indices.len(),
                });
            }
        }
        self.index_with(dim, max_degree, sub.module(), |i| self.indices[sub.indices[i]])
    }

    fn index_with(
        &self,
        dim: usize,
        max_degree: usize,
        level: usize,
        entry: impl Fn(usize) -> usize,
    ) -> Result<usize> {
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
        for i in 0..level {
            let current = entry(i);
            if current >= dim {
                return Err(JetError::IndexOutOfRange {
                    what: "variable",
                    index: current,
                    len: dim,
                });
            }
            if current != prev {
                result += newton(dim - prev, level - i)? - newton(dim - current, level - i)?;
                prev = current;
            }
        }
        Ok(result)
    }

    /// Entries at the given positions, e.g. `(1,3,3,6,7).sub_multipointer((1,2,4)) = (3,3,7)`.
    pub fn sub_multipointer(&self, positions: &Multipointer) -> Result<Multipointer> {
        let indices = positions
            .iter()
            .map(|&p| {
                ensure_index("position", p, self.indices.len())?;
                Ok(self.indices[p])
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Multipointer { indices })
    }

    /// Merges two sorted multipointers into one.
    pub fn merge(&self, other: &Multipointer) -> Multipointer {
        let mut indices = Vec::with_capacity(self.module() + other.module());
        let (mut a, mut b) = (self.indices.iter().peekable(), other.indices.iter().peekable());
        loop {
            match (a.peek(), b.peek()) {
                (Some(&&x), Some(&&y)) => {
                    if x < y {
                        indices.push(x);
                        a.next();
                    } else {
                        indices.push(y);
                        b.next();
                    }
                }
                (Some(_), None) => indices.extend(a.by_ref().copied()),
                (None, Some(_)) => indices.extend(b.by_ref().copied()),
                (None, None) => break,
            }
        }
        Multipointer { indices }
    }

    /// Inserts one more variable, keeping the entries sorted.
    pub fn with_index(&self, index: usize) -> Multipointer {
        let at = self.indices.partition_point(|&e| e <= index);
        let mut indices = self.indices.clone();
        indices.insert(at, index);
        Multipointer { indices }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Number of occurrences of `index`.
    pub fn count(&self, index: usize) -> usize {
        self.indices.iter().filter(|&&e| e == index).count()
    }

    /// Removes one occurrence of `index`, if present.
    pub fn without(&self, index: usize) -> Multipointer {
        let mut indices = self.indices.clone();
        if let Some(at) = indices.iter().position(|&e| e == index) {
            indices.remove(at);
        }
        Multipointer { indices }
    }

    /// Maximal runs of equal entries as `(value, length)`.
    pub(crate) fn runs(&self) -> Vec<(usize, usize)> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for &entry in &self.indices {
            match runs.last_mut() {
                Some((value, length)) if *value == entry => *length += 1,
                _ => runs.push((entry, 1)),
            }
        }
        runs
    }
}

impl std::ops::Index<usize> for Multipointer {
    type Output = usize;

    fn index(&self, i: usize) -> &usize {
        &self.indices[i]
    }
}

impl From<&Multiindex> for Multipointer {
    fn from(mi: &Multiindex) -> Self {
        let mut indices = Vec::with_capacity(mi.module());
        for (variable, &exponent) in mi.as_slice().iter().enumerate() {
            indices.extend(std::iter::repeat(variable).take(exponent));
        }
        Multipointer { indices }
    }
}

impl TryFrom<Vec<usize>> for Multipointer {
    type Error = JetError;

    fn try_from(indices: Vec<usize>) -> Result<Self> {
        Multipointer::new(indices)
    }
}

impl From<Multipointer> for Vec<usize> {
    fn from(mp: Multipointer) -> Self {
        mp.indices
    }
}

impl fmt::Display for Multipointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, entry) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{entry}")?;
        }
        write!(f, "}}")
    }
}

/// `prod v[mp[i]]`, computed one run at a time.
pub fn power<T: Scalar>(v: &[T], mp: &Multipointer) -> Result<T> {
    let mut result = T::one();
    for (variable, length) in mp.runs() {
        ensure_index("variable", variable, v.len())?;
        result *= num_traits::pow(v[variable], length);
    }
    Ok(result)
}
