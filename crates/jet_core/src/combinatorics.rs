//! Memoized factorials and binomial coefficients.
//!
//! The tables grow append-only: a value, once computed, is never recomputed
//! or invalidated. [`Combinatorics`] is the explicit context object; the free
//! functions [`binomial`] and [`factorial`] share one process-wide instance.

use crate::error::{JetError, Result};
use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

/// Literal 0!..20! in double precision.
const FACTORIALS_F64: [f64; 21] = [
    1.0,
    1.0,
    2.0,
    6.0,
    24.0,
    120.0,
    720.0,
    5040.0,
    40320.0,
    362880.0,
    3628800.0,
    39916800.0,
    479001600.0,
    6227020800.0,
    87178291200.0,
    1307674368000.0,
    20922789888000.0,
    355687428096000.0,
    6402373705728000.0,
    121645100408832000.0,
    2432902008176640000.0,
];

/// Pascal's triangle and factorial table, extended on demand.
#[derive(Debug, Clone)]
pub struct Combinatorics {
    /// `rows[n][k] = C(n, k)`, `None` where the value overflows `u64`.
    rows: Vec<Vec<Option<u64>>>,
    factorials: Vec<u64>,
}

impl Default for Combinatorics {
    fn default() -> Self {
        Self::new()
    }
}

impl Combinatorics {
    pub fn new() -> Self {
        Self {
            rows: vec![vec![Some(1)]],
            factorials: vec![1],
        }
    }

    /// Largest `n` for which the row of binomial coefficients is known.
    pub fn known_level(&self) -> usize {
        self.rows.len() - 1
    }

    /// Looks up `C(n, k)` without extending the table.
    pub fn cached_binomial(&self, n: usize, k: usize) -> Option<Result<u64>> {
        if k > n {
            return Some(Ok(0));
        }
        let row = self.rows.get(n)?;
        Some(row[k].ok_or_else(|| binomial_overflow(n, k)))
    }

    pub fn binomial(&mut self, n: usize, k: usize) -> Result<u64> {
        if k > n {
            return Ok(0);
        }
        self.extend_rows(n);
        self.rows[n][k].ok_or_else(|| binomial_overflow(n, k))
    }

    pub fn cached_factorial(&self, n: usize) -> Option<u64> {
        self.factorials.get(n).copied()
    }

    pub fn factorial(&mut self, n: usize) -> Result<u64> {
        while self.factorials.len() <= n {
            let next = self.factorials.len();
            let last = self.factorials[next - 1];
            let value = last
                .checked_mul(next as u64)
                .ok_or_else(|| JetError::Overflow(format!("factorial({next})")))?;
            self.factorials.push(value);
        }
        Ok(self.factorials[n])
    }

    /// Pascal recurrence `C(n,k) = C(n-1,k-1) + C(n-1,k)`, one level at a time.
    fn extend_rows(&mut self, n: usize) {
        if self.rows.len() > n {
            return;
        }
        log::debug!(
            "extending binomial table from level {} to {}",
            self.known_level(),
            n
        );
        while self.rows.len() <= n {
            let previous = &self.rows[self.rows.len() - 1];
            let width = previous.len();
            let mut row = Vec::with_capacity(width + 1);
            row.push(Some(1));
            for k in 1..width {
                let value = match (previous[k - 1], previous[k]) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
                row.push(value);
            }
            row.push(Some(1));
            self.rows.push(row);
        }
    }
}

fn binomial_overflow(n: usize, k: usize) -> JetError {
    JetError::Overflow(format!("binomial({n}, {k})"))
}

static SHARED: Lazy<RwLock<Combinatorics>> = Lazy::new(|| RwLock::new(Combinatorics::new()));

/// `C(n, k)` from the shared table; `0` when `k > n`.
pub fn binomial(n: usize, k: usize) -> Result<u64> {
    {
        let table = SHARED.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = table.cached_binomial(n, k) {
            return value;
        }
    }
    SHARED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .binomial(n, k)
}

/// `n!` from the shared table. Fails once the value leaves `u64`.
pub fn factorial(n: usize) -> Result<u64> {
    {
        let table = SHARED.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = table.cached_factorial(n) {
            return Ok(value);
        }
    }
    SHARED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .factorial(n)
}

/// Double precision factorial, bounded by the literal table of 0!..20!.
pub fn factorial_f64(n: usize) -> Result<f64> {
    FACTORIALS_F64
        .get(n)
        .copied()
        .ok_or(JetError::FactorialCapacity(n))
}

/// `C(n, k)` as an array offset.
pub(crate) fn binomial_usize(n: usize, k: usize) -> Result<usize> {
    let value = binomial(n, k)?;
    usize::try_from(value).map_err(|_| binomial_overflow(n, k))
}

/// `C(n, k)` by the multiplicative formula, leaving the shared table alone.
pub(crate) fn binomial_direct(n: usize, k: usize) -> Result<usize> {
    if k > n {
        return Ok(0);
    }
    let k = k.min(n - k);
    let mut value: u128 = 1;
    for i in 0..k {
        // C(n, i) * (n - i) / (i + 1) = C(n, i + 1), exact at every step
        value = value * (n - i) as u128 / (i + 1) as u128;
        if value > u128::from(u64::MAX) {
            return Err(binomial_overflow(n, k));
        }
    }
    usize::try_from(value).map_err(|_| binomial_overflow(n, k))
}

/// Number of non-decreasing `level`-tuples over `[0, dim)`, i.e. `C(dim+level-1, level)`.
pub(crate) fn newton(dim: usize, level: usize) -> Result<usize> {
    if dim + level == 0 {
        return Ok(1);
    }
    binomial_usize(dim + level - 1, level)
}

#[cfg(test)]
pub(crate) fn shared_known_level() -> usize {
    SHARED.read().unwrap_or_else(PoisonError::into_inner).known_level()
}
