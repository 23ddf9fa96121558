use num_traits::{FromPrimitive, Num};
use std::fmt::Debug;
use std::ops::{AddAssign, DivAssign, MulAssign, Neg, SubAssign};

/// A trait for types that can be used as jet coefficients.
/// Must support ring arithmetic with in-place updates, division by the
/// combinatorial weights, debug printing and conversion from primitives.
pub trait Scalar:
    nalgebra::Scalar
    + Copy
    + Num
    + FromPrimitive
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Debug
    + 'static
{
    /// Converts an exact count (a factorial or a multiplicity) into the scalar.
    ///
    /// Uses double-and-add on the binary expansion, so it never fails and is
    /// exact whenever the scalar represents `n` exactly.
    fn from_count(n: u64) -> Self {
        let one = Self::one();
        let mut result = Self::zero();
        for bit in (0..u64::BITS).rev() {
            result = result + result;
            if (n >> bit) & 1 == 1 {
                result += one;
            }
        }
        result
    }
}

impl<T> Scalar for T where
    T: nalgebra::Scalar
        + Copy
        + Num
        + FromPrimitive
        + Neg<Output = T>
        + AddAssign
        + SubAssign
        + MulAssign
        + DivAssign
        + Debug
        + 'static
{
}

#[cfg(test)]
mod tests {
    use super::Scalar;
    use num_complex::Complex;

    #[test]
    fn from_count_is_exact_for_factorials() {
        assert_eq!(f64::from_count(0), 0.0);
        assert_eq!(f64::from_count(1), 1.0);
        assert_eq!(f64::from_count(3_628_800), 3_628_800.0);
        assert_eq!(f64::from_count(2_432_902_008_176_640_000), 2_432_902_008_176_640_000.0);
    }

    #[test]
    fn from_count_works_for_complex_coefficients() {
        let value = Complex::<f64>::from_count(24);
        assert_eq!(value, Complex::new(24.0, 0.0));
    }
}
