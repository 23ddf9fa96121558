//! Inversion of square jets, degree by degree.

use super::composition::composition_coefficient;
use super::Jet;
use crate::error::{ensure_dimension, JetError, Result};
use crate::multiindex::Multiindex;
use crate::multipointer::Multipointer;
use crate::traits::Scalar;
use nalgebra::DMatrix;

/// Inverse of a series whose linear part is exactly the identity.
///
/// Starting from the identity, each coefficient of degree `d >= 2` is the
/// negated degree `d` defect of `result ∘ c`. The defect never depends on the
/// coefficient being solved for, since the linear part of `c` is the identity.
pub fn inverse_series_close_to_identity<T: Scalar>(c: &Jet<T>) -> Result<Jet<T>> {
    let dimension = c.dimension();
    ensure_dimension("inversion", c.image_dimension(), dimension)?;
    let degree = c.degree();
    if degree >= 1 && !is_identity(&c.jacobian()?) {
        return Err(JetError::NotCloseToIdentity);
    }

    let mut result = Jet::identity(dimension, degree)?;
    let tuples = Multiindex::generate_tuples(dimension, degree);
    for d in 2..=degree {
        let mut a = result.first(d);
        loop {
            let defect = composition_coefficient(&result, c, &a, false, &tuples)?;
            for (i, value) in defect.into_iter().enumerate() {
                *result.get_mut(i, &a)? = -value;
            }
            if !result.has_next(&mut a) {
                break;
            }
        }
        log::trace!("inverse series solved through degree {d}");
    }
    Ok(result)
}

/// Inverse of `c` given `j_inverse`, the inverse of its linear part.
///
/// `J ∘ c` is close to the identity; its inverse `G` is computed with
/// [`inverse_series_close_to_identity`] and the result is `G(J y)`.
/// `j_inverse * Dc = I` is not checked.
pub fn inverse_power_series<T: Scalar>(c: &Jet<T>, j_inverse: &DMatrix<T>) -> Result<Jet<T>> {
    let dimension = c.dimension();
    let degree = c.degree();
    ensure_dimension("inversion", c.image_dimension(), dimension)?;
    ensure_dimension("inversion", dimension, j_inverse.nrows())?;
    ensure_dimension("inversion", dimension, j_inverse.ncols())?;

    let mut normalized = Jet::identity(dimension, degree)?;
    if degree >= 2 {
        let block = c.block_len();
        let nonlinear_start = c.begin(0, 2)?;
        for r in 0..dimension {
            for pos in nonlinear_start..block {
                let mut sum = T::zero();
                for k in 0..dimension {
                    sum += j_inverse[(r, k)] * c[k * block + pos];
                }
                normalized[r * block + pos] = sum;
            }
        }
    }
    let g = inverse_series_close_to_identity(&normalized)?;

    let mut result = Jet::new(dimension, dimension, degree)?;
    if degree == 0 {
        return Ok(result);
    }
    result.set_jacobian(j_inverse)?;
    let tuples = Multiindex::generate_tuples(dimension, degree);
    for r in 2..=degree {
        let mut mp = result.first(r);
        loop {
            let mut sums = vec![T::zero(); dimension];
            for b in &tuples[r - 1] {
                let mut product = T::one();
                for (&row, &column) in b.iter().zip(mp.iter()) {
                    product *= j_inverse[(row, column)];
                }
                if product == T::zero() {
                    continue;
                }
                let sorted = Multipointer::from_unsorted(b.clone());
                let weight = product * T::from_count(sorted.factorial()?);
                for (i, sum) in sums.iter_mut().enumerate() {
                    *sum += *g.get(i, &sorted)? * weight;
                }
            }
            let denominator = T::from_count(mp.factorial()?);
            for (i, sum) in sums.into_iter().enumerate() {
                *result.get_mut(i, &mp)? = sum / denominator;
            }
            if !result.has_next(&mut mp) {
                break;
            }
        }
    }
    Ok(result)
}

fn is_identity<T: Scalar>(m: &DMatrix<T>) -> bool {
    (0..m.nrows()).all(|i| {
        (0..m.ncols()).all(|j| m[(i, j)] == if i == j { T::one() } else { T::zero() })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_identity_up_to(jet: &Jet<f64>, tolerance: f64) {
        let identity = Jet::<f64>::identity(jet.dimension(), jet.degree()).expect("identity");
        for (k, (a, b)) in jet.iter().zip(identity.iter()).enumerate() {
            assert!((a - b).abs() <= tolerance, "coefficient {k}: {a} vs {b}");
        }
    }

    /// `c(x, y) = (x + y^2, y + x^2)`.
    fn quadratic_perturbation(degree: usize) -> Jet<f64> {
        let mut c = Jet::<f64>::identity(2, degree).expect("identity");
        *c.second_order_mut(0, 1, 1).expect("c2") = 1.0;
        *c.second_order_mut(1, 0, 0).expect("c2") = 1.0;
        c
    }

    #[test]
    fn close_to_identity_inverse_of_quadratic_perturbation() {
        let c = quadratic_perturbation(2);
        let inverse = inverse_series_close_to_identity(&c).expect("inverse");
        assert_eq!(*inverse.second_order(0, 1, 1).expect("c2"), -1.0);
        assert_eq!(*inverse.second_order(1, 0, 0).expect("c2"), -1.0);
        assert_eq!(*inverse.second_order(0, 0, 1).expect("c2"), 0.0);
        assert_identity_up_to(&inverse.compose(&c).expect("composition"), 0.0);
    }

    #[test]
    fn close_to_identity_inverse_at_higher_degree() {
        let c = quadratic_perturbation(4);
        let inverse = inverse_series_close_to_identity(&c).expect("inverse");
        // x = u - v^2 + 2 u^2 v + ... for (u, v) = c(x, y)
        assert_eq!(*inverse.third_order(0, 0, 0, 1).expect("c3"), 2.0);
        assert_identity_up_to(&inverse.compose(&c).expect("composition"), 1e-12);
        assert_identity_up_to(&c.compose(&inverse).expect("composition"), 1e-12);
    }

    #[test]
    fn rejects_series_not_close_to_identity() {
        let mut c = quadratic_perturbation(2);
        *c.first_order_mut(0, 1).expect("c1") = 0.5;
        assert!(matches!(
            inverse_series_close_to_identity(&c),
            Err(JetError::NotCloseToIdentity)
        ));
        let rectangular = Jet::<f64>::new(1, 2, 2).expect("jet should allocate");
        assert!(matches!(
            inverse_series_close_to_identity(&rectangular),
            Err(JetError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn general_inverse_composes_to_identity() {
        let mut c = Jet::<f64>::new(2, 2, 3).expect("jet should allocate");
        c.set_jacobian(&DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 4.0]))
            .expect("jacobian");
        *c.second_order_mut(0, 0, 1).expect("c2") = 1.0;
        *c.second_order_mut(1, 1, 1).expect("c2") = -3.0;
        *c.third_order_mut(0, 0, 0, 0).expect("c3") = 0.5;
        let j_inverse = DMatrix::from_row_slice(2, 2, &[0.5, -0.125, 0.0, 0.25]);

        let inverse = inverse_power_series(&c, &j_inverse).expect("inverse");
        assert_eq!(inverse.jacobian().expect("jacobian"), j_inverse);
        assert_identity_up_to(&inverse.compose(&c).expect("composition"), 1e-12);
        assert_identity_up_to(&c.compose(&inverse).expect("composition"), 1e-12);
    }

    #[test]
    fn general_inverse_checks_matrix_shape() {
        let c = quadratic_perturbation(2);
        let wrong = DMatrix::<f64>::identity(3, 3);
        assert!(matches!(
            inverse_power_series(&c, &wrong),
            Err(JetError::DimensionMismatch { .. })
        ));
    }
}
