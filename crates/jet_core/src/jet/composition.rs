//! Truncated composition of jets.
//!
//! For a target multipointer `a` of degree `p` the derivative of
//! `first ∘ second` is the multivariate Faà di Bruno sum: over every
//! partition of the `p` positions of `a` into `k` blocks and every choice of
//! one component of `second` per block, the `k`-th derivative of `first`
//! times the product of the block derivatives of `second`.

use super::Jet;
use crate::error::{ensure_dimension, Result};
use crate::multiindex::Multiindex;
use crate::multipointer::Multipointer;
use crate::partitions::generate_list;
use crate::traits::Scalar;

/// Writes the truncation of `first ∘ second` into `result`.
///
/// `first: R^K -> R^M` and `second: R^N -> R^K` may have any shapes that
/// chain; `result` is reshaped to `(M, N, D)` when needed. The constant term
/// of `second` is taken to be the expansion point of `first` and is ignored.
/// With `nonlinear_only` the terms linear in `first` (including its constant
/// term) are skipped.
pub fn substitution_power_series<T: Scalar>(
    first: &Jet<T>,
    second: &Jet<T>,
    result: &mut Jet<T>,
    nonlinear_only: bool,
) -> Result<()> {
    ensure_dimension("composition", first.dimension(), second.image_dimension())?;
    ensure_dimension("composition degree", first.degree(), second.degree())?;
    let degree = first.degree();
    let (image, dimension) = (first.image_dimension(), second.dimension());
    if result.has_shape(image, dimension, degree) {
        result.clear();
    } else {
        result.reshape(image, dimension, degree)?;
    }

    if !nonlinear_only {
        for i in 0..image {
            *result.value_mut(i)? = *first.value(i)?;
        }
    }
    if dimension == 0 {
        return Ok(());
    }

    let tuples = Multiindex::generate_tuples(first.dimension(), degree);
    for p in 1..=degree {
        let mut a = result.first(p);
        loop {
            let coefficients = composition_coefficient(first, second, &a, nonlinear_only, &tuples)?;
            for (i, c) in coefficients.into_iter().enumerate() {
                *result.get_mut(i, &a)? = c;
            }
            if !result.has_next(&mut a) {
                break;
            }
        }
    }
    Ok(())
}

/// Coefficient of `first ∘ second` at `a` for every component of `first`.
///
/// `tuples[k - 1]` must list every ordered `k`-tuple of components of
/// `second`, as produced by [`Multiindex::generate_tuples`].
pub(crate) fn composition_coefficient<T: Scalar>(
    first: &Jet<T>,
    second: &Jet<T>,
    a: &Multipointer,
    nonlinear_only: bool,
    tuples: &[Vec<Vec<usize>>],
) -> Result<Vec<T>> {
    let p = a.module();
    let mut sums = vec![T::zero(); first.image_dimension()];
    let lowest = if nonlinear_only { 2 } else { 1 };
    for k in lowest..=p {
        let partitions = generate_list(p, k)?;
        let deltas: Vec<Vec<(Multipointer, T)>> = partitions
            .iter()
            .map(|partition| {
                partition
                    .iter()
                    .map(|block| -> Result<(Multipointer, T)> {
                        let delta = a.sub_multipointer(block)?;
                        let weight = T::from_count(delta.factorial()?);
                        Ok((delta, weight))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        for tuple in &tuples[k - 1] {
            let mut product_sum = T::zero();
            for partition in &deltas {
                let mut product = T::one();
                for (&component, (delta, weight)) in tuple.iter().zip(partition) {
                    product *= *second.get(component, delta)? * *weight;
                    if product == T::zero() {
                        break;
                    }
                }
                product_sum += product;
            }
            if product_sum == T::zero() {
                continue;
            }
            let sorted = Multipointer::from_unsorted(tuple.clone());
            let weight = T::from_count(sorted.factorial()?) * product_sum;
            for (i, sum) in sums.iter_mut().enumerate() {
                *sum += *first.get(i, &sorted)? * weight;
            }
        }
    }
    let denominator = T::from_count(a.factorial()?);
    for sum in &mut sums {
        *sum /= denominator;
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JetError;

    fn close(a: &Jet<f64>, b: &Jet<f64>) -> bool {
        a.has_shape(b.image_dimension(), b.dimension(), b.degree())
            && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    /// Dense jet with distinct, non-trivial coefficients.
    fn sample(image: usize, dimension: usize, degree: usize) -> Jet<f64> {
        let mut jet = Jet::new(image, dimension, degree).expect("jet should allocate");
        for (k, c) in jet.iter_mut().enumerate() {
            *c = ((k * 7 + 3) % 11) as f64 - 5.0;
        }
        jet
    }

    #[test]
    fn identity_is_neutral_on_both_sides() {
        let f = sample(2, 3, 4);
        let inner_identity = Jet::<f64>::identity(3, 4).expect("identity");
        let composed = f.compose(&inner_identity).expect("composition");
        assert!(close(&composed, &f));

        let mut g = sample(3, 2, 3);
        for i in 0..3 {
            *g.value_mut(i).expect("value") = 0.0;
        }
        let outer_identity = Jet::<f64>::identity(3, 3).expect("identity");
        let composed = outer_identity.compose(&g).expect("composition");
        assert!(close(&composed, &g));
    }

    #[test]
    fn univariate_square_of_shifted_series() {
        // f(y) = y^2, g(x) = x + x^2: f(g(x)) = x^2 + 2x^3 + x^4
        let mut f = Jet::<f64>::new(1, 1, 4).expect("jet should allocate");
        *f.second_order_mut(0, 0, 0).expect("c2") = 1.0;
        let mut g = Jet::<f64>::new(1, 1, 4).expect("jet should allocate");
        *g.first_order_mut(0, 0).expect("c1") = 1.0;
        *g.second_order_mut(0, 0, 0).expect("c2") = 1.0;
        let h = f.compose(&g).expect("composition");
        assert_eq!(h.as_slice(), &[0.0, 0.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn composition_agrees_with_pointwise_evaluation() {
        // f(u, v) = u v + u^2, g(x, y) = (x + 2y + y^2, 3x - x y)
        let mut f = Jet::<f64>::new(1, 2, 2).expect("jet should allocate");
        *f.second_order_mut(0, 0, 1).expect("c2") = 1.0;
        *f.second_order_mut(0, 0, 0).expect("c2") = 1.0;
        let mut g = Jet::<f64>::new(2, 2, 2).expect("jet should allocate");
        *g.first_order_mut(0, 0).expect("c1") = 1.0;
        *g.first_order_mut(0, 1).expect("c1") = 2.0;
        *g.second_order_mut(0, 1, 1).expect("c2") = 1.0;
        *g.first_order_mut(1, 0).expect("c1") = 3.0;
        *g.second_order_mut(1, 0, 1).expect("c2") = -1.0;

        let h = f.compose(&g).expect("composition");
        // (x + 2y)(3x) + (x + 2y)^2 truncated to degree two: 4x^2 + 10xy + 4y^2
        assert_eq!(*h.second_order(0, 0, 0).expect("c2"), 4.0);
        assert_eq!(*h.second_order(0, 0, 1).expect("c2"), 10.0);
        assert_eq!(*h.second_order(0, 1, 1).expect("c2"), 4.0);
        assert_eq!(*h.first_order(0, 0).expect("c1"), 0.0);
    }

    #[test]
    fn non_square_shapes_chain() {
        let f = sample(1, 3, 2);
        let g = sample(3, 2, 2);
        let h = f.compose(&g).expect("composition");
        assert!(h.has_shape(1, 2, 2));
        assert!(matches!(
            g.compose(&g),
            Err(JetError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn degree_mismatch_is_a_shape_error() {
        let f = Jet::<f64>::identity(2, 2).expect("identity");
        let g = Jet::<f64>::identity(2, 3).expect("identity");
        match f.compose(&g) {
            Err(JetError::DimensionMismatch { expected, found, .. }) => {
                assert_eq!((expected, found), (2, 3));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn nonlinear_only_drops_linear_terms() {
        let f = sample(2, 2, 3);
        let mut g = sample(2, 2, 3);
        for i in 0..2 {
            *g.value_mut(i).expect("value") = 0.0;
        }
        let mut full = Jet::new(2, 2, 3).expect("jet should allocate");
        substitution_power_series(&f, &g, &mut full, false).expect("composition");
        let mut nonlinear = Jet::new(2, 2, 3).expect("jet should allocate");
        substitution_power_series(&f, &g, &mut nonlinear, true).expect("composition");

        let mut linear_f = Jet::new(2, 2, 3).expect("jet should allocate");
        linear_f.set_value(&f.value_vector().expect("value")).expect("value");
        linear_f.set_jacobian(&f.jacobian().expect("jacobian")).expect("jacobian");
        let linear = linear_f.compose(&g).expect("composition");

        let sum = nonlinear.try_add(&linear).expect("same shape");
        assert!(close(&sum, &full));
    }

    #[test]
    fn result_with_fixed_wrong_shape_is_rejected() {
        let f = sample(1, 2, 2);
        let g = sample(2, 2, 2);
        let mut result: Jet<f64> = crate::cn_container::CnContainer::fixed(1, 3, 2)
            .expect("container should allocate")
            .into();
        assert!(matches!(
            substitution_power_series(&f, &g, &mut result, false),
            Err(JetError::ResizeForbidden { .. })
        ));
    }
}
