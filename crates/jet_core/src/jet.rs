pub mod composition;
pub mod inverse;
mod io;

pub use composition::substitution_power_series;
pub use inverse::{inverse_power_series, inverse_series_close_to_identity};

use crate::cn_container::CnContainer;
use crate::error::{ensure_dimension, JetError, Result};
use crate::hessian::Hessian;
use crate::multiindex::Multiindex;
use crate::multipointer::{power, Multipointer};
use crate::traits::Scalar;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Truncated Taylor series of a map `R^N -> R^M` up to total degree `D`.
///
/// Coefficients are normalized: the entry at multipointer `mp` of component
/// `i` is `(1/mp!) d^mp f_i (0)`. A jet dereferences to its [`CnContainer`],
/// so all addressing (by multipointer, multiindex or fixed arity) is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jet<T> {
    container: CnContainer<T>,
}

impl<T> Deref for Jet<T> {
    type Target = CnContainer<T>;

    fn deref(&self) -> &CnContainer<T> {
        &self.container
    }
}

impl<T> DerefMut for Jet<T> {
    fn deref_mut(&mut self) -> &mut CnContainer<T> {
        &mut self.container
    }
}

impl<T> From<CnContainer<T>> for Jet<T> {
    fn from(container: CnContainer<T>) -> Self {
        Self { container }
    }
}

impl<T: Scalar> Jet<T> {
    /// Zero jet with `image` components in `dimension` variables.
    pub fn new(image: usize, dimension: usize, degree: usize) -> Result<Self> {
        Ok(Self {
            container: CnContainer::filled(image, dimension, degree, T::zero())?,
        })
    }

    /// The identity map of `R^dimension`.
    pub fn identity(dimension: usize, degree: usize) -> Result<Self> {
        let mut jet = Self::new(dimension, dimension, degree)?;
        if degree > 0 {
            for i in 0..dimension {
                *jet.first_order_mut(i, i)? = T::one();
            }
        }
        Ok(jet)
    }

    pub fn into_container(self) -> CnContainer<T> {
        self.container
    }

    /// Reallocates to another shape, zeroing every coefficient.
    pub fn reshape(&mut self, image: usize, dimension: usize, degree: usize) -> Result<()> {
        self.container.resize_with(image, dimension, degree, T::zero())
    }

    pub fn clear(&mut self) {
        self.container.fill(T::zero());
    }

    /// Constant terms of all components.
    pub fn value_vector(&self) -> Result<DVector<T>> {
        let mut v = DVector::zeros(self.image_dimension());
        for i in 0..self.image_dimension() {
            v[i] = *self.value(i)?;
        }
        Ok(v)
    }

    pub fn set_value(&mut self, v: &DVector<T>) -> Result<()> {
        ensure_dimension("set_value", self.image_dimension(), v.len())?;
        for i in 0..self.image_dimension() {
            *self.value_mut(i)? = v[i];
        }
        Ok(())
    }

    /// Degree one block as an `M x N` matrix.
    pub fn jacobian(&self) -> Result<DMatrix<T>> {
        let (rows, cols) = (self.image_dimension(), self.dimension());
        let mut m = DMatrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                m[(i, j)] = *self.first_order(i, j)?;
            }
        }
        Ok(m)
    }

    pub fn set_jacobian(&mut self, m: &DMatrix<T>) -> Result<()> {
        ensure_dimension("set_jacobian", self.image_dimension(), m.nrows())?;
        ensure_dimension("set_jacobian", self.dimension(), m.ncols())?;
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                *self.first_order_mut(i, j)? = m[(i, j)];
            }
        }
        Ok(())
    }

    /// Degree two block.
    pub fn hessian(&self) -> Result<Hessian<T>> {
        let mut h = Hessian::zeros(self.image_dimension(), self.dimension());
        for i in 0..self.image_dimension() {
            for j in 0..self.dimension() {
                for c in j..self.dimension() {
                    h.set(i, j, c, *self.second_order(i, j, c)?)?;
                }
            }
        }
        Ok(h)
    }

    pub fn set_hessian(&mut self, h: &Hessian<T>) -> Result<()> {
        ensure_dimension("set_hessian", self.image_dimension(), h.image_dimension())?;
        ensure_dimension("set_hessian", self.dimension(), h.dimension())?;
        for i in 0..self.image_dimension() {
            for j in 0..self.dimension() {
                for c in j..self.dimension() {
                    *self.second_order_mut(i, j, c)? = h.get(i, j, c)?;
                }
            }
        }
        Ok(())
    }

    /// Coefficients of all components at one multipointer.
    pub fn coefficients(&self, mp: &Multipointer) -> Result<DVector<T>> {
        let mut v = DVector::zeros(self.image_dimension());
        for i in 0..self.image_dimension() {
            v[i] = *self.get(i, mp)?;
        }
        Ok(v)
    }

    pub fn coefficients_at(&self, mi: &Multiindex) -> Result<DVector<T>> {
        let mut v = DVector::zeros(self.image_dimension());
        for i in 0..self.image_dimension() {
            v[i] = *self.get_mi(i, mi)?;
        }
        Ok(v)
    }

    /// Value of the truncated polynomial at `v`.
    ///
    /// Every monomial is evaluated once and reused for all components.
    pub fn evaluate(&self, v: &[T]) -> Result<DVector<T>> {
        ensure_dimension("evaluate", self.dimension(), v.len())?;
        let mut result = self.value_vector()?;
        for d in 1..=self.monomial_degree() {
            let mut mp = self.first(d);
            loop {
                let monomial = power(v, &mp)?;
                for i in 0..self.image_dimension() {
                    result[i] += monomial * *self.get(i, &mp)?;
                }
                if !self.has_next(&mut mp) {
                    break;
                }
            }
        }
        Ok(result)
    }

    /// Jacobian of the truncated polynomial at `v`.
    pub fn derivative_at(&self, v: &[T]) -> Result<DMatrix<T>> {
        Ok(self.evaluate_with_derivative(v)?.1)
    }

    /// Value and Jacobian of the truncated polynomial at `v` in one sweep.
    pub fn evaluate_with_derivative(&self, v: &[T]) -> Result<(DVector<T>, DMatrix<T>)> {
        ensure_dimension("evaluate", self.dimension(), v.len())?;
        let (rows, cols) = (self.image_dimension(), self.dimension());
        let mut value = self.value_vector()?;
        let mut derivative = DMatrix::zeros(rows, cols);
        for d in 1..=self.monomial_degree() {
            let mut mp = self.first(d);
            loop {
                let monomial = power(v, &mp)?;
                for j in 0..cols {
                    let multiplicity = mp.count(j);
                    if multiplicity == 0 {
                        continue;
                    }
                    let partial = T::from_count(multiplicity as u64) * power(v, &mp.without(j))?;
                    for i in 0..rows {
                        derivative[(i, j)] += partial * *self.get(i, &mp)?;
                    }
                }
                for i in 0..rows {
                    value[i] += monomial * *self.get(i, &mp)?;
                }
                if !self.has_next(&mut mp) {
                    break;
                }
            }
        }
        Ok((value, derivative))
    }

    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.ensure_same_shape("add", other)?;
        let mut result = self.clone();
        for (r, &o) in result.iter_mut().zip(other.iter()) {
            *r += o;
        }
        Ok(result)
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        self.ensure_same_shape("sub", other)?;
        let mut result = self.clone();
        for (r, &o) in result.iter_mut().zip(other.iter()) {
            *r -= o;
        }
        Ok(result)
    }

    /// `m * self`, applied to every coefficient; the result has `m.nrows()` components.
    pub fn left_multiply(&self, m: &DMatrix<T>) -> Result<Self> {
        ensure_dimension("left_multiply", self.image_dimension(), m.ncols())?;
        let mut result = Self::new(m.nrows(), self.dimension(), self.degree())?;
        let block = self.block_len();
        for r in 0..m.nrows() {
            for k in 0..m.ncols() {
                let factor = m[(r, k)];
                if factor == T::zero() {
                    continue;
                }
                for pos in 0..block {
                    result[r * block + pos] += factor * self[k * block + pos];
                }
            }
        }
        Ok(result)
    }

    pub fn scale(&mut self, factor: T) {
        for c in self.iter_mut() {
            *c *= factor;
        }
    }

    /// `self ∘ inner`, truncated to the common degree.
    pub fn compose(&self, inner: &Self) -> Result<Self> {
        let mut result = Self::new(self.image_dimension(), inner.dimension(), self.degree())?;
        substitution_power_series(self, inner, &mut result, false)?;
        Ok(result)
    }

    /// Highest degree with at least one monomial; zero without variables.
    fn monomial_degree(&self) -> usize {
        if self.dimension() == 0 {
            0
        } else {
            self.degree()
        }
    }

    fn ensure_same_shape(&self, operation: &'static str, other: &Self) -> Result<()> {
        ensure_dimension(operation, self.image_dimension(), other.image_dimension())?;
        ensure_dimension(operation, self.dimension(), other.dimension())?;
        ensure_dimension(operation, self.degree(), other.degree())
    }
}

impl<T: Scalar + nalgebra::ComplexField> Jet<T> {
    /// Inverse series, with the linear part inverted by LU decomposition.
    pub fn inverse(&self) -> Result<Self> {
        ensure_dimension("inverse", self.image_dimension(), self.dimension())?;
        let linear = self.jacobian()?;
        let inverse_linear = linear.lu().try_inverse().ok_or(JetError::SingularLinearPart)?;
        inverse_power_series(self, &inverse_linear)
    }
}

fn write_component_vector<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    jet: &Jet<T>,
    mp: &Multipointer,
) -> fmt::Result {
    write!(f, "{{")?;
    for i in 0..jet.image_dimension() {
        if i > 0 {
            write!(f, ",")?;
        }
        let coefficient = jet.get(i, mp).map_err(|_| fmt::Error)?;
        write!(f, "{coefficient}")?;
    }
    write!(f, "}}")
}

impl<T: fmt::Display> fmt::Display for Jet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value : ")?;
        write_component_vector(f, self, &Multipointer::first(0))?;
        let top = if self.dimension() == 0 { 0 } else { self.degree() };
        for d in 1..=top {
            write!(f, "\nTaylor coefficients of order {d} :")?;
            let mut mp = self.first(d);
            loop {
                let mi = Multiindex::from_multipointer(self.dimension(), &mp).map_err(|_| fmt::Error)?;
                write!(f, "\n   {mi}  : ")?;
                write_component_vector(f, self, &mp)?;
                if !self.has_next(&mut mp) {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp(v: &[usize]) -> Multipointer {
        Multipointer::new(v.to_vec()).expect("sorted")
    }

    /// `f(x, y) = x^2 y`.
    fn x2y() -> Jet<f64> {
        let mut f = Jet::new(1, 2, 3).expect("jet should allocate");
        *f.get_mut(0, &mp(&[0, 0, 1])).expect("coefficient") = 1.0;
        f
    }

    #[test]
    fn x2y_coefficients_and_value() {
        let f = x2y();
        let at = |e: Vec<usize>| *f.get_mi(0, &Multiindex::new(e)).expect("coefficient");
        assert_eq!(at(vec![2, 1]), 1.0);
        assert_eq!(at(vec![0, 0]), 0.0);
        assert_eq!(at(vec![1, 2]), 0.0);
        let value = f.evaluate(&[2.0, 3.0]).expect("evaluation");
        assert_eq!(value[0], 12.0);
    }

    #[test]
    fn derivative_of_x2y() {
        let (value, derivative) = x2y().evaluate_with_derivative(&[2.0, 3.0]).expect("evaluation");
        assert_eq!(value[0], 12.0);
        assert_eq!(derivative[(0, 0)], 12.0);
        assert_eq!(derivative[(0, 1)], 4.0);
    }

    #[test]
    fn typed_views() {
        let mut f = Jet::<f64>::new(2, 2, 2).expect("jet should allocate");
        f.set_value(&DVector::from_vec(vec![1.0, -1.0])).expect("value");
        let jacobian = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        f.set_jacobian(&jacobian).expect("jacobian");
        *f.second_order_mut(1, 1, 0).expect("c2") = 5.0;

        assert_eq!(f.value_vector().expect("value"), DVector::from_vec(vec![1.0, -1.0]));
        assert_eq!(f.jacobian().expect("jacobian"), jacobian);
        let h = f.hessian().expect("hessian");
        assert_eq!(h.get(1, 0, 1).expect("entry"), 5.0);
        assert_eq!(h.get(0, 0, 1).expect("entry"), 0.0);
        assert_eq!(
            f.coefficients(&mp(&[0, 1])).expect("coefficients"),
            DVector::from_vec(vec![0.0, 5.0])
        );
        assert!(f.set_jacobian(&DMatrix::zeros(3, 2)).is_err());

        let mut g = Jet::<f64>::new(2, 2, 2).expect("jet should allocate");
        g.set_hessian(&h).expect("hessian");
        assert_eq!(*g.second_order(1, 0, 1).expect("c2"), 5.0);
    }

    #[test]
    fn series_arithmetic_checks_shapes() {
        let f = x2y();
        let twice = f.try_add(&f).expect("same shape");
        assert_eq!(twice.evaluate(&[2.0, 3.0]).expect("evaluation")[0], 24.0);
        let zero = f.try_sub(&f).expect("same shape");
        assert!(zero.iter().all(|&c| c == 0.0));
        let other = Jet::<f64>::new(1, 2, 2).expect("jet should allocate");
        assert!(matches!(
            f.try_add(&other),
            Err(JetError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
        assert!(matches!(f.try_sub(&other), Err(JetError::DimensionMismatch { .. })));

        let m = DMatrix::from_row_slice(2, 1, &[1.0, -2.0]);
        let stacked = f.left_multiply(&m).expect("compatible");
        let value = stacked.evaluate(&[2.0, 3.0]).expect("evaluation");
        assert_eq!(value.as_slice(), &[12.0, -24.0]);
    }

    #[test]
    fn inverse_uses_lu_for_linear_part() {
        let mut c = Jet::<f64>::new(2, 2, 2).expect("jet should allocate");
        c.set_jacobian(&DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 1.0, 1.0]))
            .expect("jacobian");
        *c.second_order_mut(0, 0, 0).expect("c2") = 1.0;
        let inverse = c.inverse().expect("invertible linear part");
        let round_trip = inverse.compose(&c).expect("composition");
        let identity = Jet::<f64>::identity(2, 2).expect("identity");
        for (a, b) in round_trip.iter().zip(identity.iter()) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }

        let mut singular = Jet::<f64>::new(2, 2, 2).expect("jet should allocate");
        *singular.first_order_mut(0, 0).expect("c1") = 1.0;
        assert!(matches!(singular.inverse(), Err(JetError::SingularLinearPart)));
    }

    #[test]
    fn display_lists_coefficients_by_order() {
        let text = x2y().to_string();
        assert!(text.starts_with("value : {0}"));
        assert!(text.contains("Taylor coefficients of order 3 :"));
        assert!(text.contains("\n   (2,1)  : {1}"));
    }
}
