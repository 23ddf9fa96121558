use crate::error::{ensure_index, Result};
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

/// Second order Taylor coefficients of a map `R^N -> R^M`.
///
/// Only `j <= c` is stored, `N(N+1)/2` entries per component, so the
/// accessors are symmetric in their two variable indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hessian<T> {
    image: usize,
    dimension: usize,
    data: Vec<T>,
}

impl<T: Scalar> Hessian<T> {
    pub fn zeros(image: usize, dimension: usize) -> Self {
        Self {
            image,
            dimension,
            data: vec![T::zero(); image * dimension * (dimension + 1) / 2],
        }
    }

    pub fn image_dimension(&self) -> usize {
        self.image
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, i: usize, j: usize, c: usize) -> Result<T> {
        let at = self.position(i, j, c)?;
        Ok(self.data[at])
    }

    pub fn get_mut(&mut self, i: usize, j: usize, c: usize) -> Result<&mut T> {
        let at = self.position(i, j, c)?;
        Ok(&mut self.data[at])
    }

    pub fn set(&mut self, i: usize, j: usize, c: usize, value: T) -> Result<()> {
        *self.get_mut(i, j, c)? = value;
        Ok(())
    }

    /// Same layout as the degree two block of a jet component.
    fn position(&self, i: usize, j: usize, c: usize) -> Result<usize> {
        ensure_index("component", i, self.image)?;
        let (j, c) = if j <= c { (j, c) } else { (c, j) };
        ensure_index("variable", c, self.dimension)?;
        let n = self.dimension;
        Ok(i * n * (n + 1) / 2 + c + j * n - j * (j + 1) / 2)
    }
}
