//! Shape parameters of an automatic differentiation workspace.

use serde::{Deserialize, Serialize};

/// Size of a [`DagIndexer`](super::DagIndexer) coefficient block.
///
/// Every node stores `(order + 1) * C(domain + degree, degree)` coefficients:
/// all partial derivatives up to `degree` with respect to the `domain`
/// variables, each as a Taylor series in time up to `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagShape {
    pub domain: usize,
    pub image: usize,
    pub degree: usize,
    pub nodes: usize,
    /// Time order; plain function evaluation uses `0`.
    #[serde(default)]
    pub order: usize,
}

impl DagShape {
    pub fn new(domain: usize, image: usize, degree: usize, nodes: usize) -> Self {
        Self {
            domain,
            image,
            degree,
            nodes,
            order: 0,
        }
    }

    pub fn with_order(self, order: usize) -> Self {
        Self { order, ..self }
    }
}

impl Default for DagShape {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}
