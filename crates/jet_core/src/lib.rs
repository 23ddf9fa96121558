//! The `jet_core` crate is the jet algebra engine: truncated multivariate
//! power series of vector valued maps and the index machinery behind them.
//! It is generic over the coefficient type through [`Scalar`].
//!
//! Key components:
//! - **Combinatorics**: cached binomials and factorials shared by every index formula.
//! - **Multipointer / Multiindex**: the two spellings of a partial derivative, with enumeration and linear indices.
//! - **CnContainer**: flat per-component coefficient storage addressed by degree.
//! - **Jet**: Taylor polynomials with evaluation, composition, inversion and text I/O.
//! - **Autodiff**: `DagIndexer` coefficient blocks and a `JetEvaluator` for compiled expressions.
pub mod autodiff;
pub mod cn_container;
pub mod combinatorics;
pub mod error;
pub mod expression;
pub mod hessian;
pub mod jet;
pub mod multiindex;
pub mod multipointer;
pub mod partitions;
pub mod traits;

pub use autodiff::{DagIndexer, DagShape, JetEvaluator};
pub use cn_container::{CnContainer, ShapePolicy};
pub use error::{JetError, Result};
pub use hessian::Hessian;
pub use jet::Jet;
pub use multiindex::Multiindex;
pub use multipointer::Multipointer;
pub use traits::Scalar;
