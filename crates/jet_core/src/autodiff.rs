//! Taylor coefficients of expression DAGs.
//!
//! Every node of the DAG owns one block of coefficients laid out by
//! [`DagIndexer`]; the operations in [`eval`] fill those blocks one time
//! coefficient at a time, and [`JetEvaluator`] drives them from compiled
//! expressions.

pub mod dag_indexer;
pub mod eval;
pub mod evaluator;
pub mod indexing;
pub mod multiindex_data;
pub mod types;

pub use dag_indexer::DagIndexer;
pub use evaluator::JetEvaluator;
pub use multiindex_data::MultiindexData;
pub use types::DagShape;
