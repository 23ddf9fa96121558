//! Closed-form offsets inside one node block of a [`DagIndexer`](super::DagIndexer).
//!
//! A node block lists the multiindices in jet storage order; each multiindex
//! owns `order + 1` consecutive time coefficients.

use crate::cn_container::{second_order_offset, third_order_offset};
use crate::combinatorics::binomial_usize;
use crate::error::Result;

/// `C(domain + degree, degree)`, the number of multiindices per node.
pub fn jet_size(domain: usize, degree: usize) -> Result<usize> {
    binomial_usize(domain + degree, degree)
}

/// Offset of the value at time coefficient `coeff`.
pub fn c0_offset(coeff: usize) -> usize {
    coeff
}

/// Offset of `d/dx_der` at time coefficient `coeff`.
pub fn c1_offset(order: usize, der: usize, coeff: usize) -> usize {
    (der + 1) * (order + 1) + coeff
}

/// Offset of the `(j, c)` coefficient; symmetric in `j` and `c`.
pub fn c2_offset(domain: usize, order: usize, j: usize, c: usize, coeff: usize) -> usize {
    (1 + domain + second_order_offset(domain, j, c)) * (order + 1) + coeff
}

/// Offset of the `(j, c, k)` coefficient; requires `j <= c <= k`.
pub fn c3_offset(domain: usize, order: usize, j: usize, c: usize, k: usize, coeff: usize) -> Result<usize> {
    let begin = (1 + domain) * (2 + domain) / 2;
    Ok((begin + third_order_offset(domain, j, c, k)?) * (order + 1) + coeff)
}

/// Offset of the first multiindex of degree `d`.
pub fn degree_begin(domain: usize, order: usize, d: usize) -> Result<usize> {
    if d == 0 {
        return Ok(0);
    }
    Ok((order + 1) * binomial_usize(domain + d - 1, d - 1)?)
}

/// One past the last multiindex of degree `d`.
pub fn degree_end(domain: usize, order: usize, d: usize) -> Result<usize> {
    Ok((order + 1) * binomial_usize(domain + d, d)?)
}
