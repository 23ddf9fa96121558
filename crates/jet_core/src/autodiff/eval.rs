//! Node operations at one time coefficient.
//!
//! Each operation fills time coefficient `coeff` of every multiindex of the
//! result node, assuming all lower coefficients of its operands (and, for
//! division, of the result) are already known. Offsets excluded by the mask
//! are skipped.

use super::dag_indexer::{DagIndexer, Workspace};
use crate::error::{ensure_index, JetError, Result};
use crate::traits::Scalar;

/// Constant node: `value` at the requested time coefficient, no derivatives.
pub fn set_constant<T: Scalar>(dag: &mut DagIndexer<T>, node: usize, value: T, coeff: usize) -> Result<()> {
    let ws = dag.workspace();
    ws.ensure_coefficient(coeff)?;
    let base = ws.node_base(node)?;
    for data in ws.index {
        let offset = data.index() + coeff;
        if ws.is_needed(offset) {
            ws.data[base + offset] = if data.is_value() { value } else { T::zero() };
        }
    }
    Ok(())
}

/// Independent variable `variable` whose time coefficient `coeff` is `value`.
///
/// The derivative with respect to itself is one at time coefficient zero.
pub fn set_variable<T: Scalar>(
    dag: &mut DagIndexer<T>,
    node: usize,
    variable: usize,
    value: T,
    coeff: usize,
) -> Result<()> {
    let ws = dag.workspace();
    ws.ensure_coefficient(coeff)?;
    ensure_index("variable", variable, ws.domain)?;
    let base = ws.node_base(node)?;
    for data in ws.index {
        let offset = data.index() + coeff;
        if !ws.is_needed(offset) {
            continue;
        }
        let mi = data.multiindex();
        ws.data[base + offset] = if data.is_value() {
            value
        } else if coeff == 0 && mi.module() == 1 && mi[variable] == 1 {
            T::one()
        } else {
            T::zero()
        };
    }
    Ok(())
}

pub fn add<T: Scalar>(dag: &mut DagIndexer<T>, left: usize, right: usize, result: usize, coeff: usize) -> Result<()> {
    elementwise(dag, [left, right], result, coeff, |l, r| l + r)
}

pub fn sub<T: Scalar>(dag: &mut DagIndexer<T>, left: usize, right: usize, result: usize, coeff: usize) -> Result<()> {
    elementwise(dag, [left, right], result, coeff, |l, r| l - r)
}

pub fn neg<T: Scalar>(dag: &mut DagIndexer<T>, operand: usize, result: usize, coeff: usize) -> Result<()> {
    elementwise(dag, [operand, operand], result, coeff, |l, _| -l)
}

/// `result = factor * operand`.
pub fn scale<T: Scalar>(dag: &mut DagIndexer<T>, operand: usize, factor: T, result: usize, coeff: usize) -> Result<()> {
    elementwise(dag, [operand, operand], result, coeff, |l, _| factor * l)
}

/// `result = left * right`, as the convolution over the precomputed pairs.
pub fn mul<T: Scalar>(dag: &mut DagIndexer<T>, left: usize, right: usize, result: usize, coeff: usize) -> Result<()> {
    ensure_distinct("mul", result, &[left, right])?;
    let ws = dag.workspace();
    ws.ensure_coefficient(coeff)?;
    let (lb, rb, out) = (ws.node_base(left)?, ws.node_base(right)?, ws.node_base(result)?);
    for data in ws.index {
        let target = data.index() + coeff;
        if !ws.is_needed(target) {
            continue;
        }
        let mut sum = T::zero();
        for &(ia, ib) in data.convolution(coeff) {
            sum += ws.data[lb + ia] * ws.data[rb + ib];
        }
        ws.data[out + target] = sum;
    }
    Ok(())
}

/// `result = left / right`.
///
/// Solves `left = result * right` for the target coefficient; every other
/// term of the convolution involves already computed coefficients of `result`.
pub fn div<T: Scalar>(dag: &mut DagIndexer<T>, left: usize, right: usize, result: usize, coeff: usize) -> Result<()> {
    ensure_distinct("div", result, &[left, right])?;
    let ws = dag.workspace();
    ws.ensure_coefficient(coeff)?;
    let (lb, rb, out) = (ws.node_base(left)?, ws.node_base(right)?, ws.node_base(result)?);
    let denominator = ws.data[rb];
    for data in ws.index {
        let target = data.index() + coeff;
        if !ws.is_needed(target) {
            continue;
        }
        let mut sum = T::zero();
        for &(ia, ib) in data.convolution(coeff) {
            if ia != target {
                sum += ws.data[out + ia] * ws.data[rb + ib];
            }
        }
        ws.data[out + target] = (ws.data[lb + target] - sum) / denominator;
    }
    Ok(())
}

fn elementwise<T: Scalar>(
    dag: &mut DagIndexer<T>,
    operands: [usize; 2],
    result: usize,
    coeff: usize,
    op: impl Fn(T, T) -> T,
) -> Result<()> {
    let ws: Workspace<'_, T> = dag.workspace();
    ws.ensure_coefficient(coeff)?;
    let (lb, rb, out) = (
        ws.node_base(operands[0])?,
        ws.node_base(operands[1])?,
        ws.node_base(result)?,
    );
    for data in ws.index {
        let offset = data.index() + coeff;
        if ws.is_needed(offset) {
            ws.data[out + offset] = op(ws.data[lb + offset], ws.data[rb + offset]);
        }
    }
    Ok(())
}

fn ensure_distinct(operation: &str, result: usize, operands: &[usize]) -> Result<()> {
    if operands.contains(&result) {
        return Err(JetError::InvalidArgument(format!(
            "{operation}: result node {result} aliases an operand"
        )));
    }
    Ok(())
}
