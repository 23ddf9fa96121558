//! Jets of compiled expressions.

use super::dag_indexer::DagIndexer;
use super::eval;
use super::types::DagShape;
use crate::error::{ensure_dimension, ensure_index, Result};
use crate::expression::{compile_equations, Bytecode, OpCode};
use crate::jet::Jet;
use crate::multiindex::Multiindex;
use crate::traits::Scalar;
use anyhow::{anyhow, bail};

/// One node operation; node ids index the [`DagIndexer`].
#[derive(Debug, Clone, Copy)]
enum Instruction<T> {
    Constant { node: usize, value: T },
    Param { node: usize, index: usize },
    Add { left: usize, right: usize, result: usize },
    Sub { left: usize, right: usize, result: usize },
    Mul { left: usize, right: usize, result: usize },
    Div { left: usize, right: usize, result: usize },
    Neg { operand: usize, result: usize },
    Scale { operand: usize, factor: T, result: usize },
}

/// Evaluates the jet of a map `R^domain -> R^image` given one bytecode
/// program per component.
///
/// Nodes `0..domain` hold the variables; every operation writes its own
/// node, so a program is a straight-line schedule over the DAG.
#[derive(Debug, Clone)]
pub struct JetEvaluator<T> {
    instructions: Vec<Instruction<T>>,
    outputs: Vec<usize>,
    params: Vec<T>,
    dag: DagIndexer<T>,
}

impl<T: Scalar> JetEvaluator<T> {
    pub fn new(programs: &[Bytecode], params: Vec<T>, domain: usize, degree: usize) -> anyhow::Result<Self> {
        let mut builder = ScheduleBuilder {
            instructions: Vec::new(),
            next_node: domain,
            domain,
            params: params.len(),
        };
        let mut outputs = Vec::with_capacity(programs.len());
        for (i, program) in programs.iter().enumerate() {
            let output = builder
                .schedule(program)
                .map_err(|e| anyhow!("Program {i}: {e}"))?;
            outputs.push(output);
        }
        let shape = DagShape::new(domain, programs.len(), degree, builder.next_node);
        log::debug!(
            "scheduled {} instructions over {} nodes for {} components",
            builder.instructions.len(),
            builder.next_node,
            outputs.len()
        );
        Ok(Self {
            instructions: builder.instructions,
            outputs,
            params,
            dag: DagIndexer::new(shape)?,
        })
    }

    /// Parses and compiles `equations` over the named variables and parameters.
    pub fn from_equations(
        equations: &[String],
        var_names: &[String],
        param_names: &[String],
        params: Vec<T>,
        degree: usize,
    ) -> anyhow::Result<Self> {
        if params.len() != param_names.len() {
            bail!(
                "Expected {} parameter values, got {}",
                param_names.len(),
                params.len()
            );
        }
        let programs = compile_equations(equations, var_names, param_names)?;
        Self::new(&programs, params, var_names.len(), degree)
    }

    pub fn dag(&self) -> &DagIndexer<T> {
        &self.dag
    }

    pub fn params(&self) -> &[T] {
        &self.params
    }

    pub fn set_params(&mut self, params: Vec<T>) -> Result<()> {
        ensure_dimension("set_params", self.params.len(), params.len())?;
        self.params = params;
        Ok(())
    }

    /// Reallocates for another degree; the mask is dropped.
    pub fn set_degree(&mut self, degree: usize) -> Result<()> {
        let shape = DagShape {
            degree,
            ..self.dag.shape()
        };
        self.dag.resize(shape)
    }

    pub fn set_order(&mut self, order: usize) -> Result<()> {
        self.dag.set_order(order)
    }

    /// Restricts evaluation to what the listed multiindices depend on.
    pub fn set_mask(&mut self, multiindices: &[Multiindex]) -> Result<()> {
        self.dag.set_mask(multiindices)
    }

    pub fn clear_mask(&mut self) {
        self.dag.clear_mask();
    }

    /// Jet of the map at `point`.
    pub fn evaluate(&mut self, point: &[T]) -> Result<Jet<T>> {
        let series: Vec<Vec<T>> = point.iter().map(|&x| vec![x]).collect();
        self.evaluate_series(&series)?;
        self.jet(0)
    }

    /// Propagates time series of the variables through every node.
    ///
    /// `series[v][n]` is time coefficient `n` of variable `v`; missing
    /// coefficients are zero.
    pub fn evaluate_series(&mut self, series: &[Vec<T>]) -> Result<()> {
        let domain = self.dag.domain_dimension();
        ensure_dimension("evaluate", domain, series.len())?;
        for coeff in 0..=self.dag.order() {
            for (variable, values) in series.iter().enumerate() {
                let value = values.get(coeff).copied().unwrap_or_else(T::zero);
                eval::set_variable(&mut self.dag, variable, variable, value, coeff)?;
            }
            for instruction in &self.instructions {
                run(&mut self.dag, &self.params, *instruction, coeff)?;
            }
        }
        Ok(())
    }

    /// Time coefficient `coeff` of the last evaluation, as a jet.
    pub fn jet(&self, coeff: usize) -> Result<Jet<T>> {
        ensure_index("time coefficient", coeff, self.dag.order() + 1)?;
        let mut jet = Jet::new(
            self.outputs.len(),
            self.dag.domain_dimension(),
            self.dag.degree(),
        )?;
        let block = jet.block_len();
        let data = self.dag.data();
        for (component, &node) in self.outputs.iter().enumerate() {
            let base = self.dag.begin(node)?;
            for (pos, entry) in self.dag.index_array().iter().enumerate() {
                jet[component * block + pos] = data[base + entry.index() + coeff];
            }
        }
        Ok(jet)
    }
}

fn run<T: Scalar>(dag: &mut DagIndexer<T>, params: &[T], instruction: Instruction<T>, coeff: usize) -> Result<()> {
    let constant = |value: T| if coeff == 0 { value } else { T::zero() };
    match instruction {
        Instruction::Constant { node, value } => eval::set_constant(dag, node, constant(value), coeff),
        Instruction::Param { node, index } => eval::set_constant(dag, node, constant(params[index]), coeff),
        Instruction::Add { left, right, result } => eval::add(dag, left, right, result, coeff),
        Instruction::Sub { left, right, result } => eval::sub(dag, left, right, result, coeff),
        Instruction::Mul { left, right, result } => eval::mul(dag, left, right, result, coeff),
        Instruction::Div { left, right, result } => eval::div(dag, left, right, result, coeff),
        Instruction::Neg { operand, result } => eval::neg(dag, operand, result, coeff),
        Instruction::Scale { operand, factor, result } => eval::scale(dag, operand, factor, result, coeff),
    }
}

fn pop(stack: &mut Vec<usize>) -> anyhow::Result<usize> {
    stack.pop().ok_or_else(|| anyhow!("Stack underflow"))
}

struct ScheduleBuilder<T> {
    instructions: Vec<Instruction<T>>,
    next_node: usize,
    domain: usize,
    params: usize,
}

impl<T: Scalar> ScheduleBuilder<T> {
    fn allocate(&mut self) -> usize {
        self.next_node += 1;
        self.next_node - 1
    }

    /// Appends the instructions of `program`; returns its output node.
    fn schedule(&mut self, program: &Bytecode) -> anyhow::Result<usize> {
        let mut stack: Vec<usize> = Vec::new();
        for op in &program.ops {
            match *op {
                OpCode::LoadConst(val) => {
                    let value = T::from_f64(val).ok_or_else(|| anyhow!("Constant {val} is not representable"))?;
                    let node = self.allocate();
                    self.instructions.push(Instruction::Constant { node, value });
                    stack.push(node);
                }
                OpCode::LoadVar(idx) => {
                    if idx >= self.domain {
                        bail!("Variable index {idx} out of range (domain {})", self.domain);
                    }
                    stack.push(idx);
                }
                OpCode::LoadParam(index) => {
                    if index >= self.params {
                        bail!("Parameter index {index} out of range ({} parameters)", self.params);
                    }
                    let node = self.allocate();
                    self.instructions.push(Instruction::Param { node, index });
                    stack.push(node);
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    let result = self.allocate();
                    self.instructions.push(match *op {
                        OpCode::Add => Instruction::Add { left, right, result },
                        OpCode::Sub => Instruction::Sub { left, right, result },
                        OpCode::Mul => Instruction::Mul { left, right, result },
                        _ => Instruction::Div { left, right, result },
                    });
                    stack.push(result);
                }
                OpCode::Neg => {
                    let operand = pop(&mut stack)?;
                    let result = self.allocate();
                    self.instructions.push(Instruction::Neg { operand, result });
                    stack.push(result);
                }
                OpCode::PowInt(n) => {
                    let base = pop(&mut stack)?;
                    let result = self.power(base, n);
                    stack.push(result);
                }
            }
        }
        let output = pop(&mut stack)?;
        if !stack.is_empty() {
            bail!("{} values left on the stack", stack.len());
        }
        Ok(output)
    }

    /// `base^n` by repeated squaring, `O(log n)` nodes.
    fn power(&mut self, base: usize, n: u32) -> usize {
        if n <= 1 {
            let result = self.allocate();
            self.instructions.push(if n == 0 {
                Instruction::Constant {
                    node: result,
                    value: T::one(),
                }
            } else {
                Instruction::Scale {
                    operand: base,
                    factor: T::one(),
                    result,
                }
            });
            return result;
        }
        let mut accumulated: Option<usize> = None;
        let mut square = base;
        let mut exponent = n;
        loop {
            if exponent & 1 == 1 {
                accumulated = Some(match accumulated {
                    None => square,
                    Some(left) => self.product(left, square),
                });
            }
            exponent >>= 1;
            if exponent == 0 {
                break;
            }
            square = self.product(square, square);
        }
        accumulated.unwrap_or(square)
    }

    fn product(&mut self, left: usize, right: usize) -> usize {
        let result = self.allocate();
        self.instructions.push(Instruction::Mul { left, right, result });
        result
    }
}
