//! Polynomial and rational expressions compiled to stack bytecode.
//!
//! The bytecode is consumed by [`JetEvaluator`](crate::autodiff::JetEvaluator),
//! which maps every operation onto a node of a [`DagIndexer`](crate::autodiff::DagIndexer).

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;

/// Operations of the stack machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant.
    LoadConst(f64),
    /// Pushes a state variable by index (0 = first variable name).
    LoadVar(usize),
    /// Pushes a parameter by index.
    LoadParam(usize),
    /// Pops b, a; pushes a + b.
    Add,
    /// Pops b, a; pushes a - b.
    Sub,
    /// Pops b, a; pushes a * b.
    Mul,
    /// Pops b, a; pushes a / b.
    Div,
    /// Pops a; pushes -a.
    Neg,
    /// Pops a; pushes a^n.
    PowInt(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>),
    Unary(char, Box<Expr>),
    Call(String, Box<Expr>),
}

/// Resolves names to variable and parameter indices and emits bytecode.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String], param_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { var_map, param_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else {
                    bail!("Unknown variable or parameter: {name}");
                }
            }
            Expr::Binary(left, '^', right) => {
                let exponent = integer_exponent(right)?;
                self.compile_recursive(left, ops)?;
                ops.push(OpCode::PowInt(exponent));
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    _ => bail!("Unknown binary operator: {op}"),
                });
            }
            Expr::Unary('-', operand) => {
                self.compile_recursive(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Unary(op, _) => bail!("Unknown unary operator: {op}"),
            Expr::Call(func, _) => bail!("Unsupported function: {func}"),
        }
        Ok(())
    }
}

/// Exponents must be non-negative integer literals, or towers of them.
fn integer_exponent(expr: &Expr) -> Result<u32> {
    match expr {
        Expr::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX) => Ok(*n as u32),
        Expr::Binary(base, '^', exponent) => {
            let (base, exponent) = (integer_exponent(base)?, integer_exponent(exponent)?);
            base.checked_pow(exponent)
                .ok_or_else(|| anyhow!("Exponent {base}^{exponent} overflows"))
        }
        _ => bail!("Exponent must be a non-negative integer literal, got {expr:?}"),
    }
}

/// Parses and compiles one expression per image component.
pub fn compile_equations(
    equations: &[String],
    var_names: &[String],
    param_names: &[String],
) -> Result<Vec<Bytecode>> {
    let compiler = Compiler::new(var_names, param_names);
    equations
        .iter()
        .enumerate()
        .map(|(i, source)| -> Result<Bytecode> {
            let expr = parse(source).map_err(|e| anyhow!("Equation {i} ('{source}'): {e}"))?;
            compiler
                .compile(&expr)
                .map_err(|e| anyhow!("Equation {i} ('{source}'): {e}"))
        })
        .collect()
}

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected trailing token {token:?}");
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| anyhow!("Invalid number literal '{num_str}'"))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => bail!("Unexpected character '{c}'"),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_factor()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary('-', Box::new(expr)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let mut left = self.parse_primary()?;

        while let Some(Token::Caret) = self.peek() {
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), '^', Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_expression()?;
                    match self.consume() {
                        Some(Token::RParen) => Ok(Expr::Call(name, Box::new(arg))),
                        _ => bail!("Expected ')'"),
                    }
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(expr),
                    _ => bail!("Expected ')'"),
                }
            }
            Some(token) => bail!("Unexpected token {token:?}"),
            None => bail!("Unexpected end of expression"),
        }
    }
}
