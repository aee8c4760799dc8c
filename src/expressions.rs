//! Aperture macro arithmetic.
//!
//! Expressions are chains of operands joined by left-associative operators. Multiplication and division
//! bind tighter than addition and subtraction because the parser nests product chains inside sum chains,
//! the evaluator itself just folds each chain from left to right.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use log::trace;

pub use crate::error::ExpressionEvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expression {
    Constant(f64),
    /// `$n`
    Variable(u32),
    Negate(Box<Expression>),
    Positive(Box<Expression>),
    Parenthesis(Box<Expression>),
    Chain {
        head: Box<Expression>,
        tail: Vec<(Operator, Expression)>,
    },
}

impl Expression {
    pub fn chain(head: Expression, tail: Vec<(Operator, Expression)>) -> Self {
        Expression::Chain {
            head: Box::new(head),
            tail,
        }
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::Constant(value)
    }
}

/// Variable bindings of one macro instantiation, `$1`, `$2`, ...
#[derive(Debug, Clone, Default)]
pub struct MacroContext {
    variables: HashMap<u32, f64>,
}

impl MacroContext {
    /// Binds the aperture definition parameters to `$1..$n`.
    pub fn from_parameters(parameters: &[f64]) -> Self {
        let variables = parameters
            .iter()
            .enumerate()
            .map(|(index, value)| ((index + 1) as u32, *value))
            .collect();

        Self {
            variables,
        }
    }

    pub fn put(&mut self, number: u32, value: f64) -> Result<(), ExpressionEvaluationError> {
        if number == 0 {
            return Err(ExpressionEvaluationError::InvalidVariable(number));
        }
        self.variables.insert(number, value);
        Ok(())
    }

    /// Unbound variables read as zero.
    pub fn get(&self, number: u32) -> f64 {
        match self.variables.get(&number) {
            Some(value) => *value,
            None => {
                trace!("variable ${} is not bound, using 0", number);
                0.0
            }
        }
    }
}

pub fn evaluate_expression(expression: &Expression, context: &MacroContext) -> Result<f64, ExpressionEvaluationError> {
    match expression {
        Expression::Constant(value) => Ok(*value),
        Expression::Variable(number) => match number {
            0 => Err(ExpressionEvaluationError::InvalidVariable(0)),
            _ => Ok(context.get(*number)),
        },
        Expression::Negate(operand) => Ok(-evaluate_expression(operand, context)?),
        Expression::Positive(operand) | Expression::Parenthesis(operand) => evaluate_expression(operand, context),
        Expression::Chain {
            head,
            tail,
        } => tail
            .iter()
            .try_fold(evaluate_expression(head, context)?, |left, (operator, operand)| {
                let right = evaluate_expression(operand, context)?;
                match operator {
                    Operator::Add => Ok(left + right),
                    Operator::Subtract => Ok(left - right),
                    Operator::Multiply => Ok(left * right),
                    Operator::Divide if right == 0.0 => Err(ExpressionEvaluationError::DivisionByZero),
                    Operator::Divide => Ok(left / right),
                }
            }),
    }
}

impl FromStr for Expression {
    type Err = ExpressionEvaluationError;

    /// Parses macro arithmetic text, e.g. `$1x0.5-(2/$3)`. `x` or `X` multiplies.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parser = ExpressionParser {
            text,
            chars: text.chars().peekable(),
        };
        let expression = parser.parse_sum()?;
        parser.skip_whitespace();
        match parser.chars.peek().copied() {
            None => Ok(expression),
            Some(c) => Err(parser.error(format!("unexpected '{}' after expression", c))),
        }
    }
}

struct ExpressionParser<'a> {
    text: &'a str,
    chars: Peekable<Chars<'a>>,
}

impl ExpressionParser<'_> {
    fn error(&self, reason: String) -> ExpressionEvaluationError {
        ExpressionEvaluationError::Syntax {
            expression: self.text.to_string(),
            reason,
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .chars
            .next_if(|c| c.is_whitespace())
            .is_some()
        {}
    }

    fn parse_sum(&mut self) -> Result<Expression, ExpressionEvaluationError> {
        let head = self.parse_product()?;
        let mut tail = vec![];
        loop {
            self.skip_whitespace();
            let operator = match self.chars.peek() {
                Some('+') => Operator::Add,
                Some('-') => Operator::Subtract,
                _ => break,
            };
            self.chars.next();
            tail.push((operator, self.parse_product()?));
        }
        Ok(Self::wrap(head, tail))
    }

    fn parse_product(&mut self) -> Result<Expression, ExpressionEvaluationError> {
        let head = self.parse_unary()?;
        let mut tail = vec![];
        loop {
            self.skip_whitespace();
            let operator = match self.chars.peek() {
                Some('x' | 'X') => Operator::Multiply,
                Some('/') => Operator::Divide,
                _ => break,
            };
            self.chars.next();
            tail.push((operator, self.parse_unary()?));
        }
        Ok(Self::wrap(head, tail))
    }

    fn wrap(head: Expression, tail: Vec<(Operator, Expression)>) -> Expression {
        match tail.is_empty() {
            true => head,
            false => Expression::chain(head, tail),
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ExpressionEvaluationError> {
        self.skip_whitespace();
        match self.chars.peek() {
            Some('-') => {
                self.chars.next();
                Ok(Expression::Negate(Box::new(self.parse_unary()?)))
            }
            Some('+') => {
                self.chars.next();
                Ok(Expression::Positive(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expression, ExpressionEvaluationError> {
        self.skip_whitespace();
        match self.chars.peek().copied() {
            Some('(') => {
                self.chars.next();
                let inner = self.parse_sum()?;
                self.skip_whitespace();
                match self.chars.next() {
                    Some(')') => Ok(Expression::Parenthesis(Box::new(inner))),
                    _ => Err(self.error("missing closing parenthesis".to_string())),
                }
            }
            Some('$') => {
                self.chars.next();
                let digits = self.take_while(|c| c.is_ascii_digit());
                let number = digits
                    .parse::<u32>()
                    .map_err(|_| self.error(format!("bad variable '${}'", digits)))?;
                Ok(Expression::Variable(number))
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let digits = self.take_while(|c| c.is_ascii_digit() || c == '.');
                let value = digits
                    .parse::<f64>()
                    .map_err(|_| self.error(format!("bad number '{}'", digits)))?;
                Ok(Expression::Constant(value))
            }
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut result = String::new();
        while let Some(c) = self.chars.next_if(|c| predicate(*c)) {
            result.push(c);
        }
        result
    }
}
