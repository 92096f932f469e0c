// SPDX-License-Identifier: MIT

//! Arithmetic tool backed by a small expression evaluator.
//!
//! Only numbers, operators, parentheses and a fixed set of math functions
//! and constants are understood; nothing in an expression can reach code
//! execution or the filesystem.

use crate::adk::error::Result;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Substrings refused before parsing
const BLOCKED_TOKENS: [&str; 8] = ["import", "exec", "eval", "open", "os.", "sys.", "__", "lambda"];

/// Longest expression accepted, in characters
const MAX_EXPRESSION_CHARS: usize = 1000;

/// Deepest nesting of parentheses, calls and signs the parser descends into
const MAX_DEPTH: usize = 64;

static CALCULATE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "expression": {
                "type": "string",
                "description": "Expression to evaluate, e.g. '2 + 3 * 4', 'sqrt(144)', 'sin(pi / 2)', '2 ** 10'"
            }
        },
        "required": ["expression"]
    })
});

#[derive(Debug, Deserialize)]
struct CalculateArgs {
    expression: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("unexpected {0}")]
    Syntax(String),

    #[error("{0}")]
    Domain(String),

    #[error("expression nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // scientific notation: 1e3, 2.5E-4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| CalcError::Syntax(format!("number '{}'", text)))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' | '^' | '(' | ')' | ',' => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Pow,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Comma,
                });
                i += 1;
            }
            other => return Err(CalcError::Syntax(format!("character '{}'", other))),
        }
    }

    Ok(tokens)
}

/// Recursive-descent evaluator.
///
/// Precedence, lowest first: `+ -`, `* / %`, unary sign, `** ^`
/// (right-associative, so `-2 ** 2 == -4` and `2 ** 3 ** 2 == 512`).
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> std::result::Result<(), CalcError> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(CalcError::Syntax(format!("{:?}", t))),
            None => Err(CalcError::Syntax("end of expression".to_string())),
        }
    }

    fn expression(&mut self) -> std::result::Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> std::result::Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    // result takes the sign of the divisor
                    value -= rhs * (value / rhs).floor();
                }
                _ => return Ok(value),
            }
        }
    }

    /// Entry for every nested level; bounded by `MAX_DEPTH`
    fn unary(&mut self) -> std::result::Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> std::result::Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<f64, CalcError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            if base == 0.0 && exponent < 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> std::result::Result<f64, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    call(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(t) => Err(CalcError::Syntax(format!("{:?}", t))),
            None => Err(CalcError::Syntax("end of expression".to_string())),
        }
    }

    /// Arguments after an opening parenthesis, through the closing one
    fn arguments(&mut self) -> std::result::Result<Vec<f64>, CalcError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(t) => return Err(CalcError::Syntax(format!("{:?}", t))),
                None => return Err(CalcError::Syntax("end of expression".to_string())),
            }
        }
    }
}

fn constant(name: &str) -> std::result::Result<f64, CalcError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        _ => Err(CalcError::UnknownName(name.to_string())),
    }
}

fn arity(name: &str, args: &[f64], min: usize, max: usize) -> std::result::Result<(), CalcError> {
    if args.len() < min || args.len() > max {
        return Err(CalcError::Domain(format!(
            "{}() takes {} argument(s), got {}",
            name,
            if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            },
            args.len()
        )));
    }
    Ok(())
}

fn call(name: &str, args: &[f64]) -> std::result::Result<f64, CalcError> {
    let domain = || CalcError::Domain("math domain error".to_string());

    match name {
        "sqrt" => {
            arity(name, args, 1, 1)?;
            if args[0] < 0.0 {
                return Err(domain());
            }
            Ok(args[0].sqrt())
        }
        "sin" | "cos" | "tan" | "abs" | "ceil" | "floor" | "log10" | "factorial" => {
            arity(name, args, 1, 1)?;
            let x = args[0];
            match name {
                "sin" => Ok(x.sin()),
                "cos" => Ok(x.cos()),
                "tan" => Ok(x.tan()),
                "abs" => Ok(x.abs()),
                "ceil" => Ok(x.ceil()),
                "floor" => Ok(x.floor()),
                "log10" if x > 0.0 => Ok(x.log10()),
                "factorial" => factorial(x),
                _ => Err(domain()),
            }
        }
        "log" => {
            arity(name, args, 1, 2)?;
            let x = args[0];
            if x <= 0.0 {
                return Err(domain());
            }
            match args.get(1) {
                None => Ok(x.ln()),
                Some(&base) if base > 0.0 && base != 1.0 => Ok(x.ln() / base.ln()),
                Some(_) => Err(domain()),
            }
        }
        "round" => {
            arity(name, args, 1, 2)?;
            let digits = args.get(1).copied().unwrap_or(0.0).trunc() as i32;
            let factor = 10f64.powi(digits);
            Ok(round_half_even(args[0] * factor) / factor)
        }
        "pow" => {
            arity(name, args, 2, 2)?;
            if args[0] == 0.0 && args[1] < 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            Ok(args[0].powf(args[1]))
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(CalcError::Domain(format!("{}() needs at least one argument", name)));
            }
            let fold: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().copied().fold(args[0], fold))
        }
        "sum" => Ok(args.iter().sum()),
        _ => Err(CalcError::UnknownName(name.to_string())),
    }
}

fn factorial(x: f64) -> std::result::Result<f64, CalcError> {
    if x < 0.0 || x.fract() != 0.0 {
        return Err(CalcError::Domain(
            "factorial() only accepts non-negative integers".to_string(),
        ));
    }
    if x > 170.0 {
        return Err(CalcError::Domain("factorial() result too large".to_string()));
    }
    Ok((1..=x as u64).fold(1.0, |acc, n| acc * n as f64))
}

/// Round half to even
fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

/// Evaluate an expression
pub fn evaluate(expression: &str) -> std::result::Result<f64, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::Syntax("empty expression".to_string()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some(t) = parser.peek() {
        return Err(CalcError::Syntax(format!("{:?}", t)));
    }
    if !value.is_finite() {
        return Err(CalcError::Domain("result is not a finite number".to_string()));
    }
    Ok(value)
}

/// Integral values print without a fractional part
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluates a math expression: arithmetic, powers, roots, trigonometry, logarithms, factorial, min/max/sum."
    }

    fn schema(&self) -> &Value {
        &CALCULATE_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let args: CalculateArgs = serde_json::from_value(input)?;
        let expression = args.expression.trim();
        if expression.chars().count() > MAX_EXPRESSION_CHARS {
            return Ok(format!(
                "Calculation error: expression longer than {} characters",
                MAX_EXPRESSION_CHARS
            ));
        }

        let lowered = expression.to_lowercase();
        if let Some(token) = BLOCKED_TOKENS.iter().find(|t| lowered.contains(*t)) {
            log::warn!("Refused calculator expression containing '{}'", token);
            return Ok(format!("Expression not allowed: {}", token));
        }

        Ok(match evaluate(expression) {
            Ok(value) => format!("Result: {} = {}", expression, format_number(value)),
            Err(CalcError::DivisionByZero) => "Error: division by zero".to_string(),
            Err(e) => format!("Calculation error: {}", e),
        })
    }
}
