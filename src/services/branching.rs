//! Branching-logic evaluator.
//!
//! Understands the expression subset exports actually use: field
//! references (`[age]`, `[colors(2)]`), string and number literals,
//! comparisons, `and` / `or` and parentheses. Anything it cannot parse is
//! logged and treated as visible.

use crate::model::{FieldSchema, FieldValue, Values};

use super::BranchingEvaluator;

/// Evaluates `branching_logic` expressions against the instance values.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionBranching;

impl BranchingEvaluator for ExpressionBranching {
    fn is_visible(&self, field: &FieldSchema, values: &Values) -> bool {
        let Some(logic) = field.branching_logic.as_deref() else {
            return true;
        };
        if logic.trim().is_empty() {
            return true;
        }
        match evaluate(logic, values) {
            Ok(visible) => visible,
            Err(reason) => {
                log::warn!(
                    "branching logic of '{}' is invalid ({}); showing the field",
                    field.name,
                    reason
                );
                true
            }
        }
    }
}

/// Evaluate an expression to a boolean.
pub fn evaluate(logic: &str, values: &Values) -> Result<bool, String> {
    let tokens = tokenize(logic)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        values,
    };
    let result = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return Err(format!("unexpected token at position {}", parser.pos));
    }
    Ok(is_truthy(&result))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Checkbox(String, String),
    Str(String),
    Num(String),
    Bool(bool),
    Op(CompareOp),
    And,
    Or,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .ok_or("unterminated field reference")?;
                let inner: String = chars[i + 1..i + end].iter().collect();
                tokens.push(field_token(inner.trim())?);
                i += end + 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or("unterminated string literal")?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                }
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Lte));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Gte));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Num(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => return Err(format!("unknown word '{}'", word)),
                });
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

fn field_token(inner: &str) -> Result<Token, String> {
    if inner.is_empty() {
        return Err("empty field reference".to_string());
    }
    match inner.find('(') {
        Some(open) => {
            let code = inner[open + 1..]
                .strip_suffix(')')
                .ok_or("malformed checkbox reference")?;
            Ok(Token::Checkbox(inner[..open].to_string(), code.to_string()))
        }
        None => Ok(Token::Field(inner.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Text(String),
    Bool(bool),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    values: &'a Values,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self) -> Result<Operand, String> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Operand::Bool(is_truthy(&left) || is_truthy(&right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Operand, String> {
        let mut left = self.comparison()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.comparison()?;
            left = Operand::Bool(is_truthy(&left) && is_truthy(&right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Operand, String> {
        let left = self.primary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.primary()?;
            return Ok(Operand::Bool(compare(&left, &right, op)));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Operand, String> {
        let token = self.peek().cloned().ok_or("unexpected end of expression")?;
        self.pos += 1;
        match token {
            Token::Open => {
                let inner = self.or_expr()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("missing ')'".to_string());
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Field(name) => Ok(Operand::Text(self.scalar(&name))),
            Token::Checkbox(name, code) => {
                let chosen = self
                    .values
                    .get(&name)
                    .is_some_and(|v| v.is_chosen(&code));
                Ok(Operand::Text(if chosen { "1" } else { "0" }.to_string()))
            }
            Token::Str(s) | Token::Num(s) => Ok(Operand::Text(s)),
            Token::Bool(b) => Ok(Operand::Bool(b)),
            other => Err(format!("unexpected {:?}", other)),
        }
    }

    fn scalar(&self, name: &str) -> String {
        match self.values.get(name) {
            Some(FieldValue::Scalar(s)) => s.clone(),
            _ => String::new(),
        }
    }
}

fn as_f64(v: &Operand) -> Option<f64> {
    match v {
        Operand::Text(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers compare numerically, everything else as strings.
fn compare(a: &Operand, b: &Operand, op: CompareOp) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(na), Some(nb)) => match op {
            CompareOp::Eq => na == nb,
            CompareOp::Ne => na != nb,
            CompareOp::Gt => na > nb,
            CompareOp::Lt => na < nb,
            CompareOp::Gte => na >= nb,
            CompareOp::Lte => na <= nb,
        },
        _ => {
            let sa = operand_string(a);
            let sb = operand_string(b);
            match op {
                CompareOp::Eq => sa == sb,
                CompareOp::Ne => sa != sb,
                CompareOp::Gt => sa > sb,
                CompareOp::Lt => sa < sb,
                CompareOp::Gte => sa >= sb,
                CompareOp::Lte => sa <= sb,
            }
        }
    }
}

fn operand_string(v: &Operand) -> String {
    match v {
        Operand::Text(s) => s.clone(),
        Operand::Bool(b) => if *b { "1" } else { "0" }.to_string(),
    }
}

fn is_truthy(v: &Operand) -> bool {
    match v {
        Operand::Bool(b) => *b,
        Operand::Text(s) => match as_f64(v) {
            Some(n) => n != 0.0,
            None => !s.is_empty(),
        },
    }
}
