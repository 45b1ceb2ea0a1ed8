//! A small JSONata subset for `{% ... %}` templates.
//!
//! Supported: number, string, `true`/`false`/`null` literals, parentheses,
//! variable references with field and index steps (`$states.input.a[0]`,
//! `$total`), arithmetic `+ - * /`, string concatenation `&`, comparisons
//! `= != < <= > >=` and the `and`/`or` keywords. Function calls, lambdas,
//! predicates and the context item `$` are not supported.

use serde_json::{Map, Value};

use super::path::Segment;
use super::Fault;

pub(crate) struct Bindings<'a> {
    /// The `$states` object: `input`, `context`, and `result` /
    /// `errorOutput` where they exist.
    pub states: &'a Value,
    pub variables: &'a Value,
}

/// Evaluate every `{% %}` string inside `template`.
pub(crate) fn resolve_template(template: &Value, bindings: &Bindings<'_>) -> Result<Value, Fault> {
    match template {
        Value::String(s) => match expression_body(s) {
            Some(body) => evaluate(body, bindings)?.ok_or_else(|| {
                Fault::Runtime(format!("expression '{}' evaluated to nothing", body.trim()))
            }),
            None => Ok(template.clone()),
        },
        Value::Object(fields) => {
            let mut out = Map::new();
            for (key, value) in fields {
                out.insert(key.clone(), resolve_template(value, bindings)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_template(item, bindings))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn expression_body(s: &str) -> Option<&str> {
    s.trim().strip_prefix("{%")?.strip_suffix("%}")
}

/// Evaluate one expression. `None` is JSONata's "undefined".
pub(crate) fn evaluate(source: &str, bindings: &Bindings<'_>) -> Result<Option<Value>, Fault> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(Fault::Runtime(format!(
            "unexpected trailing input in expression '{}'",
            source.trim()
        )));
    }
    eval(&expr, bindings)
}

// ──────────────────────────────────────────────
// Lexer
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Var(String),
    Name(String),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Op(BinOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 25,
            BinOp::And => 30,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 40,
            BinOp::Add | BinOp::Sub | BinOp::Concat => 50,
            BinOp::Mul | BinOp::Div => 60,
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, Fault> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let is_name_char = |c: char| c.is_alphanumeric() || c == '_';

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text.parse::<f64>().map_err(|_| {
                    Fault::Runtime(format!("invalid number literal '{}'", text))
                })?;
                tokens.push(Token::Number(number));
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                if i == chars.len() {
                    return Err(Fault::Runtime("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            '$' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&'(') {
                    return Err(Fault::Unsupported(format!(
                        "function call '${}(...)' in expression",
                        name
                    )));
                }
                tokens.push(Token::Var(name));
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '&' | '=' => {
                tokens.push(Token::Op(match c {
                    '+' => BinOp::Add,
                    '-' => BinOp::Sub,
                    '*' => BinOp::Mul,
                    '/' => BinOp::Div,
                    '&' => BinOp::Concat,
                    _ => BinOp::Eq,
                }));
                i += 1;
            }
            '!' | '<' | '>' => {
                let followed_by_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, followed_by_eq) {
                    ('!', true) => BinOp::Ne,
                    ('<', true) => BinOp::Le,
                    ('>', true) => BinOp::Ge,
                    ('<', false) => BinOp::Lt,
                    ('>', false) => BinOp::Gt,
                    _ => return Err(Fault::Unsupported("operator '!'".to_string())),
                };
                tokens.push(Token::Op(op));
                i += if followed_by_eq { 2 } else { 1 };
            }
            c if is_name_char(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(match name.as_str() {
                    "and" => Token::Op(BinOp::And),
                    "or" => Token::Op(BinOp::Or),
                    _ => Token::Name(name),
                });
            }
            other => {
                return Err(Fault::Unsupported(format!(
                    "character '{}' in expression",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Var { name: String, steps: Vec<Segment> },
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Expr, Fault> {
        let mut left = self.primary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if op.precedence() <= min_precedence {
                break;
            }
            self.pos += 1;
            let right = self.expression(op.precedence())?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, Fault> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number(n)?)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Name(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                other => Err(Fault::Unsupported(format!(
                    "bare path '{}' (use $states.input.{})",
                    other, other
                ))),
            },
            Some(Token::Op(BinOp::Sub)) => {
                let operand = self.expression(BinOp::Mul.precedence())?;
                Ok(Expr::Neg(Box::new(operand)))
            }
            Some(Token::LParen) => {
                let inner = self.expression(0)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Fault::Runtime("expected ')'".to_string())),
                }
            }
            Some(Token::Var(name)) => {
                if name.is_empty() {
                    return Err(Fault::Unsupported("the context item '$'".to_string()));
                }
                let steps = self.steps()?;
                Ok(Expr::Var { name, steps })
            }
            Some(other) => Err(Fault::Runtime(format!("unexpected token {:?}", other))),
            None => Err(Fault::Runtime("unexpected end of expression".to_string())),
        }
    }

    fn steps(&mut self) -> Result<Vec<Segment>, Fault> {
        let mut steps = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Name(field)) => steps.push(Segment::Field(field)),
                        _ => return Err(Fault::Runtime("expected a field name after '.'".to_string())),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = match self.advance() {
                        Some(Token::Number(n)) if n >= 0.0 && n.fract() == 0.0 => n as usize,
                        _ => {
                            return Err(Fault::Unsupported(
                                "predicates other than a literal index".to_string(),
                            ))
                        }
                    };
                    match self.advance() {
                        Some(Token::RBracket) => steps.push(Segment::Index(index)),
                        _ => return Err(Fault::Runtime("expected ']'".to_string())),
                    }
                }
                _ => return Ok(steps),
            }
        }
    }
}

// ──────────────────────────────────────────────
// Evaluation
// ──────────────────────────────────────────────

fn eval(expr: &Expr, bindings: &Bindings<'_>) -> Result<Option<Value>, Fault> {
    match expr {
        Expr::Literal(value) => Ok(Some(value.clone())),
        Expr::Var { name, steps } => {
            let root = if name == "states" {
                Some(bindings.states)
            } else {
                bindings.variables.get(name)
            };
            Ok(root.and_then(|root| walk(root, steps)).cloned())
        }
        Expr::Neg(operand) => match eval(operand, bindings)? {
            None => Ok(None),
            Some(value) => number(-as_number(&value)?).map(Some),
        },
        Expr::Binary(left, op, right) => {
            let left = eval(left, bindings)?;
            let right = eval(right, bindings)?;
            binary(*op, left, right)
        }
    }
}

fn walk<'v>(root: &'v Value, steps: &[Segment]) -> Option<&'v Value> {
    steps.iter().try_fold(root, |current, step| match step {
        Segment::Field(name) => current.get(name.as_str()),
        Segment::Index(index) => current.get(*index),
    })
}

fn binary(op: BinOp, left: Option<Value>, right: Option<Value>) -> Result<Option<Value>, Fault> {
    match op {
        BinOp::And | BinOp::Or => {
            let l = left.as_ref().map(truthy).unwrap_or(false);
            let r = right.as_ref().map(truthy).unwrap_or(false);
            let out = if op == BinOp::And { l && r } else { l || r };
            Ok(Some(Value::Bool(out)))
        }
        BinOp::Concat => {
            let text = |v: Option<Value>| match v {
                None => String::new(),
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
            };
            Ok(Some(Value::String(text(left) + &text(right))))
        }
        BinOp::Eq | BinOp::Ne => {
            let (Some(l), Some(r)) = (left, right) else {
                return Ok(Some(Value::Bool(false)));
            };
            let equal = match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => l == r,
            };
            Ok(Some(Value::Bool(if op == BinOp::Eq { equal } else { !equal })))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (Some(l), Some(r)) = (left, right) else {
                return Ok(None);
            };
            let ordering = match (&l, &r) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => as_number(&l)?.partial_cmp(&as_number(&r)?),
            };
            let Some(ordering) = ordering else {
                return Ok(Some(Value::Bool(false)));
            };
            let out = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Some(Value::Bool(out)))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let (Some(l), Some(r)) = (left, right) else {
                return Ok(None);
            };
            let (a, b) = (as_number(&l)?, as_number(&r)?);
            let out = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ => {
                    if b == 0.0 {
                        return Err(Fault::Runtime("division by zero".to_string()));
                    }
                    a / b
                }
            };
            number(out).map(Some)
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().any(truthy),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn as_number(value: &Value) -> Result<f64, Fault> {
    value.as_f64().ok_or_else(|| {
        Fault::Runtime(format!(
            "arithmetic operand {} is not a number",
            value
        ))
    })
}

/// Whole results stay integers so `5 + 10` is `15`, not `15.0`.
fn number(n: f64) -> Result<Value, Fault> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        return Ok(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| Fault::Runtime(format!("result {} is not a finite number", n)))
}
