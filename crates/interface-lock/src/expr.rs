//! Arithmetic over named constants, as found in `NAME = expression;`
//! constants sources.
//!
//! Grammar: numbers, identifiers, `+ - * /`, unary `+`/`-`, parentheses.
//! Anything else is a syntax error.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("unknown name `{0}`")]
    UnknownName(String),

    #[error("syntax error in `{expr}`: {reason}")]
    Syntax { expr: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let syntax = |reason: String| ExprError::Syntax {
        expr: expr.to_string(),
        reason,
    };
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent: 1e-3, 2.5E+2
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
                    .map_err(|_| syntax(format!("bad number `{text}`")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(syntax(format!("unexpected `{other}`"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    known: &'a BTreeMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn syntax(&self, reason: &str) -> ExprError {
        ExprError::Syntax {
            expr: self.expr.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expression(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, ExprError> {
        match self.next() {
            Some(Token::Number(v)) => Ok(v),
            Some(Token::Ident(name)) => self
                .known
                .get(&name)
                .copied()
                .ok_or(ExprError::UnknownName(name)),
            Some(Token::Open) => {
                let v = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(v),
                    _ => Err(self.syntax("missing `)`")),
                }
            }
            _ => Err(self.syntax("expected a number, name or `(`")),
        }
    }
}

/// Evaluate `expr` with the given named values.
pub fn evaluate(expr: &str, known: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        expr,
        tokens,
        pos: 0,
        known,
    };
    let value = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.syntax("trailing input"));
    }
    if !value.is_finite() {
        return Err(parser.syntax("result is not finite"));
    }
    Ok(value)
}

/// Extract `NAME = expression;` assignments, one per line, in file order.
/// `//` comments are stripped; other lines are ignored.
pub fn assignments(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = match line.find("//") {
                Some(at) => &line[..at],
                None => line,
            };
            let line = line.trim().strip_suffix(';')?;
            let (name, rhs) = line.split_once('=')?;
            let name = name.trim();
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.starts_with(|c: char| c.is_ascii_digit());
            valid.then(|| (name.to_string(), rhs.trim().to_string()))
        })
        .collect()
}

/// Resolve assignments that may reference each other in any order.
///
/// Evaluation repeats until no further assignment resolves. Returns the
/// resolved values and the names left unresolved at the fixed point.
/// Syntax errors are returned immediately.
pub fn resolve(
    pending: Vec<(String, String)>,
) -> Result<(BTreeMap<String, f64>, Vec<String>), ExprError> {
    let mut known = BTreeMap::new();
    let mut pending = pending;
    loop {
        let before = pending.len();
        let mut still = Vec::with_capacity(pending.len());
        for (name, expr) in pending {
            match evaluate(&expr, &known) {
                Ok(v) => {
                    known.insert(name, v);
                }
                Err(ExprError::UnknownName(_)) => still.push((name, expr)),
                Err(e) => return Err(e),
            }
        }
        pending = still;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }
    let unresolved = pending.into_iter().map(|(n, _)| n).collect();
    Ok((known, unresolved))
}
