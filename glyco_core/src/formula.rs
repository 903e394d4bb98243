//! Restricted arithmetic formulas over the glucose value.
//!
//! A caregiver can replace the rule table with a formula such as
//! `(glucose - 100) / 30`. The language is deliberately tiny:
//! - decimal literals, one variable (`glucose`, `glicemia` or `g`, any case)
//! - binary `+ - * / % ^`, unary minus, parentheses
//!
//! Comparison, logical and conditional operators, factorial, function calls,
//! text literals and any other identifier are rejected at compile time.
//! Evaluation never panics; every failure is a [`FormulaError`].

use logos::Logos;
use std::fmt;

/// Name every alias is rewritten to before parsing
pub const CANONICAL_VARIABLE: &str = "glucose";

/// Accepted spellings of the glucose variable (compared case-insensitively)
pub const VARIABLE_ALIASES: [&str; 3] = ["glucose", "glicemia", "g"];

/// Glucose value used by [`validate`] to prove the formula yields a number
pub const SAMPLE_GLUCOSE: f64 = 150.0;

/// Glucose value used by [`preview`] for the "for example" display
pub const PREVIEW_GLUCOSE: f64 = 200.0;

/// Inclusive bounds for an accepted dose, in insulin units
pub const MIN_UNITS: f64 = 0.0;
pub const MAX_UNITS: f64 = 100.0;

const MAX_LENGTH: usize = 256;
const MAX_DEPTH: usize = 32;

/// Why a formula was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula cannot be empty")]
    Empty,

    #[error("formula is too long ({len} characters, maximum {max})")]
    TooLong { len: usize, max: usize },

    #[error("syntax error: unexpected character '{snippet}' at position {position}")]
    UnexpectedChar { position: usize, snippet: String },

    #[error("operator '{op}' is not allowed; use only + - * / % ^")]
    ForbiddenOperator { op: String, position: usize },

    #[error("text literals are not allowed (position {position})")]
    TextLiteral { position: usize },

    #[error("syntax error: unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("syntax error: formula ends unexpectedly")]
    UnexpectedEnd,

    #[error("syntax error: parenthesis opened at position {position} is never closed")]
    UnclosedParen { position: usize },

    #[error("function calls are not allowed: {name}(...)")]
    FunctionCall { name: String },

    #[error("formula is nested more than {max} levels deep")]
    TooDeep { max: usize },

    #[error("formula must use the variable \"glucose\" (or \"glicemia\" / \"g\")")]
    MissingVariable,

    #[error("variable not allowed: {name}; use only \"glucose\", \"glicemia\" or \"g\"")]
    DisallowedVariable { name: String },

    #[error("formula gives a non-finite result for glucose {glucose}")]
    NonFinite { glucose: f64 },

    #[error("formula gives {result} units for glucose {glucose}; doses must be between 0 and 100")]
    OutOfBounds { glucose: f64, result: f64 },
}

// ============================================================================
// Lexing
// ============================================================================

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[regex(r"[0-9]+(\.[0-9]*)?|\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Recognised only so they can be rejected with a clear reason
    #[regex(r"[!<>=&|?:~]+", |lex| lex.slice().to_string())]
    Operator(String),

    #[regex(r#""[^"]*"|'[^']*'"#)]
    Text,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Text => write!(f, "text"),
        }
    }
}

type Spanned = (Token, usize);

fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(Token::Operator(op)) => {
                return Err(FormulaError::ForbiddenOperator {
                    op,
                    position: span.start,
                })
            }
            Ok(Token::Text) => {
                return Err(FormulaError::TextLiteral {
                    position: span.start,
                })
            }
            Ok(token) => tokens.push((token, span.start)),
            Err(_) => {
                return Err(FormulaError::UnexpectedChar {
                    position: span.start,
                    snippet: source[span].to_string(),
                })
            }
        }
    }

    Ok(tokens)
}

/// Rewrite every accepted alias to the canonical variable name.
fn normalize(tokens: Vec<Spanned>) -> Vec<Spanned> {
    tokens
        .into_iter()
        .map(|(token, position)| match token {
            Token::Ident(name) if is_alias(&name) => {
                (Token::Ident(CANONICAL_VARIABLE.to_string()), position)
            }
            other => (other, position),
        })
        .collect()
}

fn is_alias(name: &str) -> bool {
    VARIABLE_ALIASES
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(name))
}

// ============================================================================
// Syntax tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
            BinOp::Rem => lhs % rhs,
            BinOp::Pow => lhs.powf(rhs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Glucose,
    /// Any identifier that is not an alias; rejected by [`Formula::compile`]
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, glucose: f64) -> f64 {
        match self {
            Expr::Num(n) => *n,
            Expr::Glucose => glucose,
            Expr::Var(_) => f64::NAN,
            Expr::Neg(inner) => -inner.eval(glucose),
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(glucose), rhs.eval(glucose)),
        }
    }

    fn uses_glucose(&self) -> bool {
        match self {
            Expr::Glucose => true,
            Expr::Num(_) | Expr::Var(_) => false,
            Expr::Neg(inner) => inner.uses_glucose(),
            Expr::Binary(_, lhs, rhs) => lhs.uses_glucose() || rhs.uses_glucose(),
        }
    }

    fn first_foreign_variable(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            Expr::Num(_) | Expr::Glucose => None,
            Expr::Neg(inner) => inner.first_foreign_variable(),
            Expr::Binary(_, lhs, rhs) => lhs
                .first_foreign_variable()
                .or_else(|| rhs.first_foreign_variable()),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Recursive-descent parser, lowest precedence first:
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := unary (('*' | '/' | '%') unary)*
/// unary   := '-' unary | power
/// power   := primary ('^' unary)?
/// primary := number | ident | '(' expr ')'
/// ```
struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Expr, FormulaError> {
        let expr = self.parse_expr()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some((token, position)) => Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                position: *position,
            }),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { max: MAX_DEPTH });
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            self.descend()?;
            let inner = self.parse_unary()?;
            self.ascend();
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_primary()?;
        if self.peek() != Some(&Token::Caret) {
            return Ok(base);
        }
        self.advance();
        self.descend()?;
        // Right-associative: 2^3^2 == 2^(3^2)
        let exponent = self.parse_unary()?;
        self.ascend();
        Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)))
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let (token, position) = self.advance().ok_or(FormulaError::UnexpectedEnd)?;
        match token {
            Token::Number(n) => Ok(Expr::Num(n)),
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    return Err(FormulaError::FunctionCall { name });
                }
                if name == CANONICAL_VARIABLE {
                    Ok(Expr::Glucose)
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some((Token::RParen, _)) => {
                        self.ascend();
                        Ok(inner)
                    }
                    Some((found, position)) => Err(FormulaError::UnexpectedToken {
                        found: found.to_string(),
                        position,
                    }),
                    None => Err(FormulaError::UnclosedParen { position }),
                }
            }
            other => Err(FormulaError::UnexpectedToken {
                found: other.to_string(),
                position,
            }),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// A formula that has passed syntax and variable checks.
///
/// Compiling once and evaluating many times is cheap; the tree holds no state
/// and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Normalize aliases, parse, and check variable usage.
    pub fn compile(expression: &str) -> Result<Self, FormulaError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(FormulaError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_LENGTH {
            return Err(FormulaError::TooLong {
                len,
                max: MAX_LENGTH,
            });
        }

        let tokens = normalize(tokenize(trimmed)?);
        let expr = Parser::new(tokens).parse()?;

        if !expr.uses_glucose() {
            return Err(FormulaError::MissingVariable);
        }
        if let Some(name) = expr.first_foreign_variable() {
            return Err(FormulaError::DisallowedVariable {
                name: name.to_string(),
            });
        }

        Ok(Self {
            source: trimmed.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Raw arithmetic result, unguarded.
    pub fn raw(&self, glucose: f64) -> f64 {
        self.expr.eval(glucose)
    }

    /// Evaluate and apply the dose guards: finite, then within `[0, 100]`.
    pub fn dose(&self, glucose: f64) -> Result<f64, FormulaError> {
        let result = self.raw(glucose);
        if !result.is_finite() {
            return Err(FormulaError::NonFinite { glucose });
        }
        if !(MIN_UNITS..=MAX_UNITS).contains(&result) {
            return Err(FormulaError::OutOfBounds { glucose, result });
        }
        Ok(result)
    }
}

/// Check a formula before it is stored.
///
/// Passes only if the formula compiles and yields an accepted dose for the
/// sample glucose of 150, so a valid formula always evaluates at 150.
pub fn validate(expression: &str) -> Result<(), FormulaError> {
    Formula::compile(expression)?
        .dose(SAMPLE_GLUCOSE)
        .map(|_| ())
}

/// Evaluate a formula for `glucose`, or `None` on any failure.
pub fn evaluate(expression: &str, glucose: f64) -> Option<f64> {
    match Formula::compile(expression).and_then(|formula| formula.dose(glucose)) {
        Ok(units) => Some(units),
        Err(e) => {
            tracing::debug!("Formula {:?} rejected for glucose {}: {}", expression, glucose, e);
            None
        }
    }
}

/// Validate, then evaluate at `glucose`, keeping the failure reason.
pub fn test_dose(expression: &str, glucose: f64) -> Result<f64, FormulaError> {
    let formula = Formula::compile(expression)?;
    formula.dose(SAMPLE_GLUCOSE)?;
    formula.dose(glucose)
}

/// Example dose at 200 mg/dL, rounded for display.
pub fn preview(expression: &str) -> Option<f64> {
    evaluate(expression, PREVIEW_GLUCOSE).map(round_units)
}

/// Round a dose to one decimal place.
pub fn round_units(units: f64) -> f64 {
    (units * 10.0).round() / 10.0
}
