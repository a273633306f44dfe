//! Parser for Python-style lambda text such as
//! `lambda j: j.pt() / 1000 > 20 and abs(j.eta()) < 4.5`.
//!
//! Covers the expression subset query lambdas use: boolean and comparison
//! operators (no chaining), arithmetic, unary minus and `not`, conditional
//! expressions, calls with positional arguments, attribute access,
//! subscripts, literals, lists, tuples and dicts.

use super::ast::{BinOp, BoolOp, CmpOp, Constant, Expr, UnaryOp};
use super::error::CompilationError;

type Result<T> = std::result::Result<T, CompilationError>;

const KEYWORDS: &[&str] = &[
    "lambda", "and", "or", "not", "if", "else", "in", "is", "True", "False", "None",
];

const TWO_CHAR_OPS: &[&str] = &["**", "//", "==", "!=", "<=", ">="];
const ONE_CHAR_OPS: &[&str] = &[
    "(", ")", "[", "]", "{", "}", ",", ":", ".", "+", "-", "*", "/", "%", "<", ">",
];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

fn syntax(offset: usize, message: impl Into<String>) -> CompilationError {
    CompilationError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|(_, c)| *c);
    let offset_of = |i: usize| chars.get(i).map(|(o, _)| *o).unwrap_or(src.len());

    let mut tokens = Vec::new();
    let mut i = 0;
    while let Some(c) = at(i) {
        let start = offset_of(i);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut name = String::new();
            while let Some(c) = at(i).filter(|c| c.is_alphanumeric() || *c == '_') {
                name.push(c);
                i += 1;
            }
            tokens.push(Token {
                tok: Tok::Name(name),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && at(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let mut text = String::new();
            let mut is_float = false;
            while let Some(d) = at(i).filter(|d| d.is_ascii_digit()) {
                text.push(d);
                i += 1;
            }
            if at(i) == Some('.') && !at(i + 1).is_some_and(|n| n.is_alphabetic() || n == '_') {
                is_float = true;
                text.push('.');
                i += 1;
                while let Some(d) = at(i).filter(|d| d.is_ascii_digit()) {
                    text.push(d);
                    i += 1;
                }
            }
            if matches!(at(i), Some('e') | Some('E')) {
                let sign = at(i + 1).filter(|s| *s == '+' || *s == '-');
                let digit_at = if sign.is_some() { i + 2 } else { i + 1 };
                if at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                    is_float = true;
                    text.push('e');
                    if let Some(s) = sign {
                        text.push(s);
                    }
                    i = digit_at;
                    while let Some(d) = at(i).filter(|d| d.is_ascii_digit()) {
                        text.push(d);
                        i += 1;
                    }
                }
            }
            let tok = if is_float {
                text.parse::<f64>()
                    .map(Tok::Float)
                    .map_err(|_| syntax(start, format!("invalid number '{}'", text)))?
            } else {
                text.parse::<i64>()
                    .map(Tok::Int)
                    .map_err(|_| syntax(start, format!("integer out of range '{}'", text)))?
            };
            tokens.push(Token { tok, offset: start });
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                match at(i) {
                    None => return Err(syntax(start, "unterminated string")),
                    Some(ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped =
                            at(i + 1).ok_or_else(|| syntax(start, "unterminated string"))?;
                        match escaped {
                            'n' => value.push('\n'),
                            't' => value.push('\t'),
                            'r' => value.push('\r'),
                            '0' => value.push('\0'),
                            '\\' | '\'' | '"' => value.push(escaped),
                            other => {
                                value.push('\\');
                                value.push(other);
                            }
                        }
                        i += 2;
                    }
                    Some(ch) => {
                        value.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token {
                tok: Tok::Str(value),
                offset: start,
            });
            continue;
        }

        let two: String = [at(i), at(i + 1)].iter().flatten().collect();
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| **op == two) {
            tokens.push(Token {
                tok: Tok::Op(op),
                offset: start,
            });
            i += 2;
            continue;
        }
        let one = c.to_string();
        if let Some(op) = ONE_CHAR_OPS.iter().find(|op| **op == one) {
            tokens.push(Token {
                tok: Tok::Op(op),
                offset: start,
            });
            i += 1;
            continue;
        }

        return Err(syntax(start, format!("unexpected character '{}'", c)));
    }

    tokens.push(Token {
        tok: Tok::Eof,
        offset: src.len(),
    });
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", op)))
        }
    }

    fn unexpected(&self, expected: &str) -> CompilationError {
        let found = match self.peek() {
            Tok::Name(n) => format!("'{}'", n),
            Tok::Int(i) => i.to_string(),
            Tok::Float(f) => f.to_string(),
            Tok::Str(s) => format!("string '{}'", s),
            Tok::Op(o) => format!("'{}'", o),
            Tok::Eof => "end of input".to_string(),
        };
        syntax(self.offset(), format!("expected {}, found {}", expected, found))
    }

    fn expression(&mut self) -> Result<Expr> {
        if self.eat_keyword("lambda") {
            return self.lambda_rest();
        }
        self.ternary()
    }

    fn lambda_rest(&mut self) -> Result<Expr> {
        let mut args = Vec::new();
        if !self.is_op(":") {
            loop {
                match self.peek().clone() {
                    Tok::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                        self.advance();
                        args.push(n);
                    }
                    _ => return Err(self.unexpected("a lambda parameter name")),
                }
                if !self.eat_op(",") {
                    break;
                }
            }
        }
        self.expect_op(":")?;
        let body = self.expression()?;
        Ok(Expr::Lambda {
            args,
            body: Box::new(body),
        })
    }

    fn ternary(&mut self) -> Result<Expr> {
        let body = self.or_expr()?;
        if !self.eat_keyword("if") {
            return Ok(body);
        }
        let test = self.or_expr()?;
        if !self.eat_keyword("else") {
            return Err(self.unexpected("'else'"));
        }
        let orelse = self.expression()?;
        Ok(Expr::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let operand = self.not_expr()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn compare_op(&self) -> Option<CmpOp> {
        match self.peek() {
            Tok::Op("==") => Some(CmpOp::Eq),
            Tok::Op("!=") => Some(CmpOp::NotEq),
            Tok::Op("<") => Some(CmpOp::Lt),
            Tok::Op("<=") => Some(CmpOp::LtE),
            Tok::Op(">") => Some(CmpOp::Gt),
            Tok::Op(">=") => Some(CmpOp::GtE),
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr> {
        let left = self.arith()?;
        let Some(op) = self.compare_op() else {
            if self.is_keyword("in") || self.is_keyword("is") {
                return Err(syntax(self.offset(), "'in' and 'is' are not supported"));
            }
            return Ok(left);
        };
        self.advance();
        let right = self.arith()?;
        if self.compare_op().is_some() {
            return Err(syntax(
                self.offset(),
                "chained comparisons are not supported",
            ));
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn arith(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = binop(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("//") => BinOp::FloorDiv,
                Tok::Op("%") => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = binop(op, left, right);
        }
    }

    fn factor(&mut self) -> Result<Expr> {
        if self.eat_op("-") {
            let operand = self.factor()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat_op("+") {
            return self.factor();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(binop(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let args = self.sequence(")")?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat_op(".") {
                match self.advance() {
                    Tok::Name(attr) => expr = Expr::attr(expr, attr),
                    _ => return Err(syntax(self.offset(), "expected an attribute name")),
                }
            } else if self.eat_op("[") {
                let index = self.expression()?;
                self.expect_op("]")?;
                expr = Expr::subscript(expr, index);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat_op(close) {
            items.push(self.expression()?);
            if !self.eat_op(",") {
                self.expect_op(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn atom(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.advance() {
            Tok::Int(i) => Ok(Expr::Constant(Constant::Int(i))),
            Tok::Float(f) => Ok(Expr::Constant(Constant::Float(f))),
            Tok::Str(s) => {
                let mut s = s;
                // Adjacent string literals concatenate.
                while let Tok::Str(next) = self.peek().clone() {
                    self.advance();
                    s.push_str(&next);
                }
                Ok(Expr::Constant(Constant::Str(s)))
            }
            Tok::Name(n) => match n.as_str() {
                "True" => Ok(Expr::Constant(Constant::Bool(true))),
                "False" => Ok(Expr::Constant(Constant::Bool(false))),
                "None" => Ok(Expr::Constant(Constant::None)),
                kw if KEYWORDS.contains(&kw) => {
                    Err(syntax(offset, format!("unexpected keyword '{}'", kw)))
                }
                _ => Ok(Expr::Name(n)),
            },
            Tok::Op("(") => {
                if self.eat_op(")") {
                    return Ok(Expr::Tuple(vec![]));
                }
                let first = self.expression()?;
                if self.eat_op(")") {
                    return Ok(first);
                }
                self.expect_op(",")?;
                let mut items = vec![first];
                items.extend(self.sequence(")")?);
                Ok(Expr::Tuple(items))
            }
            Tok::Op("[") => Ok(Expr::List(self.sequence("]")?)),
            Tok::Op("{") => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                while !self.eat_op("}") {
                    keys.push(self.expression()?);
                    self.expect_op(":")?;
                    values.push(self.expression()?);
                    if !self.eat_op(",") {
                        self.expect_op("}")?;
                        break;
                    }
                }
                Ok(Expr::Dict { keys, values })
            }
            Tok::Eof => Err(syntax(offset, "unexpected end of input")),
            Tok::Op(op) => Err(syntax(offset, format!("unexpected '{}'", op))),
        }
    }
}

fn binop(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Parses any expression.
pub fn parse_expression(src: &str) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
    };
    let expr = parser.expression()?;
    if *parser.peek() != Tok::Eof {
        return Err(parser.unexpected("end of input"));
    }
    Ok(expr)
}

/// Parses text that must be a single lambda.
pub fn parse_lambda(src: &str) -> Result<Expr> {
    match parse_expression(src)? {
        expr @ Expr::Lambda { .. } => Ok(expr),
        _ => Err(syntax(0, "expected a lambda expression")),
    }
}
