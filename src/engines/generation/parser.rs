use crate::engines::generation::ast::ExpressionNode;
use crate::error::{Result, TapholdError};
use crate::functions::{FunctionRegistry, Operator};
use crate::types::{Mode, TrainCol};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

/// Parses literal formulas such as
/// `abs(sd(pth_prev_prev_overlap_dur - pth_prev_press_to_pth_press_dur, 4.28 - pth_prev_press_to_pth_press_dur))`
/// into expression trees whose variables are restricted to the columns of one mode.
pub struct FormulaParser {
    mode: Mode,
    registry: FunctionRegistry,
}

struct Cursor {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl FormulaParser {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            registry: FunctionRegistry::new(),
        }
    }

    pub fn parse(&self, text: &str) -> Result<ExpressionNode> {
        let tokens = tokenize(text)?;
        let mut cursor = Cursor {
            tokens,
            pos: 0,
            end: text.len(),
        };
        let expr = self.parse_expr(&mut cursor)?;
        if let Some((at, token)) = cursor.peek_with_pos() {
            return Err(TapholdError::Parse {
                position: at,
                message: format!("unexpected {:?} after complete expression", token),
            });
        }
        expr.validate(self.mode)?;
        Ok(expr)
    }

    fn parse_expr(&self, cursor: &mut Cursor) -> Result<ExpressionNode> {
        let mut left = self.parse_term(cursor)?;
        loop {
            let op = match cursor.peek() {
                Some(Token::Plus) => Operator::Add,
                Some(Token::Minus) => Operator::Sub,
                _ => return Ok(left),
            };
            cursor.advance();
            let right = self.parse_term(cursor)?;
            left = ExpressionNode::binary(op, left, right);
        }
    }

    fn parse_term(&self, cursor: &mut Cursor) -> Result<ExpressionNode> {
        let mut left = self.parse_unary(cursor)?;
        loop {
            let op = match cursor.peek() {
                Some(Token::Star) => Operator::Mul,
                Some(Token::Slash) => Operator::Sd,
                _ => return Ok(left),
            };
            cursor.advance();
            let right = self.parse_unary(cursor)?;
            left = ExpressionNode::binary(op, left, right);
        }
    }

    fn parse_unary(&self, cursor: &mut Cursor) -> Result<ExpressionNode> {
        if cursor.peek() == Some(&Token::Minus) {
            cursor.advance();
            if let Some(Token::Number(v)) = cursor.peek() {
                let v = *v;
                cursor.advance();
                return Ok(ExpressionNode::Const(-v));
            }
            let operand = self.parse_unary(cursor)?;
            return Ok(ExpressionNode::binary(
                Operator::Sub,
                ExpressionNode::Const(0.0),
                operand,
            ));
        }
        self.parse_primary(cursor)
    }

    fn parse_primary(&self, cursor: &mut Cursor) -> Result<ExpressionNode> {
        let (at, token) = cursor.next().ok_or_else(|| TapholdError::Parse {
            position: cursor.end,
            message: "unexpected end of formula".to_string(),
        })?;

        match token {
            Token::Number(v) => Ok(ExpressionNode::Const(v)),
            Token::LParen => {
                let inner = self.parse_expr(cursor)?;
                cursor.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if cursor.peek() == Some(&Token::LParen) => {
                let op = self.registry.get_operator(&name).ok_or_else(|| TapholdError::Parse {
                    position: at,
                    message: format!("unknown function '{}'", name),
                })?;
                cursor.advance();
                let mut args = vec![self.parse_expr(cursor)?];
                while cursor.peek() == Some(&Token::Comma) {
                    cursor.advance();
                    args.push(self.parse_expr(cursor)?);
                }
                cursor.expect(Token::RParen)?;
                ExpressionNode::op(op, args)
            }
            Token::Ident(name) => match TrainCol::from_name(&name) {
                Some(col) if col.may_use_in(self.mode) => Ok(ExpressionNode::var(col)),
                _ => Err(TapholdError::UnknownVariable(name)),
            },
            other => Err(TapholdError::Parse {
                position: at,
                message: format!("unexpected {:?}", other),
            }),
        }
    }
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_with_pos(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(at, t)| (*at, t))
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        item
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some((_, token)) if token == expected => Ok(()),
            Some((at, token)) => Err(TapholdError::Parse {
                position: at,
                message: format!("expected {:?}, found {:?}", expected, token),
            }),
            None => Err(TapholdError::Parse {
                position: self.end,
                message: format!("expected {:?}, found end of formula", expected),
            }),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '+' => tokens.push((start, Token::Plus)),
            '-' => tokens.push((start, Token::Minus)),
            '*' => tokens.push((start, Token::Star)),
            '/' => tokens.push((start, Token::Slash)),
            '(' => tokens.push((start, Token::LParen)),
            ')' => tokens.push((start, Token::RParen)),
            ',' => tokens.push((start, Token::Comma)),
            '0'..='9' | '.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                        i += 1;
                    }
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let literal = &text[start..i];
                let value: f64 = literal.parse().map_err(|_| TapholdError::Parse {
                    position: start,
                    message: format!("invalid number '{}'", literal),
                })?;
                tokens.push((start, Token::Number(value)));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(text[start..i].to_ascii_lowercase())));
                continue;
            }
            other => {
                return Err(TapholdError::Parse {
                    position: start,
                    message: format!("unexpected character '{}'", other),
                })
            }
        }
        i += 1;
    }

    Ok(tokens)
}
