//! Text syntax for program trees
//!
//! Programs are written as nested calls, e.g. `rep_t(fill(0, 3, 3), 2)`.
//! Integer tokens resolve to the literal primitive of the expected slot type;
//! `$k` denotes the k-th hole of a discovered primitive body.

use std::fmt;

use crate::ir::{Forest, Node, NodeId, Program, Type, Value};
use crate::library::Library;

/// Parse error with location information
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub column: usize,
    pub message: String,
    pub input: String,
}

impl ParseError {
    fn new(column: usize, message: impl Into<String>, input: &str) -> Self {
        Self {
            column,
            message: message.into(),
            input: input.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column {}: {}\n  | {}\n  | {}^",
            self.column,
            self.message,
            self.input,
            " ".repeat(self.column.saturating_sub(1))
        )
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Hole(usize),
    Open,
    Close,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '(' => {
                tokens.push((column, Token::Open));
                i += 1;
            }
            ')' => {
                tokens.push((column, Token::Close));
                i += 1;
            }
            ',' => {
                tokens.push((column, Token::Comma));
                i += 1;
            }
            '$' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let index = digits
                    .parse()
                    .map_err(|_| ParseError::new(column, "expected hole index after '$'", input))?;
                tokens.push((column, Token::Hole(index)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse()
                    .map_err(|_| ParseError::new(column, format!("invalid integer '{}'", text), input))?;
                tokens.push((column, Token::Int(n)));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((column, Token::Ident(chars[start..i].iter().collect())));
            }
            _ => {
                return Err(ParseError::new(
                    column,
                    format!("unexpected character '{}'", c),
                    input,
                ));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    library: &'a Library,
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    forest: Forest,
}

impl Parser<'_> {
    fn column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.input.len() + 1, |(c, _)| *c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.column(), message, self.input)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", token)))
        }
    }

    fn term(&mut self, expected: Option<&Type>) -> Result<NodeId, ParseError> {
        let column = self.column();
        match self.next() {
            Some(Token::Int(n)) => {
                let value = Value::Int(n);
                let def = match expected {
                    Some(ty) => self.library.literal(ty, &value),
                    None => self.library.find(&n.to_string()),
                };
                let def = def.ok_or_else(|| {
                    ParseError::new(column, format!("no literal {} in library", n), self.input)
                })?;
                Ok(self.forest.add(def.node(Vec::new())))
            }
            Some(Token::Hole(index)) => {
                let ty = expected.ok_or_else(|| {
                    ParseError::new(column, "hole has no slot type", self.input)
                })?;
                Ok(self.forest.add(Node::hole(index, ty.clone())))
            }
            Some(Token::Ident(name)) => {
                let def = self.library.find(&name).ok_or_else(|| {
                    ParseError::new(column, format!("unknown primitive '{}'", name), self.input)
                })?;
                let def = def.clone();
                let mut tails = Vec::with_capacity(def.arity());
                if self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    for (slot, ty) in def.args.iter().enumerate() {
                        if slot > 0 {
                            self.expect(Token::Comma)?;
                        }
                        tails.push(self.term(Some(ty))?);
                    }
                    self.expect(Token::Close)?;
                } else if def.arity() > 0 {
                    return Err(ParseError::new(
                        column,
                        format!("'{}' expects {} arguments", name, def.arity()),
                        self.input,
                    ));
                }
                if let Some(ty) = expected {
                    if *ty != def.ty {
                        return Err(ParseError::new(
                            column,
                            format!("'{}' returns '{}', slot expects '{}'", name, def.ty, ty),
                            self.input,
                        ));
                    }
                }
                Ok(self.forest.add(def.node(tails)))
            }
            Some(token) => Err(ParseError::new(
                column,
                format!("unexpected token {:?}", token),
                self.input,
            )),
            None => Err(ParseError::new(column, "unexpected end of input", self.input)),
        }
    }
}

/// Parse `text` into a program over `library`
pub fn parse_program(library: &Library, text: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        library,
        input: text,
        tokens,
        pos: 0,
        forest: Forest::new(),
    };
    let root = parser.term(None)?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(Program::new(parser.forest, root))
}
