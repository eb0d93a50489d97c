//! Hand-rolled lexer for the textual IR dialect.
//!
//! One token lookahead, line-counting, no regex: the same shape as
//! Cranelift's own `.clif` lexer, scaled down to this format's much smaller
//! token set.

use crate::error::{err, Location};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Identifier(&'a str),
    Value(&'a str),
    Global(&'a str),
    Integer(i64),
    /// A double-quoted string literal, already unescaped (`\n`, `\"`, `\\`).
    Str(String),
    LPar,
    RPar,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Equal,
    Star,
    Eof,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pub line_number: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            chars: source.char_indices().peekable(),
            line_number: 1,
        }
    }

    pub fn loc(&self) -> Location {
        Location {
            line_number: self.line_number,
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                self.line_number += 1;
                self.chars.next();
            } else if c.is_whitespace() {
                self.chars.next();
            } else if c == ';' {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.chars.next();
                }
            } else {
                break;
            }
        }
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, start: usize, pred: F) -> &'a str {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if pred(c) {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        &self.source[start..end]
    }

    pub fn next(&mut self) -> crate::error::ParseResult<(Token<'a>, Location)> {
        self.skip_trivia();
        let loc = self.loc();
        let (start, c) = match self.chars.peek().copied() {
            None => return Ok((Token::Eof, loc)),
            Some(pair) => pair,
        };
        let tok = match c {
            '(' => {
                self.chars.next();
                Token::LPar
            }
            ')' => {
                self.chars.next();
                Token::RPar
            }
            '{' => {
                self.chars.next();
                Token::LBrace
            }
            '}' => {
                self.chars.next();
                Token::RBrace
            }
            ',' => {
                self.chars.next();
                Token::Comma
            }
            ':' => {
                self.chars.next();
                Token::Colon
            }
            '=' => {
                self.chars.next();
                Token::Equal
            }
            '*' => {
                self.chars.next();
                Token::Star
            }
            '%' => {
                self.chars.next();
                let (nstart, _) = match self.chars.peek().copied() {
                    Some(p) => p,
                    None => return err!(loc, "expected a name after '%'"),
                };
                let name = self.take_while(nstart, |c| c.is_alphanumeric() || c == '_' || c == '.');
                Token::Value(name)
            }
            '@' => {
                self.chars.next();
                let (nstart, _) = match self.chars.peek().copied() {
                    Some(p) => p,
                    None => return err!(loc, "expected a name after '@'"),
                };
                let name = self.take_while(nstart, |c| c.is_alphanumeric() || c == '_' || c == '.');
                Token::Global(name)
            }
            '"' => {
                self.chars.next();
                let mut s = String::new();
                loop {
                    match self.chars.next() {
                        None => return err!(loc, "unterminated string literal"),
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match self.chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, '"')) => s.push('"'),
                            Some((_, '\\')) => s.push('\\'),
                            Some((_, other)) => s.push(other),
                            None => return err!(loc, "unterminated string literal"),
                        },
                        Some((_, '\n')) => {
                            self.line_number += 1;
                            s.push('\n');
                        }
                        Some((_, c)) => s.push(c),
                    }
                }
                Token::Str(s)
            }
            '-' | '0'..='9' => {
                self.chars.next();
                let rest = self.take_while(start + c.len_utf8(), |c| c.is_ascii_digit());
                let text = &self.source[start..start + c.len_utf8() + rest.len()];
                let n: i64 = text
                    .parse()
                    .map_err(|_| crate::error::ParseError {
                        location: loc,
                        message: format!("malformed integer literal '{text}'"),
                    })?;
                Token::Integer(n)
            }
            c if c.is_alphabetic() || c == '_' => {
                let name = self.take_while(start, |c| c.is_alphanumeric() || c == '_' || c == '.');
                Token::Identifier(name)
            }
            other => return err!(loc, "unexpected character '{}'", other),
        };
        Ok((tok, loc))
    }
}
