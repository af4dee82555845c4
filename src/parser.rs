use crate::Span;
use crate::lexer::{Token, TokenKind};
use crate::stack::ensure_sufficient_stack;
use crate::types::{Expr, Node};
use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

/// How many lists may be open at once before parsing gives up.
pub const MAX_NESTING_DEPTH: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse Error [at {}]: Unexpected token '{}', expected {}", .found.span, .found, .expected)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Parse Error: Unexpected end of input during parsing. Expected {0}")]
    UnexpectedEof(String),
    #[error("Parse Error [at {span}]: Lists nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize, span: Span },
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
            depth: 0,
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses a single expression from the token stream.
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        match self.next_token() {
            Some(token) => self.parse_expr_with_token(token),
            None => Err(ParseError::UnexpectedEof("an expression".to_string())),
        }
    }

    fn parse_expr_with_token(&mut self, token: Token) -> ParseResult<Node> {
        ensure_sufficient_stack(|| match token.kind {
            TokenKind::LParen => self.parse_list(token.span),
            TokenKind::RParen => Err(ParseError::UnexpectedToken {
                found: token,
                expected: "an atom or '('".to_string(),
            }),
            TokenKind::Atom(text) => Ok(parse_atom(text, token.span)),
        })
    }

    fn parse_list(&mut self, open_span: Span) -> ParseResult<Node> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                span: open_span,
            });
        }
        self.depth += 1;
        let list = self.parse_list_elements(open_span);
        self.depth -= 1;
        list
    }

    /// Parses the elements of a list whose '(' has already been consumed.
    fn parse_list_elements(&mut self, open_span: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span: rparen_span,
                }) => return Ok(Node::new_list(elements, open_span.merge(rparen_span))),
                Some(token) => elements.push(self.parse_expr_with_token(token)?),
                // Reached EOF before finding ')'
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
            }
        }
    }

    /// Parses the whole token stream as exactly one top-level expression.
    pub fn parse(mut self) -> ParseResult<Node> {
        let expr = self.parse_expr()?;

        // Check if there are any tokens left - shouldn't be for a single expression parse
        if let Some(found) = self.next_token() {
            Err(ParseError::UnexpectedToken {
                found,
                expected: "end of input".to_string(),
            })
        } else {
            Ok(expr)
        }
    }
}

/// Classifies atom text: integer first, then real, otherwise a symbol name.
fn parse_atom(text: String, span: Span) -> Node {
    let kind = if let Ok(n) = text.parse::<i64>() {
        Expr::Integer(n)
    } else if let Ok(n) = text.parse::<f64>() {
        Expr::Real(n)
    } else {
        Expr::Symbol(text)
    };
    Node::new(kind, span)
}

pub fn parse(tokens: Vec<Token>) -> ParseResult<Node> {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Node> {
    parse(crate::lexer::tokenize(input))
}
