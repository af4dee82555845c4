use logos::Logos;
use std::fmt;

use crate::Span;

/// Lexical roles of a token. Atom text is left unclassified; the parser decides
/// whether it is a number or a symbol.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \n\r]+")] // Only spaces and line breaks separate tokens
#[logos(skip r";[^\n\r]*")] // Skip comments
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[^ ();\n\r]+", |lex| lex.slice().to_string())]
    Atom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// The token as it appeared in the source.
    pub fn text(&self) -> &str {
        match &self.kind {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Atom(text) => text,
        }
    }
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Atom(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// Splits source text into tokens. Never fails: malformed programs are
/// rejected by the parser.
pub fn tokenize(input: &str) -> Vec<Token> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| {
            // Every character is claimed by some rule, so an error here can only
            // be a stray slice; keep it as atom text rather than dropping it.
            let kind = result.unwrap_or_else(|()| TokenKind::Atom(input[range.clone()].to_string()));
            Token {
                kind,
                span: Span::from(range),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_texts(input: &str, expected: &[&str]) {
        let tokens = tokenize(input);
        let texts: Vec<&str> = tokens.iter().map(Token::text).collect();
        assert_eq!(texts, expected, "Input: '{}'", input);
    }

    fn atom(s: &str) -> TokenKind {
        TokenKind::Atom(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_texts("", &[]);
        assert_texts("    ", &[]);
    }

    #[test]
    fn test_simple_call() {
        assert_texts("(+ 1 2)", &["(", "+", "1", "2", ")"]);
        let kinds: Vec<TokenKind> = tokenize("(+ 1 2)").into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LParen,
                atom("+"),
                atom("1"),
                atom("2"),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_parens_flush_pending_text() {
        assert_texts("(foo(bar)baz)", &["(", "foo", "(", "bar", ")", "baz", ")"]);
        assert_texts("((", &["(", "("]);
        assert_texts(")x", &[")", "x"]);
    }

    #[test]
    fn test_comments() {
        let input = "
            (define x 10) ; Define x
            ; Another comment line
              (+ x 5)  ; Add 5 to x
              ; Final comment";
        assert_texts(
            input,
            &["(", "define", "x", "10", ")", "(", "+", "x", "5", ")"],
        );
        assert_texts("; only comment", &[]);
        assert_texts("token ; then comment", &["token"]);
    }

    #[test]
    fn test_comment_flushes_adjacent_text() {
        assert_texts("abc;def\nghi", &["abc", "ghi"]);
        assert_texts("(a;)\n)", &["(", "a", ")"]);
    }

    #[test]
    fn test_multiline_input() {
        assert_texts(
            "(define (square x)\n  (* x x))",
            &["(", "define", "(", "square", "x", ")", "(", "*", "x", "x", ")", ")"],
        );
        assert_texts("a\r\nb", &["a", "b"]);
    }

    #[test]
    fn test_tab_is_part_of_atom_text() {
        // Only spaces separate tokens on a line.
        assert_texts("a\tb", &["a\tb"]);
    }

    #[test]
    fn test_atoms_are_unclassified() {
        assert_texts("-4.5 1e3 sym.bol #t \"str\"", &["-4.5", "1e3", "sym.bol", "#t", "\"str\""]);
        assert_texts("🍕+☕", &["🍕+☕"]);
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("(+ 1)");

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].span, Span { start: 0, end: 1 });
        assert_eq!(tokens[1].span, Span { start: 1, end: 2 });
        assert_eq!(tokens[2].span, Span { start: 3, end: 4 });
        assert_eq!(tokens[3].span, Span { start: 4, end: 5 });
    }

    #[test]
    fn test_display() {
        let tokens = tokenize("(abc)");
        let shown: Vec<String> = tokens.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["(", "abc", ")"]);
    }
}
