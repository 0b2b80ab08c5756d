//! Lexer for memscope scripts.
//!
//! Converts source text into a token stream. Whitespace and `//` line
//! comments are skipped; every surviving token carries its byte span so
//! later stages can report positions and record statement lines.

use crate::span::Span;
use logos::Logos;
use smol_str::SmolStr;

/// A token with its span in the source.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Token kinds produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // === Keywords ===
    #[token("fn")]
    Fn,
    #[token("async")]
    Async,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("use")]
    Use,
    #[token("import")]
    Import,
    #[token("as")]
    As,

    // === Literals ===
    /// Integer literal; underscores allowed as separators.
    #[regex(r"[0-9][0-9_]*", |lex| parse_int(lex.slice()))]
    Int(i64),

    /// Float literal.
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| parse_float(lex.slice()))]
    Float(f64),

    /// String literal with backslash escapes.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| parse_string(lex.slice()))]
    Str(SmolStr),

    // === Identifiers ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    // === Operators ===
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
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    // === Punctuation ===
    #[token("=")]
    Eq,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semi,
    /// Annotation prefix, as in `@memo`.
    #[token("@")]
    At,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // === Special ===
    /// End of input.
    Eof,
    /// Unrecognized input.
    Error,
}

fn parse_int(s: &str) -> i64 {
    s.replace('_', "").parse().unwrap_or(0)
}

fn parse_float(s: &str) -> f64 {
    s.replace('_', "").parse().unwrap_or(0.0)
}

/// Strip quotes and process `\n`, `\r`, `\t`, `\\`, `\"`, `\0` escapes.
fn parse_string(s: &str) -> SmolStr {
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    SmolStr::new(&out)
}

/// Tokenize a source string. The trailing `Eof` token is included.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let span = Span::new(span.start as u32, span.end as u32);
        let kind = match result {
            Ok(kind) => kind,
            Err(()) => TokenKind::Error,
        };
        tokens.push(Token::new(kind, span));
    }
    tokens.push(Token::new(TokenKind::Eof, Span::empty(source.len() as u32)));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_idents() {
        let toks = kinds("fn async let use import as probe");
        assert!(matches!(toks[0], TokenKind::Fn));
        assert!(matches!(toks[1], TokenKind::Async));
        assert!(matches!(toks[2], TokenKind::Let));
        assert!(matches!(toks[3], TokenKind::Use));
        assert!(matches!(toks[4], TokenKind::Import));
        assert!(matches!(toks[5], TokenKind::As));
        assert!(matches!(toks[6], TokenKind::Ident(ref s) if s.as_str() == "probe"));
    }

    #[test]
    fn numeric_literals() {
        let toks = kinds("42 1_000 3.25");
        assert!(matches!(toks[0], TokenKind::Int(42)));
        assert!(matches!(toks[1], TokenKind::Int(1000)));
        assert!(matches!(toks[2], TokenKind::Float(f) if (f - 3.25).abs() < f64::EPSILON));
    }

    #[test]
    fn string_escapes() {
        let toks = kinds(r#""a\nb""#);
        assert!(matches!(toks[0], TokenKind::Str(ref s) if s.as_str() == "a\nb"));
    }

    #[test]
    fn annotation_prefix() {
        let toks = kinds("@memo\nfn f() {}");
        assert!(matches!(toks[0], TokenKind::At));
        assert!(matches!(toks[1], TokenKind::Ident(ref s) if s.as_str() == "memo"));
        assert!(matches!(toks[2], TokenKind::Fn));
    }

    #[test]
    fn comments_skipped() {
        let toks = kinds("let x = 1; // trailing note\nx");
        assert!(matches!(toks[0], TokenKind::Let));
        assert!(toks.iter().all(|k| !matches!(k, TokenKind::Error)));
    }

    #[test]
    fn operators() {
        let toks = kinds("== != <= >= < > = + - * / %");
        assert!(matches!(toks[0], TokenKind::EqEq));
        assert!(matches!(toks[1], TokenKind::BangEq));
        assert!(matches!(toks[2], TokenKind::Le));
        assert!(matches!(toks[3], TokenKind::Ge));
        assert!(matches!(toks[4], TokenKind::Lt));
        assert!(matches!(toks[5], TokenKind::Gt));
        assert!(matches!(toks[6], TokenKind::Eq));
    }

    #[test]
    fn eof_is_last() {
        let toks = tokenize("x");
        assert!(matches!(toks.last().map(|t| &t.kind), Some(TokenKind::Eof)));
    }

    #[test]
    fn unknown_char_is_error_token() {
        let toks = kinds("let $ = 1;");
        assert!(toks.iter().any(|k| matches!(k, TokenKind::Error)));
    }
}
