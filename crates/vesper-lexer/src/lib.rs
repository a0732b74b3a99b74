//! Vesper Lexer - Tokenization using logos
//!
//! Preprocessor directives (`#define`, `#if`, `#else`, `#endif`) are
//! ordinary tokens here; the parser filters them before parsing.

mod token;

pub use token::*;

use logos::Logos;
use vesper_ast::Span;

/// Tokenize a source string into a vector of tokens
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        let kind = match result {
            Ok(kind) => kind,
            Err(_) => TokenKind::Error,
        };
        tokens.push(Token { kind, span });
    }

    let end = source.len();
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end, end),
    });

    tokens
}

/// A token with its span
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_declaration_tokens() {
        let tokens = tokenize("public int[] ids = new int[3];");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Public,
                TokenKind::Ident,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::New,
                TokenKind::Ident,
                TokenKind::LBracket,
                TokenKind::Int,
                TokenKind::RBracket,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_directives_and_comments() {
        let source = "#define EDITOR\n// note\n#if EDITOR\n#endif";
        let tokens = tokenize(source);
        assert_eq!(tokens[0].kind, TokenKind::HashDefine);
        assert_eq!(tokens[1].text(source), "EDITOR");
        assert_eq!(tokens[2].kind, TokenKind::HashIf);
        assert_eq!(tokens[4].kind, TokenKind::HashEndif);
    }

    #[test]
    fn test_float_vs_member_access() {
        let tokens = tokenize("2.5 a.b");
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[2].kind, TokenKind::Dot);
    }

    #[test]
    fn test_unknown_character_is_error() {
        let tokens = tokenize("int $x;");
        assert_eq!(tokens[1].kind, TokenKind::Error);
    }
}
