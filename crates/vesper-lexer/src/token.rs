//! Token definitions for Vesper

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // === Keywords ===
    #[token("using")]
    Using,
    #[token("behaviour")]
    Behaviour,
    #[token("initializer")]
    Initializer,
    #[token("public")]
    Public,
    #[token("private")]
    Private,
    #[token("const")]
    Const,
    #[token("fn")]
    Fn,
    #[token("return")]
    Return,
    #[token("new")]
    New,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // === Preprocessor ===
    #[token("#define")]
    HashDefine,
    #[token("#if")]
    HashIf,
    #[token("#else")]
    HashElse,
    #[token("#endif")]
    HashEndif,

    // === Operators ===
    #[token("==")]
    EqEq,
    #[token("=")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token("<")]
    Lt,
    #[token(">=")]
    GtEq,
    #[token(">")]
    Gt,
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
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    // === Literals ===
    #[regex(r"[0-9]+", priority = 2)]
    Int,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    // === Identifiers ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // === Special ===
    Error,
    Eof,
}

impl TokenKind {
    pub fn is_directive(&self) -> bool {
        matches!(
            self,
            TokenKind::HashDefine | TokenKind::HashIf | TokenKind::HashElse | TokenKind::HashEndif
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Using => "'using'",
            TokenKind::Behaviour => "'behaviour'",
            TokenKind::Initializer => "'initializer'",
            TokenKind::Public => "'public'",
            TokenKind::Private => "'private'",
            TokenKind::Const => "'const'",
            TokenKind::Fn => "'fn'",
            TokenKind::Return => "'return'",
            TokenKind::New => "'new'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::HashDefine => "'#define'",
            TokenKind::HashIf => "'#if'",
            TokenKind::HashElse => "'#else'",
            TokenKind::HashEndif => "'#endif'",
            TokenKind::EqEq => "'=='",
            TokenKind::Eq => "'='",
            TokenKind::NotEq => "'!='",
            TokenKind::LtEq => "'<='",
            TokenKind::Lt => "'<'",
            TokenKind::GtEq => "'>='",
            TokenKind::Gt => "'>'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Ident => "identifier",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}
