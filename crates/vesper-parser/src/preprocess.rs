//! Conditional compilation over the token stream

use std::collections::HashSet;

use vesper_lexer::{Token, TokenKind};

use crate::ParseError;

struct Frame {
    /// Whether the enclosing region emits tokens
    parent_active: bool,
    /// Whether the `#if` condition held
    taken: bool,
    in_else: bool,
}

/// Drop tokens excluded by `#if`/`#else`/`#endif` and collect `#define`s
///
/// Returns the surviving tokens (ending in EOF) and the defined symbols in
/// definition order.
pub fn preprocess(source: &str, tokens: Vec<Token>) -> Result<(Vec<Token>, Vec<String>), ParseError> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut defined: Vec<String> = Vec::new();
    let mut lookup: HashSet<String> = HashSet::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    let active = |frames: &[Frame]| {
        frames
            .last()
            .map(|f| f.parent_active && (f.taken != f.in_else))
            .unwrap_or(true)
    };

    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::HashDefine => {
                let name = match iter.next() {
                    Some(t) if t.kind == TokenKind::Ident => t.text(source).to_string(),
                    Some(t) => return Err(ParseError::unexpected("symbol name", t.kind, t.span)),
                    None => return Err(ParseError::unexpected("symbol name", TokenKind::Eof, token.span)),
                };
                if active(&frames) && lookup.insert(name.clone()) {
                    defined.push(name);
                }
            }
            TokenKind::HashIf => {
                let negated = matches!(iter.peek(), Some(t) if t.kind == TokenKind::Bang);
                if negated {
                    iter.next();
                }
                let name = match iter.next() {
                    Some(t) if t.kind == TokenKind::Ident => t.text(source).to_string(),
                    Some(t) => return Err(ParseError::unexpected("condition symbol", t.kind, t.span)),
                    None => return Err(ParseError::unexpected("condition symbol", TokenKind::Eof, token.span)),
                };
                let parent_active = active(&frames);
                frames.push(Frame {
                    parent_active,
                    taken: lookup.contains(&name) != negated,
                    in_else: false,
                });
            }
            TokenKind::HashElse => match frames.last_mut() {
                Some(frame) if !frame.in_else => frame.in_else = true,
                Some(_) => {
                    return Err(ParseError::Directive {
                        message: "duplicate #else".to_string(),
                        span: token.span,
                    })
                }
                None => {
                    return Err(ParseError::Directive {
                        message: "#else without #if".to_string(),
                        span: token.span,
                    })
                }
            },
            TokenKind::HashEndif => {
                if frames.pop().is_none() {
                    return Err(ParseError::Directive {
                        message: "#endif without #if".to_string(),
                        span: token.span,
                    });
                }
            }
            TokenKind::Eof => {
                if !frames.is_empty() {
                    return Err(ParseError::Directive {
                        message: "unterminated #if".to_string(),
                        span: token.span,
                    });
                }
                out.push(token);
            }
            _ => {
                if active(&frames) {
                    out.push(token);
                }
            }
        }
    }

    Ok((out, defined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_lexer::tokenize;

    fn idents(source: &str) -> Vec<String> {
        let (tokens, _) = preprocess(source, tokenize(source)).unwrap();
        tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text(source).to_string())
            .collect()
    }

    #[test]
    fn test_if_else_selects_branch() {
        let source = "#define EDITOR\n#if EDITOR a #else b #endif #if !EDITOR c #else d #endif";
        assert_eq!(idents(source), vec!["a", "d"]);
    }

    #[test]
    fn test_define_inside_inactive_region_is_ignored() {
        let source = "#if NOPE #define X #endif #if X a #endif b";
        assert_eq!(idents(source), vec!["b"]);
    }

    #[test]
    fn test_unbalanced_directives() {
        let source = "#if X a";
        assert!(preprocess(source, tokenize(source)).is_err());
        let source = "#endif";
        assert!(preprocess(source, tokenize(source)).is_err());
    }
}
