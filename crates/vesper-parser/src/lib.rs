//! Vesper Parser
//!
//! Parses behaviour modules and synthesized initializer units. Source
//! text goes through the lexer, then the preprocessor filter, then the
//! recursive-descent parser.

mod error;
mod parser;
mod preprocess;

pub use error::ParseError;
pub use parser::Parser;
pub use preprocess::preprocess;

use vesper_ast::{Expr, SourceFile};
use vesper_lexer::tokenize;

/// Parse a complete source file
pub fn parse(source: &str) -> Result<SourceFile, ParseError> {
    let (tokens, defines) = preprocess(source, tokenize(source))?;
    let mut parser = Parser::new(source, tokens);
    parser.parse_file(defines)
}

/// Parse a standalone expression
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let (tokens, _) = preprocess(source, tokenize(source))?;
    let mut parser = Parser::new(source, tokens);
    parser.parse_expr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_ast::*;

    #[test]
    fn test_parse_behaviour_with_fields() {
        let source = r#"
using Math;

behaviour Door {
    [synced(linear)]
    private string owner;
    public int[] ids = new int[] { 1, 2, 3 };
    const float SPEED = 2.5;
    public int a = 1, b;
}
"#;
        let file = parse(source).unwrap();
        assert_eq!(file.usings[0].path, "Math");
        assert_eq!(file.item.kind, ItemKind::Behaviour);
        assert_eq!(file.item.name, "Door");

        let fields: Vec<_> = file.item.fields().collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].attribute("synced").unwrap().arg.as_deref(), Some("linear"));
        assert_eq!(fields[0].visibility, Some(Visibility::Private));
        assert_eq!(fields[1].ty.rank, 1);
        assert_eq!(
            fields[1].declarators[0].initializer.as_ref().unwrap().text,
            "new int[] { 1, 2, 3 }"
        );
        assert!(fields[2].is_const);
        assert_eq!(fields[3].declarators.len(), 2);
        assert!(fields[3].declarators[1].initializer.is_none());
    }

    #[test]
    fn test_parse_method_statements() {
        let source = r#"
behaviour Door {
    public Door other;
    fn open() {
        int n = 3 + 4 * 2;
        label = "open";
        other.open();
        ids[0] = n;
        return;
    }
}
"#;
        let file = parse(source).unwrap();
        let method = file.item.methods().next().unwrap();
        assert_eq!(method.name, "open");
        assert_eq!(method.body.stmts.len(), 5);
        assert!(matches!(method.body.stmts[0].kind, StmtKind::Local { .. }));
        assert!(matches!(method.body.stmts[1].kind, StmtKind::Assign { .. }));
        assert!(matches!(method.body.stmts[2].kind, StmtKind::Expr(_)));
        assert!(matches!(method.body.stmts[3].kind, StmtKind::Assign { .. }));
        assert!(matches!(method.body.stmts[4].kind, StmtKind::Return));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("1 + 2 * 3 == 7 && true").unwrap();
        match expr.kind {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOp::And);
                assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Eq, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_array_forms() {
        let expr = parse_expr("new int[2][]").unwrap();
        match expr.kind {
            ExprKind::NewArray { ty, size, items } => {
                assert_eq!(ty.rank, 2);
                assert!(size.is_some());
                assert!(items.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let expr = parse_expr("new int[][] { new int[] { 1 }, new int[0] }").unwrap();
        assert!(matches!(expr.kind, ExprKind::NewArray { items: Some(ref i), .. } if i.len() == 2));

        let expr = parse_expr("new Door()").unwrap();
        assert!(matches!(expr.kind, ExprKind::NewObject { .. }));
    }

    #[test]
    fn test_initializer_unit() {
        let source = r#"
using Math;
initializer Initializer0 {
    const int LIMIT = 2 * 5;
    fn init() {
        int total = max(LIMIT, 3);
        program.store("total", total);
    }
}
"#;
        let file = parse(source).unwrap();
        assert_eq!(file.item.kind, ItemKind::Initializer);
        assert_eq!(file.item.methods().count(), 1);
    }

    #[test]
    fn test_defines_recorded_and_spans_offset() {
        let source = "#define EDITOR\nbehaviour A {\n#if EDITOR\npublic int x;\n#endif\n}";
        let file = parse(source).unwrap();
        assert_eq!(file.defines, vec!["EDITOR".to_string()]);
        assert_eq!(file.item.fields().count(), 1);
    }

    #[test]
    fn test_error_span_points_at_token() {
        let source = "behaviour A {\n  public int = 3;\n}";
        let err = parse(source).unwrap_err();
        assert_eq!(err.span().text(source), "=");
        assert_eq!(err.code(), "E-PARSE-001");
    }

    #[test]
    fn test_invalid_character_reported() {
        let source = "behaviour A { public int $x; }";
        let err = parse(source).unwrap_err();
        assert!(matches!(err, ParseError::InvalidToken { .. }));
    }
}
