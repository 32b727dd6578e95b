//! Declaration parsing tests

use parser::{Parser, StmtKind, TypeExprKind};

fn parse(source: &str) -> Vec<parser::Stmt> {
    Parser::new(source).parse_program().unwrap()
}

#[test]
fn test_generic_function_declaration() {
    let program = parse("function first(a [any]) any begin return a[0]; end first;");
    match &program[0].kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.name, "first");
            assert!(!decl.is_generator);
            assert_eq!(decl.params.len(), 1);
            assert!(matches!(decl.params[0].ty.kind, TypeExprKind::Array(_)));
            assert_eq!(decl.return_type.kind, TypeExprKind::Named("any".to_string()));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_generator_declaration() {
    let program = parse(
        "generator count(n integer) integer begin for i in 1..n loop yield i; end loop; end count;",
    );
    assert!(matches!(&program[0].kind, StmtKind::Function(d) if d.is_generator));
}

#[test]
fn test_procedure_with_exception_clause() {
    let program = parse(
        "procedure p() begin raise 3; exception when 3 then print('three'); else raise 4; end p;",
    );
    match &program[0].kind {
        StmtKind::Procedure(decl) => {
            let clause = decl.body.exception.as_ref().unwrap();
            assert_eq!(clause.whens.len(), 1);
            assert!(clause.otherwise.is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_record_type_declaration() {
    let program = parse("type point {x integer, y integer};");
    match &program[0].kind {
        StmtKind::TypeDecl { name, ty } => {
            assert_eq!(name, "point");
            assert!(matches!(&ty.kind, TypeExprKind::Record(fields) if fields.len() == 2));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_sequence_type() {
    let ty = parser::parse_type_str("sequence([char])").unwrap();
    assert!(matches!(ty.kind, TypeExprKind::Sequence(_)));
}

#[test]
fn test_trailing_tokens_after_type_are_rejected() {
    assert!(parser::parse_type_str("integer integer").is_err());
}
