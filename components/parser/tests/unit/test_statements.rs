//! Statement and expression parsing tests

use core_types::ErrorKind;
use parser::{BinaryOp, ExprKind, Parser, StmtKind};

fn parse(source: &str) -> Vec<parser::Stmt> {
    Parser::new(source).parse_program().unwrap()
}

#[test]
fn test_tuple_destructuring() {
    let program = parse("var (a, b) := (1, 'x');");
    match &program[0].kind {
        StmtKind::Var { names, value, .. } => {
            assert_eq!(names.len(), 2);
            assert!(matches!(value.kind, ExprKind::Tuple(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_kindof_statement_accepts_end_kindof() {
    let program = parse(
        "kindof v when integer i then print(i); when text t then print(t); end kindof;",
    );
    match &program[0].kind {
        StmtKind::Kindof {
            whens, otherwise, ..
        } => {
            assert_eq!(whens.len(), 2);
            assert!(otherwise.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_reverse_range_loop() {
    let program = parse("for i in reverse 1..10 loop exit when i < 3; end loop;");
    match &program[0].kind {
        StmtKind::For {
            reverse,
            sequence_to,
            body,
            ..
        } => {
            assert!(*reverse);
            assert!(sequence_to.is_some());
            assert!(matches!(body.statements[0].kind, StmtKind::Exit { condition: Some(_) }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_case_expression_requires_else() {
    let err = Parser::new("var x := case y when 1 then 2 end;")
        .parse_program()
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnexpectedToken {
            found: "end".to_string(),
            expected: "else".to_string()
        }
    );
}

#[test]
fn test_guarded_case_expression() {
    let program = parse("var x := case when a > 1 then 'big' else 'small' end;");
    match &program[0].kind {
        StmtKind::Var { value, .. } => match &value.kind {
            ExprKind::Case { case, whens, .. } => {
                assert!(case.is_none());
                assert_eq!(whens.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_and_binds_tighter_than_or() {
    let program = parse("var x := a or b and c;");
    match &program[0].kind {
        StmtKind::Var { value, .. } => {
            assert!(matches!(value.kind, ExprKind::Binary { op: BinaryOp::Or, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_as_applies_to_postfix_expression() {
    let program = parse("var x := [] as [integer];");
    match &program[0].kind {
        StmtKind::Var { value, .. } => match &value.kind {
            ExprKind::As { expr, .. } => assert!(matches!(expr.kind, ExprKind::Array(ref a) if a.is_empty())),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_field_assignment() {
    let program = parse("p.x := 3;");
    match &program[0].kind {
        StmtKind::Assign { target, .. } => {
            assert!(matches!(target.kind, ExprKind::Field { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_directive_statement() {
    let program = parse("@suspend@;");
    assert_eq!(program[0].kind, StmtKind::Directive("suspend".to_string()));
}

#[test]
fn test_unterminated_block() {
    let err = Parser::new("begin x := 1;").parse_program().unwrap_err();
    assert!(err.message().starts_with("Unexpected token end of file"));
}
