use super::*;
use crate::lexer::Lexer;
use crate::parser::ast::SourceId;

fn parse(source: &str) -> File {
    let (tokens, errors) = Lexer::new(source, SourceId::SYNTHETIC).collect_all();
    assert!(errors.is_empty(), "lex errors: {:?}", errors);
    let eoi = Span {
        start: source.len(),
        end: source.len(),
        context: SourceId::SYNTHETIC,
    };
    parse_file(&tokens, eoi).into_result().expect("parse failure")
}

fn parse_errors(source: &str) -> usize {
    let (tokens, errors) = Lexer::new(source, SourceId::SYNTHETIC).collect_all();
    assert!(errors.is_empty(), "lex errors: {:?}", errors);
    let eoi = Span {
        start: source.len(),
        end: source.len(),
        context: SourceId::SYNTHETIC,
    };
    let result = parse_file(&tokens, eoi);
    result.errors().count()
}

#[test]
fn package_and_imports() {
    let file = parse(
        "package app \"example.com/app\"\nimport \"example.com/db\" as storage\nimport \"example.com/log\"\n",
    );
    assert_eq!(file.package.name, "app");
    assert_eq!(file.package.path, "example.com/app");
    assert_eq!(file.imports.len(), 2);
    assert_eq!(file.imports[0].alias.as_deref(), Some("storage"));
    assert_eq!(file.imports[1].alias, None);
}

#[test]
fn struct_with_impls_and_tag() {
    let file = parse(
        "package app \"example.com/app\"\ninterface Logger\nstruct FileLogger impl Logger {\n    level: int\n    secret: string `-`\n}\n",
    );
    let Decl::Struct(decl) = &file.decls[1] else {
        panic!("expected struct");
    };
    assert_eq!(decl.impls.len(), 1);
    assert_eq!(decl.impls[0].name, "Logger");
    assert_eq!(decl.fields.len(), 2);
    assert_eq!(decl.fields[1].tag.as_deref(), Some("-"));
}

#[test]
fn function_return_shapes() {
    let file = parse(
        "package app \"example.com/app\"\nfn A() -> int\nfn B() -> (*Server, cleanup, error)\nfn C(xs: ...string) -> bool\n",
    );
    let Decl::Func(b) = &file.decls[1] else {
        panic!("expected func");
    };
    assert_eq!(b.rets.len(), 3);
    assert!(matches!(b.rets[0].kind, RetKind::Type(_)));
    assert!(matches!(b.rets[1].kind, RetKind::Cleanup));
    assert!(matches!(b.rets[2].kind, RetKind::Error));

    let Decl::Func(c) = &file.decls[2] else {
        panic!("expected func");
    };
    assert!(c.params[0].variadic);
}

#[test]
fn injector_body_statements() {
    let file = parse(
        "package app \"example.com/app\"\nfn Init() -> int {\n    Build(Base)\n    return\n}\n",
    );
    let Decl::Func(decl) = &file.decls[0] else {
        panic!("expected func");
    };
    let body = decl.body.as_ref().unwrap();
    assert_eq!(body.len(), 2);
    assert!(matches!(
        &body[0],
        Stmt::Expr(Expr { kind: ExprKind::Call(path, _), .. }) if path.name == "Build"
    ));
    assert!(matches!(body[1], Stmt::Return(_)));
}

#[test]
fn set_declaration_with_markers() {
    let file = parse(
        "package app \"example.com/app\"\nlet Base = Set(NewConfig, Bind(*Logger, *FileLogger), Value(42))\n",
    );
    let Decl::Set(decl) = &file.decls[0] else {
        panic!("expected set");
    };
    let ExprKind::Call(path, items) = &decl.value.kind else {
        panic!("expected call");
    };
    assert_eq!(path.name, "Set");
    assert_eq!(items.len(), 3);
    assert!(matches!(&items[0].kind, ExprKind::Path(p) if p.name == "NewConfig"));

    let ExprKind::Call(bind, bind_args) = &items[1].kind else {
        panic!("expected Bind call");
    };
    assert_eq!(bind.name, "Bind");
    let ExprKind::TypeRef(first) = &bind_args[0].kind else {
        panic!("expected type ref");
    };
    assert!(matches!(first.kind, TypeExprKind::Pointer(_)));
}

#[test]
fn double_pointer_type_ref() {
    let file = parse(
        "package app \"example.com/app\"\nlet S = Set(Struct(**Config, \"*\"))\n",
    );
    let Decl::Set(decl) = &file.decls[0] else {
        panic!("expected set");
    };
    let ExprKind::Call(_, items) = &decl.value.kind else {
        panic!("expected call");
    };
    let ExprKind::Call(_, args) = &items[0].kind else {
        panic!("expected Struct call");
    };
    let ExprKind::TypeRef(texpr) = &args[0].kind else {
        panic!("expected type ref");
    };
    let TypeExprKind::Pointer(inner) = &texpr.kind else {
        panic!("expected pointer");
    };
    assert!(matches!(inner.kind, TypeExprKind::Pointer(_)));
}

#[test]
fn value_expressions() {
    let file = parse(
        "package app \"example.com/app\"\nconst c = &Options{retries: 3, addr: defaults.addr}\n",
    );
    let Decl::Const(decl) = &file.decls[0] else {
        panic!("expected const");
    };
    let ExprKind::Ref(inner) = &decl.value.kind else {
        panic!("expected &expr");
    };
    let ExprKind::StructLit(path, inits) = &inner.kind else {
        panic!("expected struct literal");
    };
    assert_eq!(path.name, "Options");
    assert_eq!(inits.len(), 2);
}

#[test]
fn qualified_paths() {
    let file = parse("package app \"example.com/app\"\nfn F(p: *db.Pool) -> int\n");
    let Decl::Func(decl) = &file.decls[0] else {
        panic!("expected func");
    };
    let TypeExprKind::Pointer(inner) = &decl.params[0].ty.kind else {
        panic!("expected pointer");
    };
    let TypeExprKind::Path(path) = &inner.kind else {
        panic!("expected path");
    };
    assert_eq!(path.qualifier.as_deref(), Some("db"));
    assert_eq!(path.name, "Pool");
}

#[test]
fn missing_package_clause_is_an_error() {
    assert!(parse_errors("fn F() -> int\n") > 0);
}

#[test]
fn unbalanced_braces_are_an_error() {
    assert!(parse_errors("package app \"example.com/app\"\nstruct S {\n") > 0);
}
