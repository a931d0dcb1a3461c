use super::*;
use crate::analysis::collect::{
    Field, InterfaceBinding, Provider, ProviderInput, ProviderKind, ProviderSet, Value,
};
use crate::analysis::provider_map::{TypeMap, build_provider_map};
use crate::analysis::solve::solve;
use crate::errors::DiagKind;
use crate::lexer::Lexer;
use crate::model::{PkgId, TypeId, TypeKind};
use crate::model::build::build_program;
use crate::parser;
use crate::parser::ast::{Expr, ExprKind, SourceId, Span};

fn span() -> Span {
    Span {
        start: 0,
        end: 0,
        context: SourceId::SYNTHETIC,
    }
}

fn fixture() -> Program {
    let source = r#"
package test "example.com/test"

struct A {}
struct B {}
"#;
    let (tokens, errors) = Lexer::new(source, SourceId::SYNTHETIC).collect_all();
    assert!(errors.is_empty());
    let eoi = Span {
        start: source.len(),
        end: source.len(),
        context: SourceId::SYNTHETIC,
    };
    let file = parser::parse_file(&tokens, eoi)
        .into_result()
        .expect("parse failure");
    let (program, diags) = build_program(&[file]);
    assert!(diags.is_empty(), "model diags: {:?}", diags);
    program
}

fn named(program: &mut Program, name: &str) -> TypeId {
    program
        .types
        .intern(TypeKind::Named(PkgId(0), name.to_string()))
}

fn provider(name: &str, inputs: &[TypeId], out: TypeId) -> Rc<Provider> {
    Rc::new(Provider {
        kind: ProviderKind::Function,
        pkg: PkgId(0),
        name: name.to_string(),
        pos: span(),
        inputs: inputs
            .iter()
            .map(|&ty| ProviderInput { ty, field: None })
            .collect(),
        out,
        has_cleanup: false,
        has_err: false,
        variadic: false,
    })
}

fn built(mut set: ProviderSet, program: &Program) -> ProviderSet {
    let (pm, sm, errors) = build_provider_map(program, &set);
    assert!(errors.is_empty(), "{:?}", errors);
    set.provider_map = pm;
    set.src_map = sm;
    set
}

fn empty_set() -> ProviderSet {
    ProviderSet {
        pos: span(),
        pkg: PkgId(0),
        var_name: None,
        providers: Vec::new(),
        bindings: Vec::new(),
        values: Vec::new(),
        fields: Vec::new(),
        imports: Vec::new(),
        injector_args: None,
        provider_map: TypeMap::new(),
        src_map: TypeMap::new(),
    }
}

#[test]
fn all_declarations_used() {
    let mut program = fixture();
    let a = named(&mut program, "A");
    let mut set = empty_set();
    set.providers = vec![provider("NewA", &[], a)];
    let set = built(set, &program);

    let (plan, used, errors) = solve(&program, a, &[], &set);
    assert!(errors.is_empty());
    assert!(plan.is_some());
    assert!(verify_args_used(&program, &set, &used).is_empty());
}

#[test]
fn unused_provider() {
    let mut program = fixture();
    let a = named(&mut program, "A");
    let mut set = empty_set();
    set.providers = vec![provider("NewA", &[], a)];
    let set = built(set, &program);

    let diags = verify_args_used(&program, &set, &[]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagKind::UnusedDeclaration);
    assert_eq!(diags[0].message, "unused provider \"NewA\"");
}

#[test]
fn unused_interface_binding() {
    let mut program = fixture();
    let a = named(&mut program, "A");
    let b = named(&mut program, "B");
    let mut set = empty_set();
    set.bindings = vec![Rc::new(InterfaceBinding {
        iface: a,
        provided: b,
        pos: span(),
    })];

    let diags = verify_args_used(&program, &set, &[]);
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags[0].message,
        "unused interface binding to type test.A"
    );
}

#[test]
fn unused_value() {
    let mut program = fixture();
    let a = named(&mut program, "A");
    let mut set = empty_set();
    set.values = vec![Rc::new(Value {
        out: a,
        expr: Expr::new(ExprKind::IntLit(1), span()),
        pkg: PkgId(0),
        pos: span(),
        idents: Vec::new(),
    })];

    let diags = verify_args_used(&program, &set, &[]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unused value of type test.A");
}

#[test]
fn unused_field() {
    let mut program = fixture();
    let a = named(&mut program, "A");
    let int = program.types.prim(crate::model::Prim::Int);
    let mut set = empty_set();
    set.fields = vec![Rc::new(Field {
        parent: a,
        name: "Count".to_string(),
        pkg: PkgId(0),
        out: int,
        pos: span(),
    })];

    let diags = verify_args_used(&program, &set, &[]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unused field \"Count\" of test.A");
}

#[test]
fn unused_named_provider_set() {
    let program = fixture();
    let mut import = empty_set();
    import.var_name = Some("MySet".to_string());
    let mut set = empty_set();
    set.imports = vec![Rc::new(import)];

    let diags = verify_args_used(&program, &set, &[]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unused provider set \"MySet\"");
}

#[test]
fn unused_unnamed_provider_set() {
    let program = fixture();
    let mut set = empty_set();
    set.imports = vec![Rc::new(empty_set())];

    let diags = verify_args_used(&program, &set, &[]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unused provider set");
}

#[test]
fn used_equals_solved() {
    let mut program = fixture();
    let a = named(&mut program, "A");
    let b = named(&mut program, "B");
    let mut set = empty_set();
    // NewB is reachable from the output; NewA is not.
    set.providers = vec![provider("NewB", &[], b), provider("NewA", &[], a)];
    let set = built(set, &program);

    let (plan, used, errors) = solve(&program, b, &[], &set);
    assert!(errors.is_empty());
    assert!(plan.is_some());
    let diags = verify_args_used(&program, &set, &used);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unused provider \"NewA\"");
}
