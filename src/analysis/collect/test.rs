use super::*;
use crate::errors::Diag;
use crate::lexer::Lexer;
use crate::model::build::build_program;
use crate::parser;
use crate::parser::ast::SourceId;

fn collect(source: &str) -> (Vec<Injector>, Vec<Diag>) {
    let (tokens, errors) = Lexer::new(source, SourceId::SYNTHETIC).collect_all();
    assert!(errors.is_empty(), "lex errors: {:?}", errors);
    let eoi = Span {
        start: source.len(),
        end: source.len(),
        context: SourceId::SYNTHETIC,
    };
    let file = parser::parse_file(&tokens, eoi)
        .into_result()
        .expect("parse failure");
    let (mut program, diags) = build_program(&[file]);
    assert!(diags.is_empty(), "model diags: {:?}", diags);
    let mut collector = Collector::new(&mut program);
    let injectors = collector.collect_injectors();
    (injectors, collector.into_diags())
}

fn kinds(diags: &[Diag]) -> Vec<DiagKind> {
    diags.iter().map(|diag| diag.kind).collect()
}

#[test]
fn valid_injector_with_chain() {
    let source = r#"
package app "example.com/app"

struct A {}
struct B {}

fn NewA() -> A
fn NewB(a: A) -> B

fn InitB() -> B {
    Build(NewA, NewB)
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(injectors.len(), 1);
    let injector = &injectors[0];
    assert_eq!(injector.name, "InitB");
    assert!(!injector.has_cleanup);
    assert!(!injector.has_err);
    assert_eq!(injector.set.providers.len(), 2);
}

#[test]
fn injector_signature_flags() {
    let source = r#"
package app "example.com/app"

struct A {}
fn NewA() -> (A, cleanup, error)

fn InitA() -> (A, cleanup, error) {
    Build(NewA)
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    assert!(injectors[0].has_cleanup);
    assert!(injectors[0].has_err);
}

#[test]
fn injector_with_extra_statement_is_invalid() {
    let source = r#"
package app "example.com/app"

struct A {}
fn NewA() -> A

fn InitA() -> A {
    Build(NewA)
    Build(NewA)
}
"#;
    let (injectors, diags) = collect(source);
    assert!(injectors.is_empty());
    assert_eq!(kinds(&diags), vec![DiagKind::InvalidInjector]);
    assert!(diags[0].message.contains("single Build call"));
}

#[test]
fn injector_trailing_return_is_allowed() {
    let source = r#"
package app "example.com/app"

struct A {}
fn NewA() -> A

fn InitA() -> A {
    Build(NewA)
    return
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(injectors.len(), 1);
}

#[test]
fn injector_without_build_is_invalid() {
    let source = r#"
package app "example.com/app"

struct A {}

fn InitA() -> A {
    return
}
"#;
    let (_, diags) = collect(source);
    assert_eq!(kinds(&diags), vec![DiagKind::InvalidInjector]);
    assert!(diags[0].message.contains("must contain a Build call"));
}

#[test]
fn provider_with_too_many_returns() {
    let source = r#"
package app "example.com/app"

struct A {}
fn NewA() -> (A, cleanup, error, error)

fn InitA() -> A {
    Build(NewA)
}
"#;
    let (_, diags) = collect(source);
    assert_eq!(kinds(&diags), vec![DiagKind::BadProviderSignature]);
    assert!(diags[0].message.contains("too many return values"));
}

#[test]
fn provider_with_wrong_second_return() {
    let source = r#"
package app "example.com/app"

struct A {}
struct B {}
fn NewA() -> (A, B)

fn InitA() -> A {
    Build(NewA)
}
"#;
    let (_, diags) = collect(source);
    assert_eq!(kinds(&diags), vec![DiagKind::BadProviderSignature]);
    assert!(
        diags[0]
            .message
            .contains("second return value of NewA must be cleanup or error")
    );
}

#[test]
fn provider_with_duplicate_parameter_types() {
    let source = r#"
package app "example.com/app"

struct A {}
struct B {}
fn NewB(first: A, second: A) -> B

fn InitB() -> B {
    Build(NewB)
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::BadProviderSignature));
    assert!(
        diags[0]
            .message
            .contains("NewB has multiple parameters of type app.A")
    );
}

#[test]
fn bind_requires_interface_first() {
    let source = r#"
package app "example.com/app"

struct A {}
struct B {}
fn NewB() -> *B

fn InitA() -> A {
    Build(NewB, Bind(*A, *B))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("must be a pointer to an interface type"));
}

#[test]
fn bind_rejects_non_implementing_type() {
    let source = r#"
package app "example.com/app"

interface Logger
struct Plain {}
fn NewPlain() -> *Plain

fn Init() -> Logger {
    Build(NewPlain, Bind(*Logger, *Plain))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::IncompatibleBinding));
    assert!(diags[0].message.contains("does not implement"));
}

#[test]
fn bind_rejects_interface_to_itself() {
    let source = r#"
package app "example.com/app"

interface Logger

fn Init() -> Logger {
    Build(Bind(*Logger, *Logger))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::IncompatibleBinding));
    assert!(diags[0].message.contains("cannot bind interface app.Logger to itself"));
}

#[test]
fn interface_value_accepts_implementing_expression() {
    let source = r#"
package app "example.com/app"

interface Logger
struct FileLogger impl Logger {}
const quiet = &FileLogger{}

fn Init() -> Logger {
    Build(InterfaceValue(*Logger, quiet))
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(injectors[0].set.values.len(), 1);
    assert_eq!(injectors[0].set.values[0].out, injectors[0].out);
}

#[test]
fn value_of_interface_type_is_rejected() {
    let source = r#"
package app "example.com/app"

interface Logger
struct Holder {
    log: Logger
}
const holder = Holder{}

fn Init() -> Logger {
    Build(Value(holder.log))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("use InterfaceValue instead"));
}

#[test]
fn value_rejects_function_calls() {
    let source = r#"
package app "example.com/app"

fn Init() -> int {
    Build(Value(NewThing()))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("may not contain function calls"));
}

#[test]
fn struct_marker_selects_fields_in_order() {
    let source = r#"
package app "example.com/app"

struct Options {
    retries: int
    addr: string
}

fn NewRetries() -> int
fn NewAddr() -> string

fn Init() -> Options {
    Build(NewRetries, NewAddr, Struct(*Options, "retries", "addr"))
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    let set = &injectors[0].set;
    assert_eq!(set.providers.len(), 3);
    let provider = &set.providers[2];
    assert_eq!(provider.kind, ProviderKind::StructLiteral);
    assert_eq!(provider.name, "Options");
    assert_eq!(provider.inputs.len(), 2);
    assert_eq!(provider.inputs[0].field.as_deref(), Some("retries"));
    assert_eq!(provider.inputs[1].field.as_deref(), Some("addr"));
}

#[test]
fn struct_wildcard_skips_prevented_fields() {
    let source = r#"
package app "example.com/app"

struct Options {
    retries: int
    secret: string `-`
}

fn NewRetries() -> int

fn Init() -> Options {
    Build(NewRetries, Struct(*Options, "*"))
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    let provider = &injectors[0].set.providers[1];
    assert_eq!(provider.inputs.len(), 1);
    assert_eq!(provider.inputs[0].field.as_deref(), Some("retries"));
}

#[test]
fn struct_rejects_prevented_field_by_name() {
    let source = r#"
package app "example.com/app"

struct Options {
    secret: string `-`
}

fn Init() -> Options {
    Build(Struct(*Options, "secret"))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("marked as prevented"));
}

#[test]
fn struct_rejects_wildcard_mixed_with_names() {
    let source = r#"
package app "example.com/app"

struct Options {
    retries: int
}

fn Init() -> Options {
    Build(Struct(*Options, "*", "retries"))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("cannot mix \"*\" with named fields"));
}

#[test]
fn struct_rejects_unknown_field() {
    let source = r#"
package app "example.com/app"

struct Options {
    retries: int
}

fn Init() -> Options {
    Build(Struct(*Options, "timeout"))
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("timeout is not a field of app.Options"));
}

#[test]
fn double_pointer_struct_provides_pointer() {
    let source = r#"
package app "example.com/app"

struct Options {
    retries: int
}

fn NewRetries() -> int

fn Init() -> *Options {
    Build(NewRetries, Struct(**Options, "*"))
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    let provider = &injectors[0].set.providers[1];
    assert_eq!(provider.out, injectors[0].out);
}

#[test]
fn fields_of_produces_one_field_per_name() {
    let source = r#"
package app "example.com/app"

struct Config {
    addr: string
    retries: int
}

fn NewConfig() -> Config

fn Init() -> string {
    Build(NewConfig, FieldsOf(*Config, "addr"))
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    let set = &injectors[0].set;
    assert_eq!(set.fields.len(), 1);
    assert_eq!(set.fields[0].name, "addr");
}

#[test]
fn named_set_is_importable() {
    let source = r#"
package app "example.com/app"

struct A {}
struct B {}
fn NewA() -> A
fn NewB(a: A) -> B

let Base = Set(NewA, NewB)

fn InitB() -> B {
    Build(Base)
}
"#;
    let (injectors, diags) = collect(source);
    assert!(diags.is_empty(), "{:?}", diags);
    let set = &injectors[0].set;
    assert_eq!(set.imports.len(), 1);
    assert_eq!(set.imports[0].var_name.as_deref(), Some("Base"));
    assert_eq!(set.imports[0].providers.len(), 2);
}

#[test]
fn self_including_set_is_rejected() {
    let source = r#"
package app "example.com/app"

let Loop = Set(Loop)

fn Init() -> int {
    Build(Loop)
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("includes itself"));
}

#[test]
fn const_is_not_a_set_item() {
    let source = r#"
package app "example.com/app"

const retries = 3

fn Init() -> int {
    Build(retries)
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("not a provider or provider set"));
}

#[test]
fn build_inside_set_is_rejected() {
    let source = r#"
package app "example.com/app"

let Bad = Set(Build())

fn Init() -> int {
    Build(Bad)
}
"#;
    let (_, diags) = collect(source);
    assert!(kinds(&diags).contains(&DiagKind::InvalidArgument));
    assert!(diags[0].message.contains("Build may only appear as an injector body"));
}

#[test]
fn cycle_in_set_is_detected_at_collection() {
    let source = r#"
package app "example.com/app"

struct A {}
struct B {}
fn NewA(b: B) -> A
fn NewB(a: A) -> B

fn InitA() -> A {
    Build(NewA, NewB)
}
"#;
    let (injectors, diags) = collect(source);
    assert!(injectors.is_empty());
    assert!(kinds(&diags).contains(&DiagKind::Cycle));
}

#[test]
fn conflict_in_set_is_detected_at_collection() {
    let source = r#"
package app "example.com/app"

struct A {}
fn NewA1() -> A
fn NewA2() -> A

fn InitA() -> A {
    Build(NewA1, NewA2)
}
"#;
    let (injectors, diags) = collect(source);
    assert!(injectors.is_empty());
    assert!(kinds(&diags).contains(&DiagKind::MultipleBindings));
}
