//! Prints solved injectors as a generated `.weft` source file.

use crate::analysis::collect::Injector;
use crate::analysis::solve::{CallKind, Plan, SourceRef};
use crate::model::{PkgId, Prim, Program, TypeId, TypeKind};
use crate::parser::ast::{Expr, ExprKind, TypePath};
use std::collections::BTreeMap;
use std::collections::HashSet;

/// First line of every generated file; the driver skips files carrying it.
pub const GENERATED_HEADER: &str = "// Code generated by weft. DO NOT EDIT.";

static RESERVED: &[&str] = &[
    "package",
    "import",
    "as",
    "struct",
    "interface",
    "impl",
    "fn",
    "const",
    "let",
    "return",
    "cleanup",
    "error",
    "true",
    "false",
    "nil",
    "err",
];

/// Emits the generated file for one package: header, package clause, the
/// imports the plans reference, and one function per injector. Output is
/// deterministic for identical input.
pub fn emit_package(
    program: &Program,
    pkg: PkgId,
    solved: &[(&Injector, &Plan)],
) -> String {
    let mut imports: BTreeMap<String, String> = BTreeMap::new();
    for (injector, plan) in solved {
        collect_imports(program, pkg, injector, plan, &mut imports);
    }

    let package = program.package(pkg);
    let mut out = String::new();
    out.push_str(GENERATED_HEADER);
    out.push_str("\n\n");
    out.push_str(&format!("package {} {:?}\n", package.name, package.path));
    if !imports.is_empty() {
        out.push('\n');
        for (path, alias) in &imports {
            out.push_str(&format!("import {:?} as {}\n", path, alias));
        }
    }
    for (injector, plan) in solved {
        out.push('\n');
        emit_injector(program, pkg, injector, plan, &mut out);
    }
    out
}

fn collect_imports(
    program: &Program,
    pkg: PkgId,
    injector: &Injector,
    plan: &Plan,
    imports: &mut BTreeMap<String, String>,
) {
    let mut add = |imports: &mut BTreeMap<String, String>, other: PkgId| {
        if other != pkg {
            let package = program.package(other);
            imports.insert(package.path.clone(), package.name.clone());
        }
    };
    for (_, ty) in &injector.params {
        for other in packages_of(program, *ty) {
            add(imports, other);
        }
    }
    for other in packages_of(program, injector.out) {
        add(imports, other);
    }
    for call in &plan.calls {
        add(imports, call.pkg);
        if let Some(value) = &call.value {
            for ident in &value.idents {
                add(imports, ident.pkg);
            }
        }
    }
}

fn packages_of(program: &Program, ty: TypeId) -> Vec<PkgId> {
    match program.types.kind(ty) {
        TypeKind::Prim(_) => Vec::new(),
        TypeKind::Named(pkg, _) => vec![*pkg],
        TypeKind::Pointer(inner) => packages_of(program, *inner),
    }
}

fn emit_injector(
    program: &Program,
    pkg: PkgId,
    injector: &Injector,
    plan: &Plan,
    out: &mut String,
) {
    let mut names = Names::new();
    for (param, _) in &injector.params {
        names.claim(param);
    }

    // Assign a variable name per call, in plan order.
    let mut vars: Vec<String> = Vec::with_capacity(plan.calls.len());
    for call in &plan.calls {
        let base = program.base_name(call.out);
        vars.push(names.type_variable(program, call.out, &base, pkg));
    }

    let params = injector
        .params
        .iter()
        .map(|(name, ty)| format!("{}: {}", name, type_in(program, pkg, *ty)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut rets = vec![type_in(program, pkg, injector.out)];
    if injector.has_cleanup {
        rets.push("cleanup".to_string());
    }
    if injector.has_err {
        rets.push("error".to_string());
    }
    let ret_clause = if rets.len() == 1 {
        rets[0].clone()
    } else {
        format!("({})", rets.join(", "))
    };
    out.push_str(&format!(
        "fn {}({}) -> {} {{\n",
        injector.name, params, ret_clause
    ));

    let mut cleanups: Vec<String> = Vec::new();
    for (index, call) in plan.calls.iter().enumerate() {
        let rhs = render_call(program, pkg, injector, plan, &vars, index);
        let mut lhs = vec![vars[index].clone()];
        let cleanup_var = if call.has_cleanup {
            // `cleanup` itself is a keyword in return clauses.
            let var = names.claim_fresh("teardown");
            lhs.push(var.clone());
            Some(var)
        } else {
            None
        };
        if call.has_err {
            lhs.push("err".to_string());
        }
        out.push_str(&format!("    {} := {}\n", lhs.join(", "), rhs));
        if call.has_err {
            out.push_str("    if err != nil {\n");
            for cleanup in cleanups.iter().rev() {
                out.push_str(&format!("        {}()\n", cleanup));
            }
            let mut failure = vec![zero_value(program, pkg, injector.out)];
            if injector.has_cleanup {
                failure.push("nil".to_string());
            }
            failure.push("err".to_string());
            out.push_str(&format!("        return {}\n", failure.join(", ")));
            out.push_str("    }\n");
        }
        if let Some(var) = cleanup_var {
            cleanups.push(var);
        }
    }

    let result = source_ref(injector, &vars, plan.result);
    let mut returns = vec![result];
    if injector.has_cleanup {
        if cleanups.is_empty() {
            returns.push("func() {}".to_string());
        } else {
            let body = cleanups
                .iter()
                .rev()
                .map(|cleanup| format!("{}()", cleanup))
                .collect::<Vec<_>>()
                .join("; ");
            returns.push(format!("func() {{ {} }}", body));
        }
    }
    if injector.has_err {
        returns.push("nil".to_string());
    }
    out.push_str(&format!("    return {}\n", returns.join(", ")));
    out.push_str("}\n");
}

fn source_ref(injector: &Injector, vars: &[String], source: SourceRef) -> String {
    match source {
        SourceRef::Arg(index) => injector.params[index].0.clone(),
        SourceRef::Call(index) => vars[index].clone(),
    }
}

fn render_call(
    program: &Program,
    pkg: PkgId,
    injector: &Injector,
    plan: &Plan,
    vars: &[String],
    index: usize,
) -> String {
    let call = &plan.calls[index];
    let args: Vec<String> = call
        .args
        .iter()
        .map(|&arg| source_ref(injector, vars, arg))
        .collect();
    match call.kind {
        CallKind::Function => {
            format!("{}({})", qualified(program, pkg, call.pkg, &call.name), args.join(", "))
        }
        CallKind::StructLiteral => {
            let fields = call
                .field_names
                .iter()
                .zip(&args)
                .map(|(field, arg)| format!("{}: {}", field, arg))
                .collect::<Vec<_>>()
                .join(", ");
            let literal = format!(
                "{}{{{}}}",
                qualified(program, pkg, call.pkg, &call.name),
                fields
            );
            if program.types.pointee(call.out).is_some() {
                format!("&{}", literal)
            } else {
                literal
            }
        }
        CallKind::Field => format!("{}.{}", args[0], call.name),
        CallKind::Value => {
            let value = call.value.as_ref().expect("value call carries expression");
            render_expr(program, pkg, value.pkg, &value.expr)
        }
    }
}

/// Renders a value expression into the generated package, requalifying
/// identifiers: names from the expression's home package gain its qualifier
/// when emitted elsewhere, and import aliases are rewritten to the target
/// package's short name.
fn render_expr(program: &Program, pkg: PkgId, home: PkgId, expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntLit(value) => value.to_string(),
        ExprKind::FloatLit(value) => {
            if value.fract() == 0.0 {
                format!("{:.1}", value)
            } else {
                value.to_string()
            }
        }
        ExprKind::BoolLit(value) => value.to_string(),
        ExprKind::StringLit(value) => format!("{:?}", value),
        ExprKind::Path(path) => render_path(program, pkg, home, path),
        ExprKind::Ref(inner) => format!("&{}", render_expr(program, pkg, home, inner)),
        ExprKind::FieldAccess(receiver, field) => {
            format!("{}.{}", render_expr(program, pkg, home, receiver), field)
        }
        ExprKind::StructLit(path, inits) => {
            let fields = inits
                .iter()
                .map(|(field, init)| {
                    format!("{}: {}", field, render_expr(program, pkg, home, init))
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}{{{}}}", render_path(program, pkg, home, path), fields)
        }
        ExprKind::Call(path, args) => {
            let rendered = args
                .iter()
                .map(|arg| render_expr(program, pkg, home, arg))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({})", render_path(program, pkg, home, path), rendered)
        }
        ExprKind::TypeRef(_) => String::new(),
    }
}

fn render_path(program: &Program, pkg: PkgId, home: PkgId, path: &TypePath) -> String {
    match &path.qualifier {
        Some(alias) => {
            // Resolve the alias in the home package and requalify for `pkg`.
            match program.package(home).imports.get(alias) {
                Some(&target) => qualified(program, pkg, target, &path.name),
                None => format!("{}.{}", alias, path.name),
            }
        }
        None => qualified(program, pkg, home, &path.name),
    }
}

fn qualified(program: &Program, pkg: PkgId, target: PkgId, name: &str) -> String {
    if target == pkg {
        name.to_string()
    } else {
        format!("{}.{}", program.package(target).name, name)
    }
}

/// Renders a type relative to the generated package.
fn type_in(program: &Program, pkg: PkgId, ty: TypeId) -> String {
    match program.types.kind(ty) {
        TypeKind::Prim(prim) => prim.name().to_string(),
        TypeKind::Named(other, name) => qualified(program, pkg, *other, name),
        TypeKind::Pointer(inner) => format!("*{}", type_in(program, pkg, *inner)),
    }
}

/// The zero value of a type, used for failed-return positions.
fn zero_value(program: &Program, pkg: PkgId, ty: TypeId) -> String {
    match program.types.kind(ty) {
        TypeKind::Prim(Prim::Int) => "0".to_string(),
        TypeKind::Prim(Prim::Float) => "0.0".to_string(),
        TypeKind::Prim(Prim::Bool) => "false".to_string(),
        TypeKind::Prim(Prim::String) => "\"\"".to_string(),
        TypeKind::Pointer(_) => "nil".to_string(),
        TypeKind::Named(..) if program.is_interface(ty) => "nil".to_string(),
        TypeKind::Named(..) => format!("{}{{}}", type_in(program, pkg, ty)),
    }
}

/// Variable-name allocation for one generated function.
struct Names {
    taken: HashSet<String>,
}

impl Names {
    fn new() -> Self {
        Names {
            taken: HashSet::new(),
        }
    }

    fn claim(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    fn collides(&self, name: &str) -> bool {
        self.taken.contains(name) || RESERVED.contains(&name)
    }

    /// Picks a variable name for a value of `ty`: the unexported base name,
    /// then the package-prefixed form, then numbered fallbacks.
    fn type_variable(&mut self, program: &Program, ty: TypeId, base: &str, pkg: PkgId) -> String {
        let candidate = unexport(base);
        if !self.collides(&candidate) {
            self.claim(&candidate);
            return candidate;
        }
        if let Some(owner) = program.package_of_named(strip_pointers(program, ty)) {
            if owner != pkg {
                let prefixed = unexport(&format!(
                    "{}{}",
                    program.package(owner).name,
                    export(base)
                ));
                if !self.collides(&prefixed) {
                    self.claim(&prefixed);
                    return prefixed;
                }
            }
        }
        self.claim_fresh(&candidate)
    }

    /// Appends a numeric suffix (starting at 2) until the name is free.
    fn claim_fresh(&mut self, base: &str) -> String {
        if !self.collides(base) {
            self.claim(base);
            return base.to_string();
        }
        let mut counter = 2usize;
        loop {
            let candidate = format!("{}{}", base, counter);
            if !self.collides(&candidate) {
                self.claim(&candidate);
                return candidate;
            }
            counter += 1;
        }
    }
}

fn strip_pointers(program: &Program, ty: TypeId) -> TypeId {
    match program.types.kind(ty) {
        TypeKind::Pointer(inner) => strip_pointers(program, *inner),
        _ => ty,
    }
}

/// Lowercases the leading uppercase run of a name, keeping the last capital
/// when it starts an interior word: `HTTPClient` becomes `httpClient`.
pub fn unexport(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let run = chars.iter().take_while(|ch| ch.is_uppercase()).count();
    if run == 0 {
        return name.to_string();
    }
    let lower_until = if run == chars.len() {
        run
    } else if chars[run].is_lowercase() && run > 1 {
        run - 1
    } else {
        run
    };
    chars
        .iter()
        .enumerate()
        .map(|(index, ch)| {
            if index < lower_until {
                ch.to_lowercase().next().unwrap_or(*ch)
            } else {
                *ch
            }
        })
        .collect()
}

/// Uppercases the first character of a name.
pub fn export(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
