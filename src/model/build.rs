use super::{
    ConstInfo, FuncSig, Object, ObjectKind, Package, PkgId, Prim, Program, RetSig, SetInfo,
    StructField, TypeDeclKind, TypeId, TypeKind, TypeTable,
};
use crate::errors::{Diag, DiagCollector, DiagKind};
use crate::parser::ast::{
    Decl, Expr, ExprKind, File, RetKind, Span, TypeExpr, TypeExprKind, TypePath,
};
use bimap::BiMap;
use std::collections::HashMap;

/// An identifier referenced by a value expression, resolved to its declaring
/// package. `local` marks names bound inside the enclosing injector, which
/// generated code can never reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueIdent {
    pub pkg: PkgId,
    pub name: String,
    pub pos: Span,
    pub local: bool,
}

/// Builds the typed program model from parsed files. All resolution errors
/// are collected; declarations that failed to resolve are left out of the
/// model so later phases see a consistent view.
pub fn build_program(files: &[File]) -> (Program, Vec<Diag>) {
    let mut diags = DiagCollector::new();

    let mut paths = BiMap::new();
    let mut packages = Vec::new();
    for (index, file) in files.iter().enumerate() {
        let id = PkgId(index);
        if paths.contains_left(&file.package.path) {
            diags.add(
                Diag::new(
                    DiagKind::Resolve,
                    format!("package path {:?} declared more than once", file.package.path),
                )
                .at(file.package.span),
            );
        } else {
            paths.insert(file.package.path.clone(), id);
        }
        packages.push(Package {
            id,
            path: file.package.path.clone(),
            name: file.package.name.clone(),
            imports: HashMap::new(),
            objects: Vec::new(),
            by_name: HashMap::new(),
        });
    }

    let mut program = Program {
        packages,
        paths,
        types: TypeTable::new(),
        type_decls: HashMap::new(),
    };

    // Named types are registered before anything that mentions one. A name
    // declared twice keeps its first declaration; the rest are skipped.
    let mut skipped: Vec<(usize, usize)> = Vec::new();
    let mut declared: Vec<std::collections::HashSet<String>> =
        vec![std::collections::HashSet::new(); files.len()];
    for (index, file) in files.iter().enumerate() {
        let pkg = PkgId(index);
        for (decl_index, decl) in file.decls.iter().enumerate() {
            let (name, span) = match decl {
                Decl::Struct(d) => (&d.name, d.span),
                Decl::Interface(d) => (&d.name, d.span),
                Decl::Func(d) => (&d.name, d.span),
                Decl::Const(d) => (&d.name, d.span),
                Decl::Set(d) => (&d.name, d.span),
            };
            if !declared[index].insert(name.clone()) {
                diags.add(
                    Diag::new(
                        DiagKind::Resolve,
                        format!(
                            "{} redeclared in package {}",
                            name, program.packages[pkg.0].name
                        ),
                    )
                    .at(span),
                );
                skipped.push((index, decl_index));
                continue;
            }
            match decl {
                Decl::Struct(_) => {
                    let ty = program.types.intern(TypeKind::Named(pkg, name.clone()));
                    program.type_decls.insert(
                        ty,
                        TypeDeclKind::Struct {
                            fields: Vec::new(),
                            impls: Vec::new(),
                        },
                    );
                    push_object(
                        &mut program.packages[pkg.0],
                        name.clone(),
                        pkg,
                        span,
                        ObjectKind::TypeName(ty),
                    );
                }
                Decl::Interface(_) => {
                    let ty = program.types.intern(TypeKind::Named(pkg, name.clone()));
                    program.type_decls.insert(ty, TypeDeclKind::Interface);
                    push_object(
                        &mut program.packages[pkg.0],
                        name.clone(),
                        pkg,
                        span,
                        ObjectKind::TypeName(ty),
                    );
                }
                // Filled in below, once all types are known.
                Decl::Func(_) | Decl::Const(_) | Decl::Set(_) => {}
            }
        }
    }

    for (index, file) in files.iter().enumerate() {
        let pkg = PkgId(index);
        for import in &file.imports {
            let Some(&target) = program.paths.get_by_left(&import.path) else {
                diags.add(
                    Diag::new(
                        DiagKind::Resolve,
                        format!("cannot find package {:?}", import.path),
                    )
                    .at(import.span),
                );
                continue;
            };
            let alias = import
                .alias
                .clone()
                .unwrap_or_else(|| program.packages[target.0].name.clone());
            program.packages[pkg.0].imports.insert(alias, target);
        }
    }

    for (index, file) in files.iter().enumerate() {
        let pkg = PkgId(index);
        for (decl_index, decl) in file.decls.iter().enumerate() {
            if skipped.contains(&(index, decl_index)) {
                continue;
            }
            match decl {
                Decl::Struct(d) => {
                    let ty = program.types.intern(TypeKind::Named(pkg, d.name.clone()));
                    let mut fields = Vec::new();
                    for field in &d.fields {
                        match resolve_type_expr(&mut program, pkg, &field.ty) {
                            Ok(field_ty) => fields.push(StructField {
                                name: field.name.clone(),
                                ty: field_ty,
                                prevented: field.tag.as_deref() == Some("-"),
                                pos: field.span,
                            }),
                            Err(diag) => diags.add(diag),
                        }
                    }
                    let mut impls = Vec::new();
                    for impl_path in &d.impls {
                        match resolve_named(&program, pkg, impl_path) {
                            Ok(iface) if program.is_interface(iface) => impls.push(iface),
                            Ok(iface) => diags.add(
                                Diag::new(
                                    DiagKind::Resolve,
                                    format!(
                                        "{} cannot implement {}: not an interface",
                                        d.name,
                                        program.display_type(iface)
                                    ),
                                )
                                .at(impl_path.span),
                            ),
                            Err(diag) => diags.add(diag),
                        }
                    }
                    program
                        .type_decls
                        .insert(ty, TypeDeclKind::Struct { fields, impls });
                }
                Decl::Interface(_) => {}
                Decl::Func(d) => {
                    let mut params = Vec::new();
                    let mut variadic = false;
                    let mut ok = true;
                    for (position, param) in d.params.iter().enumerate() {
                        if param.variadic {
                            if position + 1 == d.params.len() {
                                variadic = true;
                            } else {
                                diags.add(
                                    Diag::new(
                                        DiagKind::Resolve,
                                        format!(
                                            "{}: only the final parameter may be variadic",
                                            d.name
                                        ),
                                    )
                                    .at(param.span),
                                );
                                ok = false;
                                continue;
                            }
                        }
                        match resolve_type_expr(&mut program, pkg, &param.ty) {
                            Ok(ty) => params.push((param.name.clone(), ty)),
                            Err(diag) => {
                                diags.add(diag);
                                ok = false;
                            }
                        }
                    }
                    let mut rets = Vec::new();
                    for ret in &d.rets {
                        match &ret.kind {
                            RetKind::Cleanup => rets.push(RetSig::Cleanup(ret.span)),
                            RetKind::Error => rets.push(RetSig::Error(ret.span)),
                            RetKind::Type(texpr) => {
                                match resolve_type_expr(&mut program, pkg, texpr) {
                                    Ok(ty) => rets.push(RetSig::Type(ty, ret.span)),
                                    Err(diag) => {
                                        diags.add(diag);
                                        ok = false;
                                    }
                                }
                            }
                        }
                    }
                    if ok {
                        push_object(
                            &mut program.packages[pkg.0],
                            d.name.clone(),
                            pkg,
                            d.span,
                            ObjectKind::Func(FuncSig {
                                params,
                                variadic,
                                rets,
                                body: d.body.clone(),
                            }),
                        );
                    }
                }
                Decl::Const(d) => {
                    match type_of_expr(&mut program, pkg, &HashMap::new(), &d.value) {
                        Ok(ty) => push_object(
                            &mut program.packages[pkg.0],
                            d.name.clone(),
                            pkg,
                            d.span,
                            ObjectKind::Const(ConstInfo {
                                ty,
                                value: d.value.clone(),
                            }),
                        ),
                        Err(diag) => diags.add(diag),
                    }
                }
                Decl::Set(d) => push_object(
                    &mut program.packages[pkg.0],
                    d.name.clone(),
                    pkg,
                    d.span,
                    ObjectKind::Set(SetInfo {
                        value: d.value.clone(),
                    }),
                ),
            }
        }
    }

    (program, diags.into_diags())
}

fn push_object(package: &mut Package, name: String, pkg: PkgId, pos: Span, kind: ObjectKind) {
    package.by_name.insert(name.clone(), package.objects.len());
    package.objects.push(Object {
        name,
        pkg,
        pos,
        kind,
    });
}

/// Resolves a surface type expression to an interned type identity.
pub fn resolve_type_expr(
    program: &mut Program,
    pkg: PkgId,
    texpr: &TypeExpr,
) -> Result<TypeId, Diag> {
    match &texpr.kind {
        TypeExprKind::Pointer(inner) => {
            let inner = resolve_type_expr(program, pkg, inner)?;
            Ok(program.types.pointer_to(inner))
        }
        TypeExprKind::Path(path) => resolve_named(program, pkg, path).or_else(|diag| {
            if path.qualifier.is_none() {
                if let Some(prim) = Prim::from_name(&path.name) {
                    return Ok(program.types.prim(prim));
                }
            }
            Err(diag)
        }),
    }
}

/// Resolves a possibly-qualified path to a declared named type.
fn resolve_named(program: &Program, pkg: PkgId, path: &TypePath) -> Result<TypeId, Diag> {
    let target = match &path.qualifier {
        None => pkg,
        Some(alias) => *program.package(pkg).imports.get(alias).ok_or_else(|| {
            Diag::new(DiagKind::Resolve, format!("undefined package {}", alias)).at(path.span)
        })?,
    };
    match program.package(target).object(&path.name) {
        Some(object) => match &object.kind {
            ObjectKind::TypeName(ty) => Ok(*ty),
            _ => Err(
                Diag::new(DiagKind::Resolve, format!("{} is not a type", path)).at(path.span),
            ),
        },
        None => Err(Diag::new(DiagKind::Resolve, format!("undefined type {}", path)).at(path.span)),
    }
}

/// Computes the type of a value expression written in package `pkg`.
/// `locals` carries names bound by an enclosing injector.
pub fn type_of_expr(
    program: &mut Program,
    pkg: PkgId,
    locals: &HashMap<String, TypeId>,
    expr: &Expr,
) -> Result<TypeId, Diag> {
    match &expr.kind {
        ExprKind::IntLit(_) => Ok(program.types.prim(Prim::Int)),
        ExprKind::FloatLit(_) => Ok(program.types.prim(Prim::Float)),
        ExprKind::BoolLit(_) => Ok(program.types.prim(Prim::Bool)),
        ExprKind::StringLit(_) => Ok(program.types.prim(Prim::String)),
        ExprKind::Ref(inner) => {
            let inner = type_of_expr(program, pkg, locals, inner)?;
            Ok(program.types.pointer_to(inner))
        }
        ExprKind::Path(path) => match &path.qualifier {
            None => {
                if let Some(&ty) = locals.get(&path.name) {
                    return Ok(ty);
                }
                const_type(program, pkg, &path.name, expr.span)
            }
            Some(qualifier) => {
                if let Some(&target) = program.package(pkg).imports.get(qualifier) {
                    return const_type(program, target, &path.name, expr.span);
                }
                // Not an import alias: `a.b` is field access on the value `a`.
                let receiver = if let Some(&ty) = locals.get(qualifier) {
                    ty
                } else {
                    const_type(program, pkg, qualifier, expr.span)?
                };
                field_type(program, receiver, &path.name, expr.span)
            }
        },
        ExprKind::FieldAccess(receiver, field) => {
            let receiver = type_of_expr(program, pkg, locals, receiver)?;
            field_type(program, receiver, field, expr.span)
        }
        ExprKind::StructLit(path, inits) => {
            let ty = resolve_named(program, pkg, path)?;
            if !program.is_struct(ty) {
                return Err(Diag::new(
                    DiagKind::Resolve,
                    format!("{} is not a struct type", program.display_type(ty)),
                )
                .at(path.span));
            }
            for (field_name, init) in inits {
                let Some(field) = program
                    .struct_fields(ty)
                    .and_then(|fields| fields.iter().find(|f| &f.name == field_name))
                    .cloned()
                else {
                    return Err(Diag::new(
                        DiagKind::Resolve,
                        format!(
                            "{} has no field named {}",
                            program.display_type(ty),
                            field_name
                        ),
                    )
                    .at(init.span));
                };
                let init_ty = type_of_expr(program, pkg, locals, init)?;
                if init_ty != field.ty {
                    return Err(Diag::new(
                        DiagKind::Resolve,
                        format!(
                            "cannot use {} as {} for field {}",
                            program.display_type(init_ty),
                            program.display_type(field.ty),
                            field_name
                        ),
                    )
                    .at(init.span));
                }
            }
            Ok(ty)
        }
        ExprKind::Call(path, _) => Err(Diag::new(
            DiagKind::Resolve,
            format!("call to {} is not a constant expression", path),
        )
        .at(expr.span)),
        ExprKind::TypeRef(_) => Err(Diag::new(
            DiagKind::Resolve,
            "type expression is not a value".to_string(),
        )
        .at(expr.span)),
    }
}

fn const_type(program: &Program, pkg: PkgId, name: &str, pos: Span) -> Result<TypeId, Diag> {
    match program.package(pkg).object(name) {
        Some(object) => match &object.kind {
            ObjectKind::Const(info) => Ok(info.ty),
            _ => Err(Diag::new(
                DiagKind::Resolve,
                format!("{} is not a value", name),
            )
            .at(pos)),
        },
        None => Err(Diag::new(DiagKind::Resolve, format!("undefined name {}", name)).at(pos)),
    }
}

fn field_type(program: &Program, receiver: TypeId, field: &str, pos: Span) -> Result<TypeId, Diag> {
    // One level of pointer indirection is stepped through, as in the original.
    let base = program.types.pointee(receiver).unwrap_or(receiver);
    match program
        .struct_fields(base)
        .and_then(|fields| fields.iter().find(|f| f.name == field))
    {
        Some(field) => Ok(field.ty),
        None => Err(Diag::new(
            DiagKind::Resolve,
            format!(
                "{} has no field named {}",
                program.display_type(receiver),
                field
            ),
        )
        .at(pos)),
    }
}

/// Reports whether an expression contains a call. Calls are the only
/// side-effecting expression form in the surface language.
pub fn expr_has_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call(..) => true,
        ExprKind::Ref(inner) => expr_has_call(inner),
        ExprKind::FieldAccess(receiver, _) => expr_has_call(receiver),
        ExprKind::StructLit(_, inits) => inits.iter().any(|(_, init)| expr_has_call(init)),
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::Path(_)
        | ExprKind::TypeRef(_) => false,
    }
}

/// Collects every identifier a value expression references, resolved to its
/// declaring package, for the post-solve visibility check.
pub fn expr_idents(
    program: &Program,
    pkg: PkgId,
    locals: &HashMap<String, TypeId>,
    expr: &Expr,
) -> Vec<ValueIdent> {
    let mut out = Vec::new();
    collect_idents(program, pkg, locals, expr, &mut out);
    out
}

fn collect_idents(
    program: &Program,
    pkg: PkgId,
    locals: &HashMap<String, TypeId>,
    expr: &Expr,
    out: &mut Vec<ValueIdent>,
) {
    match &expr.kind {
        ExprKind::Path(path) => match &path.qualifier {
            None => out.push(ValueIdent {
                pkg,
                name: path.name.clone(),
                pos: path.span,
                local: locals.contains_key(&path.name),
            }),
            Some(qualifier) => {
                if let Some(&target) = program.package(pkg).imports.get(qualifier) {
                    out.push(ValueIdent {
                        pkg: target,
                        name: path.name.clone(),
                        pos: path.span,
                        local: false,
                    });
                } else {
                    out.push(ValueIdent {
                        pkg,
                        name: qualifier.clone(),
                        pos: path.span,
                        local: locals.contains_key(qualifier),
                    });
                }
            }
        },
        ExprKind::StructLit(path, inits) => {
            let target = match &path.qualifier {
                None => pkg,
                Some(qualifier) => program
                    .package(pkg)
                    .imports
                    .get(qualifier)
                    .copied()
                    .unwrap_or(pkg),
            };
            out.push(ValueIdent {
                pkg: target,
                name: path.name.clone(),
                pos: path.span,
                local: false,
            });
            for (_, init) in inits {
                collect_idents(program, pkg, locals, init, out);
            }
        }
        ExprKind::Ref(inner) => collect_idents(program, pkg, locals, inner, out),
        ExprKind::FieldAccess(receiver, _) => collect_idents(program, pkg, locals, receiver, out),
        ExprKind::Call(_, args) => {
            for arg in args {
                collect_idents(program, pkg, locals, arg, out);
            }
        }
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::TypeRef(_) => {}
    }
}
