use crate::analysis::cycles::verify_acyclic;
use crate::analysis::provider_map::{TypeMap, build_provider_map};
use crate::errors::{Diag, DiagCollector, DiagKind};
use crate::model::build::{ValueIdent, expr_has_call, expr_idents, resolve_type_expr, type_of_expr};
use crate::model::{ObjectKind, PkgId, Program, RetSig, TypeId};
use crate::parser::ast::{Expr, ExprKind, Span, Stmt};
use phf_macros::phf_map;
use std::collections::HashMap;
use std::rc::Rc;

/// The declarative constructs the collector recognizes. Everything else in
/// the surface syntax is opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Set,
    Build,
    Bind,
    Value,
    InterfaceValue,
    Struct,
    FieldsOf,
}

static MARKERS: phf::Map<&'static str, Marker> = phf_map! {
    "Set" => Marker::Set,
    "Build" => Marker::Build,
    "Bind" => Marker::Bind,
    "Value" => Marker::Value,
    "InterfaceValue" => Marker::InterfaceValue,
    "Struct" => Marker::Struct,
    "FieldsOf" => Marker::FieldsOf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Function,
    StructLiteral,
}

#[derive(Debug, Clone)]
pub struct ProviderInput {
    pub ty: TypeId,
    /// Set for struct-literal providers: the field this input populates.
    pub field: Option<String>,
}

/// A way to produce one output type from zero or more typed inputs.
#[derive(Debug)]
pub struct Provider {
    pub kind: ProviderKind,
    pub pkg: PkgId,
    pub name: String,
    pub pos: Span,
    pub inputs: Vec<ProviderInput>,
    pub out: TypeId,
    pub has_cleanup: bool,
    pub has_err: bool,
    /// The final input is a variable-length sequence; its entry in `inputs`
    /// holds the element type, which is resolved once.
    pub variadic: bool,
}

/// Asserts that requests for `iface` are satisfied by `provided`.
#[derive(Debug)]
pub struct InterfaceBinding {
    pub iface: TypeId,
    pub provided: TypeId,
    pub pos: Span,
}

/// A fixed expression usable as a provider with no inputs.
#[derive(Debug)]
pub struct Value {
    pub out: TypeId,
    pub expr: Expr,
    /// The package the expression was written in.
    pub pkg: PkgId,
    pub pos: Span,
    pub idents: Vec<ValueIdent>,
}

/// Extracts one field of a struct, as a provider taking the struct as input.
#[derive(Debug)]
pub struct Field {
    pub parent: TypeId,
    pub name: String,
    pub pkg: PkgId,
    pub out: TypeId,
    pub pos: Span,
}

#[derive(Debug, Clone)]
pub struct InjectorArgs {
    /// The injector's function name, used in conflict messages.
    pub name: String,
    pub args: Vec<TypeId>,
    pub pos: Span,
}

/// The flat aggregation of declarations an injector draws from. Frozen once
/// `provider_map` and `src_map` are populated.
#[derive(Debug)]
pub struct ProviderSet {
    pub pos: Span,
    pub pkg: PkgId,
    pub var_name: Option<String>,
    pub providers: Vec<Rc<Provider>>,
    pub bindings: Vec<Rc<InterfaceBinding>>,
    pub values: Vec<Rc<Value>>,
    pub fields: Vec<Rc<Field>>,
    pub imports: Vec<Rc<ProviderSet>>,
    pub injector_args: Option<InjectorArgs>,
    pub provider_map: TypeMap<crate::analysis::provider_map::ProvidedType>,
    pub src_map: TypeMap<crate::analysis::provider_map::ProviderSetSrc>,
}

/// An injector stub: a function whose body names the provider set that
/// resolves its output.
#[derive(Debug)]
pub struct Injector {
    pub name: String,
    pub pkg: PkgId,
    pub pos: Span,
    pub params: Vec<(String, TypeId)>,
    pub out: TypeId,
    pub has_cleanup: bool,
    pub has_err: bool,
    pub set: Rc<ProviderSet>,
}

/// The validated return shape shared by provider functions and injectors.
pub struct OutputSignature {
    pub out: TypeId,
    pub has_cleanup: bool,
    pub has_err: bool,
}

/// Validates a function's return list: the provided type first, then an
/// optional cleanup, then an optional error. Returns the offending message
/// and position on violation; the caller picks the diagnostic kind.
pub fn func_output(name: &str, rets: &[RetSig], pos: Span) -> Result<OutputSignature, (String, Span)> {
    if rets.is_empty() {
        return Err((format!("{} has no return values", name), pos));
    }
    if rets.len() > 3 {
        let span = match &rets[3] {
            RetSig::Type(_, span) | RetSig::Cleanup(span) | RetSig::Error(span) => *span,
        };
        return Err((format!("{} has too many return values", name), span));
    }
    let out = match &rets[0] {
        RetSig::Type(ty, _) => *ty,
        RetSig::Cleanup(span) | RetSig::Error(span) => {
            return Err((
                format!("first return value of {} must be the provided type", name),
                *span,
            ));
        }
    };
    let mut has_cleanup = false;
    let mut has_err = false;
    if rets.len() == 2 {
        match &rets[1] {
            RetSig::Cleanup(_) => has_cleanup = true,
            RetSig::Error(_) => has_err = true,
            RetSig::Type(_, span) => {
                return Err((
                    format!("second return value of {} must be cleanup or error", name),
                    *span,
                ));
            }
        }
    } else if rets.len() == 3 {
        match &rets[1] {
            RetSig::Cleanup(_) => has_cleanup = true,
            RetSig::Error(span) | RetSig::Type(_, span) => {
                return Err((
                    format!(
                        "second return value of {} must be cleanup when three values are returned",
                        name
                    ),
                    *span,
                ));
            }
        }
        match &rets[2] {
            RetSig::Error(_) => has_err = true,
            RetSig::Cleanup(span) | RetSig::Type(_, span) => {
                return Err((format!("third return value of {} must be error", name), *span));
            }
        }
    }
    Ok(OutputSignature {
        out,
        has_cleanup,
        has_err,
    })
}

/// Normalizes user declarations into provider sets and injectors. Errors are
/// accumulated; collection continues so the user sees every problem at once.
pub struct Collector<'p> {
    program: &'p mut Program,
    diags: DiagCollector,
    set_cache: HashMap<(PkgId, String), Option<Rc<ProviderSet>>>,
    provider_cache: HashMap<(PkgId, String), Option<Rc<Provider>>>,
    building: Vec<(PkgId, String)>,
}

impl<'p> Collector<'p> {
    pub fn new(program: &'p mut Program) -> Self {
        Collector {
            program,
            diags: DiagCollector::new(),
            set_cache: HashMap::new(),
            provider_cache: HashMap::new(),
            building: Vec::new(),
        }
    }

    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn into_diags(self) -> Vec<Diag> {
        self.diags.into_diags()
    }

    /// Finds every injector in the program, in declaration order. Injectors
    /// whose set or signature failed to collect are omitted; their errors are
    /// in the collector.
    pub fn collect_injectors(&mut self) -> Vec<Injector> {
        let mut injectors = Vec::new();
        for pkg_index in 0..self.program.packages.len() {
            let pkg = PkgId(pkg_index);
            let candidates: Vec<String> = self
                .program
                .package(pkg)
                .objects
                .iter()
                .filter(|object| {
                    matches!(&object.kind, ObjectKind::Func(sig) if sig.body.is_some())
                })
                .map(|object| object.name.clone())
                .collect();
            for name in candidates {
                if let Some(injector) = self.collect_injector(pkg, &name) {
                    injectors.push(injector);
                }
            }
        }
        injectors
    }

    fn collect_injector(&mut self, pkg: PkgId, name: &str) -> Option<Injector> {
        let object = self.program.package(pkg).object(name)?;
        let pos = object.pos;
        let ObjectKind::Func(sig) = object.kind.clone() else {
            return None;
        };
        let body = sig.body.clone()?;

        let build_call = self.single_build_call(name, &body, pos)?;

        let output = match func_output(name, &sig.rets, pos) {
            Ok(output) => output,
            Err((message, span)) => {
                self.diags
                    .add(Diag::new(DiagKind::InvalidInjector, message).at(span));
                return None;
            }
        };
        if sig.variadic {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidInjector,
                    format!("injector {} may not be variadic", name),
                )
                .at(pos),
            );
            return None;
        }

        let args = InjectorArgs {
            name: name.to_string(),
            args: sig.params.iter().map(|(_, ty)| *ty).collect(),
            pos,
        };
        let locals: HashMap<String, TypeId> = sig.params.iter().cloned().collect();

        let ExprKind::Call(_, items) = &build_call.kind else {
            return None;
        };
        let set = self.collect_set(
            pkg,
            items.clone(),
            build_call.span,
            None,
            Some(args),
            &locals,
        )?;

        Some(Injector {
            name: name.to_string(),
            pkg,
            pos,
            params: sig.params.clone(),
            out: output.out,
            has_cleanup: output.has_cleanup,
            has_err: output.has_err,
            set,
        })
    }

    /// An injector body consists of exactly one `Build(...)` call statement
    /// followed by an optional bare return.
    fn single_build_call(&mut self, name: &str, body: &[Stmt], pos: Span) -> Option<Expr> {
        let is_build = |stmt: &Stmt| {
            matches!(
                stmt,
                Stmt::Expr(Expr { kind: ExprKind::Call(path, _), .. })
                    if path.qualifier.is_none() && MARKERS.get(path.name.as_str()) == Some(&Marker::Build)
            )
        };
        let build = body.iter().find(|stmt| is_build(stmt));
        let Some(Stmt::Expr(build_expr)) = build else {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidInjector,
                    format!("injector {} must contain a Build call", name),
                )
                .at(pos),
            );
            return None;
        };
        let mut ok = true;
        for (index, stmt) in body.iter().enumerate() {
            let valid = match stmt {
                stmt if is_build(stmt) => index == 0,
                Stmt::Return(_) => index == body.len() - 1,
                _ => false,
            };
            if !valid {
                self.diags.add(
                    Diag::new(
                        DiagKind::InvalidInjector,
                        format!(
                            "injector {} must consist of a single Build call and an optional return",
                            name
                        ),
                    )
                    .at(stmt.span()),
                );
                ok = false;
            }
        }
        ok.then(|| build_expr.clone())
    }

    /// Resolves a named `let X = Set(...)` declaration, with caching. Returns
    /// `None` when the declaration produced errors (already collected).
    fn named_set(&mut self, pkg: PkgId, name: &str, use_pos: Span) -> Option<Rc<ProviderSet>> {
        let key = (pkg, name.to_string());
        if let Some(cached) = self.set_cache.get(&key) {
            return cached.clone();
        }
        if self.building.contains(&key) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!("provider set {} includes itself", name),
                )
                .at(use_pos),
            );
            return None;
        }

        let object = self.program.package(pkg).object(name)?;
        let pos = object.pos;
        let ObjectKind::Set(info) = object.kind.clone() else {
            return None;
        };
        let ExprKind::Call(path, items) = &info.value.kind else {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!("{} is not a provider set: must be a Set(...) call", name),
                )
                .at(pos),
            );
            self.set_cache.insert(key, None);
            return None;
        };
        if path.qualifier.is_some() || MARKERS.get(path.name.as_str()) != Some(&Marker::Set) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!("{} is not a provider set: must be a Set(...) call", name),
                )
                .at(pos),
            );
            self.set_cache.insert(key, None);
            return None;
        }

        self.building.push(key.clone());
        let set = self.collect_set(
            pkg,
            items.clone(),
            pos,
            Some(name.to_string()),
            None,
            &HashMap::new(),
        );
        self.building.pop();
        self.set_cache.insert(key, set.clone());
        set
    }

    /// Collects the items of one `Set(...)` or `Build(...)` call into a
    /// provider set, builds its maps, and verifies it acyclic. Returns `None`
    /// when any error was produced while building it.
    fn collect_set(
        &mut self,
        pkg: PkgId,
        items: Vec<Expr>,
        pos: Span,
        var_name: Option<String>,
        injector_args: Option<InjectorArgs>,
        locals: &HashMap<String, TypeId>,
    ) -> Option<Rc<ProviderSet>> {
        let before = self.diags.len();
        let mut set = ProviderSet {
            pos,
            pkg,
            var_name,
            providers: Vec::new(),
            bindings: Vec::new(),
            values: Vec::new(),
            fields: Vec::new(),
            imports: Vec::new(),
            injector_args,
            provider_map: TypeMap::new(),
            src_map: TypeMap::new(),
        };
        let mut ok = true;
        for item in &items {
            ok &= self.add_item(&mut set, pkg, item, locals);
        }
        if !ok || self.diags.len() != before {
            return None;
        }

        let (provider_map, src_map, errors) = build_provider_map(self.program, &set);
        set.provider_map = provider_map;
        set.src_map = src_map;
        if !errors.is_empty() {
            self.diags.extend(errors);
            return None;
        }

        let cycle_errors = verify_acyclic(self.program, &set.provider_map);
        if !cycle_errors.is_empty() {
            self.diags.extend(cycle_errors);
            return None;
        }

        Some(Rc::new(set))
    }

    /// Adds one `Set`/`Build` item to the set under construction. Returns
    /// false when the item could not be used, including when it names a
    /// declaration whose own errors were already reported.
    fn add_item(
        &mut self,
        set: &mut ProviderSet,
        pkg: PkgId,
        item: &Expr,
        locals: &HashMap<String, TypeId>,
    ) -> bool {
        match &item.kind {
            ExprKind::Call(path, args) if path.qualifier.is_none() => {
                match MARKERS.get(path.name.as_str()) {
                    Some(Marker::Set) => {
                        match self.collect_set(pkg, args.clone(), item.span, None, None, locals) {
                            Some(nested) => {
                                set.imports.push(nested);
                                true
                            }
                            None => false,
                        }
                    }
                    Some(Marker::Build) => {
                        self.diags.add(
                            Diag::new(
                                DiagKind::InvalidArgument,
                                "Build may only appear as an injector body",
                            )
                            .at(item.span),
                        );
                        false
                    }
                    Some(Marker::Bind) => match self.bind(pkg, args, item.span) {
                        Some(binding) => {
                            set.bindings.push(Rc::new(binding));
                            true
                        }
                        None => false,
                    },
                    Some(Marker::Value) => match self.value(pkg, args, item.span, locals) {
                        Some(value) => {
                            set.values.push(Rc::new(value));
                            true
                        }
                        None => false,
                    },
                    Some(Marker::InterfaceValue) => {
                        match self.interface_value(pkg, args, item.span, locals) {
                            Some(value) => {
                                set.values.push(Rc::new(value));
                                true
                            }
                            None => false,
                        }
                    }
                    Some(Marker::Struct) => match self.struct_provider(pkg, args, item.span) {
                        Some(provider) => {
                            set.providers.push(Rc::new(provider));
                            true
                        }
                        None => false,
                    },
                    Some(Marker::FieldsOf) => {
                        let fields = self.fields_of(pkg, args, item.span);
                        if fields.is_empty() {
                            return false;
                        }
                        for field in fields {
                            set.fields.push(Rc::new(field));
                        }
                        true
                    }
                    None => {
                        self.diags.add(
                            Diag::new(
                                DiagKind::InvalidArgument,
                                format!("{} is not a provider set marker", path),
                            )
                            .at(item.span),
                        );
                        false
                    }
                }
            }
            ExprKind::Path(path) => {
                let target = match &path.qualifier {
                    None => Some(pkg),
                    Some(alias) => self.program.package(pkg).imports.get(alias).copied(),
                };
                let Some(target) = target else {
                    self.diags.add(
                        Diag::new(
                            DiagKind::Resolve,
                            format!(
                                "undefined package {}",
                                path.qualifier.as_deref().unwrap_or("")
                            ),
                        )
                        .at(item.span),
                    );
                    return false;
                };
                let Some(object) = self.program.package(target).object(&path.name) else {
                    self.diags.add(
                        Diag::new(DiagKind::Resolve, format!("undefined name {}", path))
                            .at(item.span),
                    );
                    return false;
                };
                match &object.kind {
                    ObjectKind::Func(_) => {
                        match self.func_provider(target, &path.name, item.span) {
                            Some(provider) => {
                                set.providers.push(provider);
                                true
                            }
                            None => false,
                        }
                    }
                    ObjectKind::Set(_) => match self.named_set(target, &path.name, item.span) {
                        Some(imported) => {
                            set.imports.push(imported);
                            true
                        }
                        None => false,
                    },
                    ObjectKind::Const(_) | ObjectKind::TypeName(_) => {
                        self.diags.add(
                            Diag::new(
                                DiagKind::InvalidArgument,
                                format!("{} is not a provider or provider set", path),
                            )
                            .at(item.span),
                        );
                        false
                    }
                }
            }
            _ => {
                self.diags.add(
                    Diag::new(
                        DiagKind::InvalidArgument,
                        "expression is not a valid provider set item",
                    )
                    .at(item.span),
                );
                false
            }
        }
    }

    /// Builds (and caches) a provider from a bodiless function declaration.
    fn func_provider(&mut self, pkg: PkgId, name: &str, use_pos: Span) -> Option<Rc<Provider>> {
        let key = (pkg, name.to_string());
        if let Some(cached) = self.provider_cache.get(&key) {
            return cached.clone();
        }

        let object = self.program.package(pkg).object(name)?;
        let pos = object.pos;
        let ObjectKind::Func(sig) = object.kind.clone() else {
            return None;
        };
        if sig.body.is_some() {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!("{} is an injector and cannot be used as a provider", name),
                )
                .at(use_pos),
            );
            self.provider_cache.insert(key, None);
            return None;
        }

        let output = match func_output(name, &sig.rets, pos) {
            Ok(output) => output,
            Err((message, span)) => {
                self.diags
                    .add(Diag::new(DiagKind::BadProviderSignature, message).at(span));
                self.provider_cache.insert(key, None);
                return None;
            }
        };

        let mut ok = true;
        for (index, (_, ty)) in sig.params.iter().enumerate() {
            if sig.params[..index].iter().any(|(_, prev)| prev == ty) {
                self.diags.add(
                    Diag::new(
                        DiagKind::BadProviderSignature,
                        format!(
                            "{} has multiple parameters of type {}",
                            name,
                            self.program.display_type(*ty)
                        ),
                    )
                    .at(pos),
                );
                ok = false;
            }
        }
        if !ok {
            self.provider_cache.insert(key, None);
            return None;
        }

        let provider = Rc::new(Provider {
            kind: ProviderKind::Function,
            pkg,
            name: name.to_string(),
            pos,
            inputs: sig
                .params
                .iter()
                .map(|(_, ty)| ProviderInput {
                    ty: *ty,
                    field: None,
                })
                .collect(),
            out: output.out,
            has_cleanup: output.has_cleanup,
            has_err: output.has_err,
            variadic: sig.variadic,
        });
        self.provider_cache.insert(key, Some(provider.clone()));
        Some(provider)
    }

    /// `Bind(*Iface, *Concrete | **Concrete)`: the first argument is a
    /// pointer to the interface; the second is the provided type itself,
    /// which must be pointer-shaped.
    fn bind(&mut self, pkg: PkgId, args: &[Expr], span: Span) -> Option<InterfaceBinding> {
        if args.len() != 2 {
            self.diags.add(
                Diag::new(DiagKind::InvalidArgument, "Bind expects exactly two arguments").at(span),
            );
            return None;
        }
        let iface_ptr = self.type_ref(pkg, &args[0], "Bind")?;
        let Some(iface) = self.program.types.pointee(iface_ptr) else {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "first argument to Bind must be a pointer to an interface type",
                )
                .at(args[0].span),
            );
            return None;
        };
        if !self.program.is_interface(iface) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!(
                        "first argument to Bind must be a pointer to an interface type; {} is not an interface",
                        self.program.display_type(iface)
                    ),
                )
                .at(args[0].span),
            );
            return None;
        }

        let provided = self.type_ref(pkg, &args[1], "Bind")?;
        let pointee = self.program.types.pointee(provided);
        let shape_ok = match pointee {
            // *T or **T, nothing deeper.
            Some(inner) => self.program.types.pointee(inner).is_none_or(|innermost| {
                self.program.types.pointee(innermost).is_none()
            }),
            None => false,
        };
        if !shape_ok {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "second argument to Bind must be a pointer or a pointer to a pointer",
                )
                .at(args[1].span),
            );
            return None;
        }

        if provided == iface || pointee == Some(iface) {
            self.diags.add(
                Diag::new(
                    DiagKind::IncompatibleBinding,
                    format!(
                        "cannot bind interface {} to itself",
                        self.program.display_type(iface)
                    ),
                )
                .at(span),
            );
            return None;
        }
        if !self.program.implements(provided, iface) {
            self.diags.add(
                Diag::new(
                    DiagKind::IncompatibleBinding,
                    format!(
                        "{} does not implement {}",
                        self.program.display_type(provided),
                        self.program.display_type(iface)
                    ),
                )
                .at(span),
            );
            return None;
        }

        Some(InterfaceBinding {
            iface,
            provided,
            pos: span,
        })
    }

    fn value(
        &mut self,
        pkg: PkgId,
        args: &[Expr],
        span: Span,
        locals: &HashMap<String, TypeId>,
    ) -> Option<Value> {
        if args.len() != 1 {
            self.diags.add(
                Diag::new(DiagKind::InvalidArgument, "Value expects exactly one argument").at(span),
            );
            return None;
        }
        let expr = &args[0];
        if matches!(expr.kind, ExprKind::TypeRef(_)) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "argument to Value must be an expression, not a type",
                )
                .at(expr.span),
            );
            return None;
        }
        if expr_has_call(expr) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "argument to Value may not contain function calls",
                )
                .at(expr.span),
            );
            return None;
        }
        let out = match type_of_expr(self.program, pkg, locals, expr) {
            Ok(ty) => ty,
            Err(diag) => {
                self.diags.add(diag);
                return None;
            }
        };
        if self.program.is_interface(out) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!(
                        "argument to Value is an interface value of type {}; use InterfaceValue instead",
                        self.program.display_type(out)
                    ),
                )
                .at(expr.span),
            );
            return None;
        }
        let idents = expr_idents(self.program, pkg, locals, expr);
        Some(Value {
            out,
            expr: expr.clone(),
            pkg,
            pos: span,
            idents,
        })
    }

    fn interface_value(
        &mut self,
        pkg: PkgId,
        args: &[Expr],
        span: Span,
        locals: &HashMap<String, TypeId>,
    ) -> Option<Value> {
        if args.len() != 2 {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "InterfaceValue expects exactly two arguments",
                )
                .at(span),
            );
            return None;
        }
        let iface_ptr = self.type_ref(pkg, &args[0], "InterfaceValue")?;
        let iface = match self.program.types.pointee(iface_ptr) {
            Some(iface) if self.program.is_interface(iface) => iface,
            _ => {
                self.diags.add(
                    Diag::new(
                        DiagKind::InvalidArgument,
                        "first argument to InterfaceValue must be a pointer to an interface type",
                    )
                    .at(args[0].span),
                );
                return None;
            }
        };

        let expr = &args[1];
        if expr_has_call(expr) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "argument to InterfaceValue may not contain function calls",
                )
                .at(expr.span),
            );
            return None;
        }
        let concrete = match type_of_expr(self.program, pkg, locals, expr) {
            Ok(ty) => ty,
            Err(diag) => {
                self.diags.add(diag);
                return None;
            }
        };
        if self.program.is_interface(concrete) {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    "second argument to InterfaceValue must have a concrete type",
                )
                .at(expr.span),
            );
            return None;
        }
        if !self.program.implements(concrete, iface) {
            self.diags.add(
                Diag::new(
                    DiagKind::IncompatibleBinding,
                    format!(
                        "{} does not implement {}",
                        self.program.display_type(concrete),
                        self.program.display_type(iface)
                    ),
                )
                .at(expr.span),
            );
            return None;
        }
        let idents = expr_idents(self.program, pkg, locals, expr);
        Some(Value {
            out: iface,
            expr: expr.clone(),
            pkg,
            pos: span,
            idents,
        })
    }

    /// `Struct(*S | **S, names... | "*")`: a struct-literal provider whose
    /// inputs are the selected fields in declaration order.
    fn struct_provider(&mut self, pkg: PkgId, args: &[Expr], span: Span) -> Option<Provider> {
        let (struct_ty, out) = self.struct_arg(pkg, args.first(), span, "Struct")?;
        let fields = self.selected_fields(struct_ty, &args[1..], "Struct", span)?;
        let struct_pkg = self.program.package_of_named(struct_ty).unwrap_or(pkg);
        let name = self
            .program
            .name_of_named(struct_ty)
            .unwrap_or_default()
            .to_string();
        Some(Provider {
            kind: ProviderKind::StructLiteral,
            pkg: struct_pkg,
            name,
            pos: span,
            inputs: fields
                .iter()
                .map(|field| ProviderInput {
                    ty: field.ty,
                    field: Some(field.name.clone()),
                })
                .collect(),
            out,
            has_cleanup: false,
            has_err: false,
            variadic: false,
        })
    }

    /// `FieldsOf(*S | **S, names... | "*")`: one field extractor per selected
    /// field.
    fn fields_of(&mut self, pkg: PkgId, args: &[Expr], span: Span) -> Vec<Field> {
        let Some((struct_ty, parent)) = self.struct_arg(pkg, args.first(), span, "FieldsOf") else {
            return Vec::new();
        };
        let Some(fields) = self.selected_fields(struct_ty, &args[1..], "FieldsOf", span) else {
            return Vec::new();
        };
        let struct_pkg = self.program.package_of_named(struct_ty).unwrap_or(pkg);
        fields
            .into_iter()
            .map(|field| Field {
                parent,
                name: field.name,
                pkg: struct_pkg,
                out: field.ty,
                pos: span,
            })
            .collect()
    }

    /// Resolves the first argument of `Struct`/`FieldsOf`: a pointer to a
    /// declared struct, or a double pointer. Returns the struct's named type
    /// and the provided/parent type (`S` for `*S`, `*S` for `**S`).
    fn struct_arg(
        &mut self,
        pkg: PkgId,
        arg: Option<&Expr>,
        span: Span,
        marker: &str,
    ) -> Option<(TypeId, TypeId)> {
        let Some(arg) = arg else {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!("{} must be given a pointer to a struct type", marker),
                )
                .at(span),
            );
            return None;
        };
        let ptr = self.type_ref(pkg, arg, marker)?;
        let subject = self.program.types.pointee(ptr);
        let resolved = subject.map(|subject| match self.program.types.pointee(subject) {
            // **S names *S; *S names S itself.
            Some(inner) => (inner, subject),
            None => (subject, subject),
        });
        match resolved {
            Some((struct_ty, provided)) if self.program.is_struct(struct_ty) => {
                Some((struct_ty, provided))
            }
            _ => {
                self.diags.add(
                    Diag::new(
                        DiagKind::InvalidArgument,
                        format!(
                            "first argument to {} must be a pointer to a struct type",
                            marker
                        ),
                    )
                    .at(arg.span),
                );
                None
            }
        }
    }

    /// Interprets the field-name arguments of `Struct`/`FieldsOf`.
    fn selected_fields(
        &mut self,
        struct_ty: TypeId,
        names: &[Expr],
        marker: &str,
        span: Span,
    ) -> Option<Vec<crate::model::StructField>> {
        if names.is_empty() {
            self.diags.add(
                Diag::new(
                    DiagKind::InvalidArgument,
                    format!("{} expects field names or \"*\"", marker),
                )
                .at(span),
            );
            return None;
        }
        let mut literals = Vec::with_capacity(names.len());
        for name in names {
            match &name.kind {
                ExprKind::StringLit(value) => literals.push((value.clone(), name.span)),
                _ => {
                    self.diags.add(
                        Diag::new(
                            DiagKind::InvalidArgument,
                            format!("field name in {} must be a string literal", marker),
                        )
                        .at(name.span),
                    );
                    return None;
                }
            }
        }

        let all_fields = self.program.struct_fields(struct_ty)?.to_vec();
        let has_wildcard = literals.iter().any(|(value, _)| value == "*");
        if has_wildcard {
            if literals.len() > 1 {
                self.diags.add(
                    Diag::new(
                        DiagKind::InvalidArgument,
                        format!("cannot mix \"*\" with named fields in {}", marker),
                    )
                    .at(span),
                );
                return None;
            }
            return Some(
                all_fields
                    .into_iter()
                    .filter(|field| !field.prevented)
                    .collect(),
            );
        }

        let mut selected = Vec::with_capacity(literals.len());
        let mut ok = true;
        for (value, pos) in &literals {
            match all_fields.iter().find(|field| &field.name == value) {
                None => {
                    self.diags.add(
                        Diag::new(
                            DiagKind::InvalidArgument,
                            format!(
                                "{} is not a field of {}",
                                value,
                                self.program.display_type(struct_ty)
                            ),
                        )
                        .at(*pos),
                    );
                    ok = false;
                }
                Some(field) if field.prevented => {
                    self.diags.add(
                        Diag::new(
                            DiagKind::InvalidArgument,
                            format!(
                                "field {} of {} is marked as prevented",
                                value,
                                self.program.display_type(struct_ty)
                            ),
                        )
                        .at(*pos),
                    );
                    ok = false;
                }
                Some(field) => selected.push(field.clone()),
            }
        }
        ok.then_some(selected)
    }

    /// Expects a pointer-shaped type expression argument and interns it.
    fn type_ref(&mut self, pkg: PkgId, arg: &Expr, marker: &str) -> Option<TypeId> {
        match &arg.kind {
            ExprKind::TypeRef(texpr) => match resolve_type_expr(self.program, pkg, texpr) {
                Ok(ty) => Some(ty),
                Err(diag) => {
                    self.diags.add(diag);
                    None
                }
            },
            _ => {
                self.diags.add(
                    Diag::new(
                        DiagKind::InvalidArgument,
                        format!("argument to {} must be a pointer type expression", marker),
                    )
                    .at(arg.span),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod test;
