use crate::analysis::collect::{ProviderKind, ProviderSet, Value};
use crate::analysis::provider_map::{ProvidedKind, ProviderSetSrc, TypeMap};
use crate::errors::{Diag, DiagKind};
use crate::model::{PkgId, Program, TypeId};
use crate::parser::ast::Span;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Function,
    StructLiteral,
    Value,
    Field,
}

/// Where a call input comes from: one of the injector's formal arguments, or
/// the output of a previous call in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef {
    Arg(usize),
    Call(usize),
}

/// One step of the ordered plan.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub pkg: PkgId,
    /// Function name, struct name, or extracted field name.
    pub name: String,
    pub out: TypeId,
    pub args: Vec<SourceRef>,
    /// For struct literals: the field each argument populates, parallel to `args`.
    pub field_names: Vec<String>,
    /// For value calls: the fixed expression to splice in.
    pub value: Option<Rc<Value>>,
    pub has_cleanup: bool,
    pub has_err: bool,
    pub variadic: bool,
    pub pos: Span,
}

/// A solved injector: the ordered calls, where the output value comes from,
/// and whether any call needs the cleanup or error return channel.
#[derive(Debug, Clone)]
pub struct Plan {
    pub calls: Vec<Call>,
    pub result: SourceRef,
    pub needs_cleanup: bool,
    pub needs_err: bool,
}

/// Computes the minimal topologically ordered call list that produces
/// `out` from the given injector argument types.
///
/// Returns the plan (absent when resolution failed), the declaration sources
/// it drew on (for the usage verifier), and any missing-provider
/// diagnostics.
pub fn solve(
    program: &Program,
    out: TypeId,
    given: &[TypeId],
    set: &ProviderSet,
) -> (Option<Plan>, Vec<ProviderSetSrc>, Vec<Diag>) {
    let mut solver = Solver {
        program,
        set,
        index: TypeMap::new(),
        calls: Vec::new(),
        used: Vec::new(),
        used_keys: BTreeSet::new(),
        diags: Vec::new(),
    };
    for (position, &arg) in given.iter().enumerate() {
        solver.index.set(arg, SourceRef::Arg(position));
    }
    let mut trail = Vec::new();
    let result = solver.visit(out, &mut trail);
    let plan = match result {
        Some(result) if solver.diags.is_empty() => Some(Plan {
            needs_cleanup: solver.calls.iter().any(|call| call.has_cleanup),
            needs_err: solver.calls.iter().any(|call| call.has_err),
            calls: solver.calls,
            result,
        }),
        _ => None,
    };
    (plan, solver.used, solver.diags)
}

struct Solver<'a> {
    program: &'a Program,
    set: &'a ProviderSet,
    /// Where each already-satisfied type can be read from.
    index: TypeMap<SourceRef>,
    calls: Vec<Call>,
    used: Vec<ProviderSetSrc>,
    used_keys: BTreeSet<TypeId>,
    diags: Vec<Diag>,
}

impl<'a> Solver<'a> {
    fn record_used(&mut self, ty: TypeId) {
        if self.used_keys.insert(ty) {
            if let Some(src) = self.set.src_map.at(ty) {
                self.used.push(src.clone());
            }
        }
    }

    /// The name of the provider set that contributed `ty`, for "needed by"
    /// chains: the import it came through, or the enclosing set itself.
    fn set_name_for(&self, ty: TypeId) -> Option<String> {
        match self.set.src_map.at(ty) {
            Some(ProviderSetSrc::Import(import)) => import.var_name.clone(),
            _ => self.set.var_name.clone(),
        }
    }

    fn visit(
        &mut self,
        ty: TypeId,
        trail: &mut Vec<(TypeId, Option<String>)>,
    ) -> Option<SourceRef> {
        if let Some(&satisfied) = self.index.at(ty) {
            self.record_used(ty);
            return Some(satisfied);
        }

        let Some(provided) = self.set.provider_map.at(ty).cloned() else {
            let mut diag = Diag::new(
                DiagKind::NoProvider,
                format!("no provider found for {}", self.program.display_type(ty)),
            );
            for (parent, set_name) in trail.iter().rev() {
                diag = diag.with_note(match set_name {
                    Some(name) => format!(
                        "needed by {} in provider set {:?}",
                        self.program.display_type(*parent),
                        name
                    ),
                    None => format!("needed by {}", self.program.display_type(*parent)),
                });
            }
            self.diags.push(diag);
            return None;
        };

        self.record_used(ty);
        if provided.ty != ty {
            self.record_used(provided.ty);
        }

        // An interface binding shares its concrete entry: if the concrete
        // type was already satisfied, alias instead of re-invoking.
        if let Some(&satisfied) = self.index.at(provided.ty) {
            self.index.set(ty, satisfied);
            return Some(satisfied);
        }

        match &provided.kind {
            ProvidedKind::Arg { index } => {
                let satisfied = SourceRef::Arg(*index);
                self.index.set(ty, satisfied);
                Some(satisfied)
            }
            ProvidedKind::Value(value) => {
                self.calls.push(Call {
                    kind: CallKind::Value,
                    pkg: value.pkg,
                    name: String::new(),
                    out: provided.ty,
                    args: Vec::new(),
                    field_names: Vec::new(),
                    value: Some(value.clone()),
                    has_cleanup: false,
                    has_err: false,
                    variadic: false,
                    pos: value.pos,
                });
                self.satisfy(ty, provided.ty)
            }
            ProvidedKind::Provider(provider) => {
                trail.push((ty, self.set_name_for(ty)));
                let mut args = Vec::with_capacity(provider.inputs.len());
                let mut failed = false;
                for input in &provider.inputs {
                    match self.visit(input.ty, trail) {
                        Some(satisfied) => args.push(satisfied),
                        None => failed = true,
                    }
                }
                trail.pop();
                if failed {
                    return None;
                }
                self.calls.push(Call {
                    kind: match provider.kind {
                        ProviderKind::Function => CallKind::Function,
                        ProviderKind::StructLiteral => CallKind::StructLiteral,
                    },
                    pkg: provider.pkg,
                    name: provider.name.clone(),
                    out: provided.ty,
                    args,
                    field_names: provider
                        .inputs
                        .iter()
                        .filter_map(|input| input.field.clone())
                        .collect(),
                    value: None,
                    has_cleanup: provider.has_cleanup,
                    has_err: provider.has_err,
                    variadic: provider.variadic,
                    pos: provider.pos,
                });
                self.satisfy(ty, provided.ty)
            }
            ProvidedKind::Field(field) => {
                trail.push((ty, self.set_name_for(ty)));
                let parent = self.visit(field.parent, trail);
                trail.pop();
                let parent = parent?;
                self.calls.push(Call {
                    kind: CallKind::Field,
                    pkg: field.pkg,
                    name: field.name.clone(),
                    out: provided.ty,
                    args: vec![parent],
                    field_names: Vec::new(),
                    value: None,
                    has_cleanup: false,
                    has_err: false,
                    variadic: false,
                    pos: field.pos,
                });
                self.satisfy(ty, provided.ty)
            }
        }
    }

    /// Indexes the call just pushed under both the requested key and the
    /// concrete type it satisfies.
    fn satisfy(&mut self, requested: TypeId, concrete: TypeId) -> Option<SourceRef> {
        let satisfied = SourceRef::Call(self.calls.len() - 1);
        self.index.set(concrete, satisfied);
        if requested != concrete {
            self.index.set(requested, satisfied);
        }
        Some(satisfied)
    }
}
