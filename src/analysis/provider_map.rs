use crate::analysis::collect::{Field, InterfaceBinding, Provider, ProviderSet, Value};
use crate::errors::{Diag, DiagCollector, DiagKind};
use crate::model::{Program, TypeId};
use crate::parser::ast::Span;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A type-keyed map. Keys are interned type identities, so lookup is
/// structural and iteration order is the deterministic interning order.
#[derive(Debug, Clone, Default)]
pub struct TypeMap<V> {
    entries: BTreeMap<TypeId, V>,
}

impl<V> TypeMap<V> {
    pub fn new() -> Self {
        TypeMap {
            entries: BTreeMap::new(),
        }
    }

    pub fn at(&self, ty: TypeId) -> Option<&V> {
        self.entries.get(&ty)
    }

    /// Inserts and returns the previous value, if any.
    pub fn set(&mut self, ty: TypeId, value: V) -> Option<V> {
        self.entries.insert(ty, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &V)> {
        self.entries.iter().map(|(&ty, value)| (ty, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a provider set offers for one type. Exactly one variant applies; the
/// `ty` field is the output type this entry satisfies, which for an
/// interface-binding key is the bound concrete type.
#[derive(Debug, Clone)]
pub struct ProvidedType {
    pub ty: TypeId,
    pub kind: ProvidedKind,
}

#[derive(Debug, Clone)]
pub enum ProvidedKind {
    Provider(Rc<Provider>),
    Value(Rc<Value>),
    Arg { index: usize },
    Field(Rc<Field>),
}

/// The declaration a provider-map entry came from, for diagnostics and the
/// usage verifier. Identity (`Rc` pointer equality) matters; contents are
/// only rendered into messages.
#[derive(Debug, Clone)]
pub enum ProviderSetSrc {
    Provider(Rc<Provider>),
    Binding(Rc<InterfaceBinding>),
    Value(Rc<Value>),
    Field(Rc<Field>),
    Import(Rc<ProviderSet>),
    InjectorArg { name: String, pos: Span },
}

impl ProviderSetSrc {
    pub fn description(&self, program: &Program) -> String {
        match self {
            ProviderSetSrc::Provider(p) => format!("provider {:?}", p.name),
            ProviderSetSrc::Binding(b) => {
                format!("interface binding to {}", program.display_type(b.iface))
            }
            ProviderSetSrc::Value(v) => {
                format!("value of type {}", program.display_type(v.out))
            }
            ProviderSetSrc::Field(f) => {
                format!("field {:?} of {}", f.name, program.display_type(f.parent))
            }
            ProviderSetSrc::Import(set) => match &set.var_name {
                Some(name) => format!("provider set {:?}", name),
                None => "provider set".to_string(),
            },
            ProviderSetSrc::InjectorArg { name, .. } => {
                format!("argument to injector {:?}", name)
            }
        }
    }

    pub fn pos(&self) -> Span {
        match self {
            ProviderSetSrc::Provider(p) => p.pos,
            ProviderSetSrc::Binding(b) => b.pos,
            ProviderSetSrc::Value(v) => v.pos,
            ProviderSetSrc::Field(f) => f.pos,
            ProviderSetSrc::Import(set) => set.pos,
            ProviderSetSrc::InjectorArg { pos, .. } => *pos,
        }
    }
}

/// Builds the type-to-provider and type-to-source maps for one set.
///
/// Import contents are seeded first (each import was built recursively
/// before this set), then the set's own providers, values, and field
/// extractors, then injector arguments; interface bindings resolve last so
/// they can refer to anything the set can already produce. Every collision
/// is reported with both sources.
pub fn build_provider_map(
    program: &Program,
    set: &ProviderSet,
) -> (TypeMap<ProvidedType>, TypeMap<ProviderSetSrc>, Vec<Diag>) {
    let mut provider_map = TypeMap::new();
    let mut src_map = TypeMap::new();
    let mut diags = DiagCollector::new();

    let mut insert =
        |provider_map: &mut TypeMap<ProvidedType>,
         src_map: &mut TypeMap<ProviderSetSrc>,
         diags: &mut DiagCollector,
         ty: TypeId,
         provided: ProvidedType,
         src: ProviderSetSrc| {
            if let Some(previous) = src_map.at(ty) {
                diags.add(binding_conflict(program, ty, set, &src, previous));
                return;
            }
            provider_map.set(ty, provided);
            src_map.set(ty, src);
        };

    for import in &set.imports {
        for (ty, provided) in import.provider_map.iter() {
            insert(
                &mut provider_map,
                &mut src_map,
                &mut diags,
                ty,
                provided.clone(),
                ProviderSetSrc::Import(import.clone()),
            );
        }
    }

    for provider in &set.providers {
        insert(
            &mut provider_map,
            &mut src_map,
            &mut diags,
            provider.out,
            ProvidedType {
                ty: provider.out,
                kind: ProvidedKind::Provider(provider.clone()),
            },
            ProviderSetSrc::Provider(provider.clone()),
        );
    }

    for value in &set.values {
        insert(
            &mut provider_map,
            &mut src_map,
            &mut diags,
            value.out,
            ProvidedType {
                ty: value.out,
                kind: ProvidedKind::Value(value.clone()),
            },
            ProviderSetSrc::Value(value.clone()),
        );
    }

    for field in &set.fields {
        insert(
            &mut provider_map,
            &mut src_map,
            &mut diags,
            field.out,
            ProvidedType {
                ty: field.out,
                kind: ProvidedKind::Field(field.clone()),
            },
            ProviderSetSrc::Field(field.clone()),
        );
    }

    if let Some(args) = &set.injector_args {
        for (index, &ty) in args.args.iter().enumerate() {
            insert(
                &mut provider_map,
                &mut src_map,
                &mut diags,
                ty,
                ProvidedType {
                    ty,
                    kind: ProvidedKind::Arg { index },
                },
                ProviderSetSrc::InjectorArg {
                    name: args.name.clone(),
                    pos: args.pos,
                },
            );
        }
    }

    for binding in &set.bindings {
        let Some(concrete) = provider_map.at(binding.provided).cloned() else {
            diags.add(
                Diag::new(
                    DiagKind::NoProvider,
                    format!(
                        "interface binding to {}: set does not include a provider for the concrete type {}",
                        program.display_type(binding.iface),
                        program.display_type(binding.provided)
                    ),
                )
                .at(binding.pos),
            );
            continue;
        };
        insert(
            &mut provider_map,
            &mut src_map,
            &mut diags,
            binding.iface,
            concrete,
            ProviderSetSrc::Binding(binding.clone()),
        );
    }

    (provider_map, src_map, diags.into_diags())
}

/// A conflict names the offending type and quotes both sources, each located
/// by position. The enclosing set's name is mentioned when it has one.
fn binding_conflict(
    program: &Program,
    ty: TypeId,
    set: &ProviderSet,
    current: &ProviderSetSrc,
    previous: &ProviderSetSrc,
) -> Diag {
    let mut message = format!("multiple bindings for {}", program.display_type(ty));
    if let Some(name) = &set.var_name {
        message.push_str(&format!(" in provider set {:?}", name));
    }
    Diag::new(DiagKind::MultipleBindings, message)
        .at(current.pos())
        .with_label(
            current.pos(),
            format!("current: {}", current.description(program)),
        )
        .with_label(
            previous.pos(),
            format!("previous: {}", previous.description(program)),
        )
}
