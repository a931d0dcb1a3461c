pub mod collect;
pub mod cycles;
pub mod format;
pub mod postcheck;
pub mod provider_map;
pub mod solve;
pub mod usage;

pub use collect::{
    Collector, Field, Injector, InjectorArgs, InterfaceBinding, Provider, ProviderInput,
    ProviderKind, ProviderSet, Value,
};
pub use provider_map::{ProvidedKind, ProvidedType, ProviderSetSrc, TypeMap};
pub use solve::{Call, CallKind, Plan, SourceRef};
