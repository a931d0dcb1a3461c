use crate::analysis::collect::ProviderSet;
use crate::analysis::provider_map::ProviderSetSrc;
use crate::errors::{Diag, DiagKind};
use crate::model::Program;
use std::rc::Rc;

/// Confirms every declaration in the set was the source of at least one call
/// or satisfied binding during solving. Sources are matched by identity, so
/// a provider shared between sets counts only where it was actually reached.
pub fn verify_args_used(
    program: &Program,
    set: &ProviderSet,
    used: &[ProviderSetSrc],
) -> Vec<Diag> {
    let mut diags = Vec::new();

    for provider in &set.providers {
        let reached = used.iter().any(
            |src| matches!(src, ProviderSetSrc::Provider(p) if Rc::ptr_eq(p, provider)),
        );
        if !reached {
            diags.push(
                Diag::new(
                    DiagKind::UnusedDeclaration,
                    format!("unused provider {:?}", provider.name),
                )
                .at(provider.pos),
            );
        }
    }

    for binding in &set.bindings {
        let reached = used.iter().any(
            |src| matches!(src, ProviderSetSrc::Binding(b) if Rc::ptr_eq(b, binding)),
        );
        if !reached {
            diags.push(
                Diag::new(
                    DiagKind::UnusedDeclaration,
                    format!(
                        "unused interface binding to type {}",
                        program.display_type(binding.iface)
                    ),
                )
                .at(binding.pos),
            );
        }
    }

    for value in &set.values {
        let reached = used
            .iter()
            .any(|src| matches!(src, ProviderSetSrc::Value(v) if Rc::ptr_eq(v, value)));
        if !reached {
            diags.push(
                Diag::new(
                    DiagKind::UnusedDeclaration,
                    format!("unused value of type {}", program.display_type(value.out)),
                )
                .at(value.pos),
            );
        }
    }

    for field in &set.fields {
        let reached = used
            .iter()
            .any(|src| matches!(src, ProviderSetSrc::Field(f) if Rc::ptr_eq(f, field)));
        if !reached {
            diags.push(
                Diag::new(
                    DiagKind::UnusedDeclaration,
                    format!(
                        "unused field {:?} of {}",
                        field.name,
                        program.display_type(field.parent)
                    ),
                )
                .at(field.pos),
            );
        }
    }

    for import in &set.imports {
        let reached = used.iter().any(
            |src| matches!(src, ProviderSetSrc::Import(s) if Rc::ptr_eq(s, import)),
        );
        if !reached {
            let message = match &import.var_name {
                Some(name) => format!("unused provider set {:?}", name),
                None => "unused provider set".to_string(),
            };
            diags.push(Diag::new(DiagKind::UnusedDeclaration, message).at(import.pos));
        }
    }

    diags
}

#[cfg(test)]
mod test;
