use crate::analysis::collect::Injector;
use crate::analysis::solve::{Call, CallKind};
use crate::errors::{Diag, DiagKind};
use crate::model::Program;

/// Validates that the injector's signature admits what the plan requires,
/// and that everything the generated code would reference is visible from
/// the injector's package.
pub fn check(program: &Program, injector: &Injector, calls: &[Call]) -> Vec<Diag> {
    let mut diags = Vec::new();

    for call in calls {
        if call.has_cleanup && !injector.has_cleanup {
            diags.push(
                Diag::new(
                    DiagKind::CleanupMismatch,
                    format!(
                        "provider for {} returns cleanup but injector does not return cleanup function",
                        program.display_type(call.out)
                    ),
                )
                .at(call.pos),
            );
        }
        if call.has_err && !injector.has_err {
            diags.push(
                Diag::new(
                    DiagKind::ErrorMismatch,
                    format!(
                        "provider for {} returns error but injector not allowed to fail",
                        program.display_type(call.out)
                    ),
                )
                .at(call.pos),
            );
        }
    }

    for call in calls {
        match call.kind {
            CallKind::Value => {
                let Some(value) = &call.value else { continue };
                for ident in &value.idents {
                    if ident.local {
                        diags.push(
                            Diag::new(
                                DiagKind::Visibility,
                                format!(
                                    "{} is local to injector {} and cannot be used in generated code",
                                    ident.name, injector.name
                                ),
                            )
                            .at(ident.pos),
                        );
                    } else if !Program::is_exported(&ident.name) && ident.pkg != injector.pkg {
                        diags.push(
                            Diag::new(
                                DiagKind::Visibility,
                                format!(
                                    "{} is not exported by package {:?}",
                                    ident.name,
                                    program.package(ident.pkg).path
                                ),
                            )
                            .at(ident.pos),
                        );
                    }
                }
            }
            CallKind::Function | CallKind::StructLiteral => {
                if call.pkg != injector.pkg && !Program::is_exported(&call.name) {
                    diags.push(
                        Diag::new(
                            DiagKind::Visibility,
                            format!(
                                "{} is not exported by package {:?}",
                                call.name,
                                program.package(call.pkg).path
                            ),
                        )
                        .at(call.pos),
                    );
                }
                if call.kind == CallKind::StructLiteral {
                    for field_name in &call.field_names {
                        if call.pkg != injector.pkg && !Program::is_exported(field_name) {
                            diags.push(
                                Diag::new(
                                    DiagKind::Visibility,
                                    format!(
                                        "field {} of {} is not exported by package {:?}",
                                        field_name,
                                        program.display_type(call.out),
                                        program.package(call.pkg).path
                                    ),
                                )
                                .at(call.pos),
                            );
                        }
                    }
                }
            }
            CallKind::Field => {
                if call.pkg != injector.pkg && !Program::is_exported(&call.name) {
                    diags.push(
                        Diag::new(
                            DiagKind::Visibility,
                            format!(
                                "field {} is not exported by package {:?}",
                                call.name,
                                program.package(call.pkg).path
                            ),
                        )
                        .at(call.pos),
                    );
                }
            }
        }
    }

    diags
}
