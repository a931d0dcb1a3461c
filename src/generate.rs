//! Orchestrates the analysis pipeline per injector: collect, build the
//! provider map, verify acyclicity, solve, verify usage, post-solve checks,
//! then emission. Later phases run only when the earlier ones succeeded, so
//! the user fixes reported problems before seeing follow-on errors.

use crate::analysis::collect::{Collector, Injector};
use crate::analysis::postcheck;
use crate::analysis::solve::{Plan, solve};
use crate::analysis::usage::verify_args_used;
use crate::emit::emit_package;
use crate::errors::{Diag, DiagCollector, note_position_all};
use crate::model::{PkgId, Program, TypeId};
use std::collections::HashSet;
use tracing::debug;

/// One generated file: the package it belongs to and its full contents. The
/// driver decides where it lands on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub pkg: PkgId,
    pub file_name: String,
    pub content: String,
}

/// Runs the pipeline over every injector in the program. Returns the
/// generated files (one per package that declares injectors) and the full
/// diagnostic list; a package with any failed injector produces no file.
pub fn generate(program: &mut Program) -> (Vec<GeneratedFile>, Vec<Diag>) {
    let mut diags = DiagCollector::new();

    let mut collector = Collector::new(program);
    let injectors = collector.collect_injectors();
    diags.extend(collector.into_diags());

    let mut solved: Vec<(Injector, Plan)> = Vec::new();
    let mut failed_pkgs: HashSet<PkgId> = HashSet::new();
    for injector in injectors {
        debug!(injector = %injector.name, "solving injector");
        let given: Vec<TypeId> = injector.params.iter().map(|(_, ty)| *ty).collect();
        let (plan, used, errors) = solve(program, injector.out, &given, &injector.set);
        if !errors.is_empty() {
            diags.extend(note_position_all(injector.pos, errors));
            failed_pkgs.insert(injector.pkg);
            continue;
        }
        let Some(plan) = plan else {
            failed_pkgs.insert(injector.pkg);
            continue;
        };

        let usage_errors = verify_args_used(program, &injector.set, &used);
        let post_errors = postcheck::check(program, &injector, &plan.calls);
        if !usage_errors.is_empty() || !post_errors.is_empty() {
            diags.extend(note_position_all(injector.pos, usage_errors));
            diags.extend(note_position_all(injector.pos, post_errors));
            failed_pkgs.insert(injector.pkg);
            continue;
        }

        debug!(injector = %injector.name, calls = plan.calls.len(), "solved");
        solved.push((injector, plan));
    }

    let mut files = Vec::new();
    let mut emitted: Vec<PkgId> = Vec::new();
    for (injector, _) in &solved {
        if !emitted.contains(&injector.pkg) {
            emitted.push(injector.pkg);
        }
    }
    for pkg in emitted {
        if failed_pkgs.contains(&pkg) {
            continue;
        }
        let package_solved: Vec<(&Injector, &Plan)> = solved
            .iter()
            .filter(|(injector, _)| injector.pkg == pkg)
            .map(|(injector, plan)| (injector, plan))
            .collect();
        let content = emit_package(program, pkg, &package_solved);
        files.push(GeneratedFile {
            pkg,
            file_name: format!("{}_gen.weft", program.package(pkg).name),
            content,
        });
    }

    (files, diags.into_diags())
}
