//! Golden-file corpus: each case under `testdata/` holds a `src/` directory
//! of `.weft` packages plus either `want_gen.weft` (the exact generated
//! file) or `want_errors.txt` (lines that must appear in the rendered
//! diagnostics).

use std::fs;
use std::path::PathBuf;
use vfs::{PhysicalFS, VfsPath};
use weft::driver::load_dir;
use weft::generate::generate;
use weft::model::build::build_program;

fn case_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn run_case(name: &str) {
    let dir = case_dir(name);
    let root: VfsPath = PhysicalFS::new(dir.join("src")).into();
    let target = load_dir(&root).expect("load failure");
    assert!(
        target.diags.is_empty(),
        "unexpected load diagnostics: {:?}",
        target.diags
    );

    let (mut program, model_diags) = build_program(&target.files);
    let (files, diags) = if model_diags.is_empty() {
        generate(&mut program)
    } else {
        (Vec::new(), model_diags)
    };

    let want_gen = dir.join("want_gen.weft");
    if want_gen.exists() {
        assert!(
            diags.is_empty(),
            "unexpected diagnostics:\n{}",
            diags
                .iter()
                .map(|diag| diag.render(&target.sources))
                .collect::<Vec<_>>()
                .join("\n")
        );
        assert_eq!(files.len(), 1, "expected exactly one generated file");
        let want = fs::read_to_string(&want_gen).expect("reading want_gen.weft");
        assert_eq!(files[0].content, want, "generated output mismatch");
        return;
    }

    let want_errors =
        fs::read_to_string(dir.join("want_errors.txt")).expect("reading want_errors.txt");
    assert!(files.is_empty(), "expected no generated files");
    assert!(!diags.is_empty(), "expected diagnostics");
    let rendered = diags
        .iter()
        .map(|diag| diag.render(&target.sources))
        .collect::<Vec<_>>()
        .join("\n");
    for line in want_errors.lines().filter(|line| !line.trim().is_empty()) {
        assert!(
            rendered.contains(line),
            "diagnostics missing {:?}; got:\n{}",
            line,
            rendered
        );
    }
}

#[test]
fn linear_chain() {
    run_case("LinearChain");
}

#[test]
fn diamond() {
    run_case("Diamond");
}

#[test]
fn missing_provider() {
    run_case("MissingProvider");
}

#[test]
fn cycle() {
    run_case("Cycle");
}

#[test]
fn binding_conflict() {
    run_case("BindingConflict");
}

#[test]
fn cleanup_mismatch() {
    run_case("CleanupMismatch");
}

#[test]
fn unused_provider() {
    run_case("UnusedProvider");
}

#[test]
fn interface_binding() {
    run_case("InterfaceBinding");
}

#[test]
fn injector_arg_shadow() {
    run_case("InjectorArgShadow");
}

#[test]
fn cross_package() {
    run_case("CrossPackage");
}

#[test]
fn determinism_two_runs_byte_identical() {
    let dir = case_dir("Diamond");
    let root: VfsPath = PhysicalFS::new(dir.join("src")).into();

    let run = || {
        let target = load_dir(&root).expect("load failure");
        let (mut program, diags) = build_program(&target.files);
        assert!(diags.is_empty());
        let (files, diags) = generate(&mut program);
        assert!(diags.is_empty());
        files[0].content.clone()
    };
    assert_eq!(run(), run());
}
