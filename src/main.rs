use anyhow::Context;
use clap::{Parser, Subcommand};
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vfs::{PhysicalFS, VfsPath};
use weft::analysis::format::report_diags;
use weft::driver;
use weft::errors::Diag;
use weft::generate::generate;
use weft::manifest::Manifest;
use weft::model::build::build_program;
use weft::sources::FileSources;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate initialization files for the packages in DIR.
    Gen {
        /// The directory containing .weft source files.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Run the analysis without writing any files.
    Check {
        /// The directory containing .weft source files.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Gen { dir } => run(dir, true),
        Command::Check { dir } => run(dir, false),
    };
    match result {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            eprintln!("weft: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WEFT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads, analyzes, and (for `gen`) writes generated files. Returns whether
/// the run was free of diagnostics.
fn run(dir: PathBuf, write: bool) -> anyhow::Result<bool> {
    let root: VfsPath = PhysicalFS::new(&dir).into();
    let manifest = Manifest::load(&root).context("loading Weft.toml")?;

    let target = driver::load_dir(&root)
        .with_context(|| format!("loading {}", dir.display()))?;
    if !target.diags.is_empty() {
        report(&target.sources, &target.diags)?;
        return Ok(false);
    }

    let (mut program, model_diags) = build_program(&target.files);
    if !model_diags.is_empty() {
        report(&target.sources, &model_diags)?;
        return Ok(false);
    }

    let (files, diags) = generate(&mut program);
    if !diags.is_empty() {
        report(&target.sources, &diags)?;
        return Ok(false);
    }

    if write {
        let out_dir = match &manifest.generate.dir {
            Some(sub) => {
                let out = root.join(sub).context("resolving output directory")?;
                out.create_dir_all().context("creating output directory")?;
                out
            }
            None => root,
        };
        for file in &files {
            let path = out_dir
                .join(&file.file_name)
                .with_context(|| format!("resolving {}", file.file_name))?;
            path.create_file()
                .with_context(|| format!("creating {}", file.file_name))?
                .write_all(file.content.as_bytes())
                .with_context(|| format!("writing {}", file.file_name))?;
            println!("wrote {}", file.file_name);
        }
    } else {
        for file in &files {
            println!("ok {}", file.file_name);
        }
    }
    Ok(true)
}

fn report(sources: &FileSources, diags: &[Diag]) -> anyhow::Result<()> {
    let writer = StandardStream::stderr(ColorChoice::Auto);
    report_diags(&mut writer.lock(), sources, diags).context("rendering diagnostics")?;
    Ok(())
}
