//! Loads a target directory of `.weft` files: every file is lexed, parsed,
//! and registered for diagnostics. Filesystem access goes through `vfs` so
//! tests can run against an in-memory tree.

use crate::emit::GENERATED_HEADER;
use crate::errors::{Diag, DiagKind};
use crate::lexer::Lexer;
use crate::parser;
use crate::parser::ast::{File, Span};
use crate::sources::FileSources;
use std::io::Read;
use thiserror::Error;
use tracing::debug;
use vfs::VfsPath;

pub const FILE_EXTENSION: &str = ".weft";

/// Errors that prevent loading outright. Problems inside a file (lex, parse)
/// are collected as diagnostics instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("VFS error: {error}")]
    Vfs {
        path: String,
        #[source]
        error: vfs::VfsError,
    },

    #[error("I/O error: {error}")]
    Io {
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("no {FILE_EXTENSION} files found in {0}")]
    NoSources(String),
}

/// The result of loading a directory: the parsed files in deterministic
/// (name-sorted) order, the source registry for rendering diagnostics, and
/// any lex or parse diagnostics.
pub struct LoadedTarget {
    pub files: Vec<File>,
    pub sources: FileSources,
    pub diags: Vec<Diag>,
}

pub fn load_dir(root: &VfsPath) -> Result<LoadedTarget, LoadError> {
    let entries = root.read_dir().map_err(|error| LoadError::Vfs {
        path: root.as_str().to_string(),
        error,
    })?;
    let mut paths: Vec<VfsPath> = entries
        .filter(|entry| entry.filename().ends_with(FILE_EXTENSION))
        .collect();
    paths.sort_by_key(|path| path.filename());
    if paths.is_empty() {
        return Err(LoadError::NoSources(root.as_str().to_string()));
    }

    let mut sources = FileSources::new();
    let mut files = Vec::new();
    let mut diags = Vec::new();

    for path in paths {
        let name = path.filename();
        debug!(file = %name, "loading source file");
        let mut content = String::new();
        let mut reader = path.open_file().map_err(|error| LoadError::Vfs {
            path: name.clone(),
            error,
        })?;
        reader
            .read_to_string(&mut content)
            .map_err(|error| LoadError::Io {
                path: name.clone(),
                error,
            })?;
        if content.starts_with(GENERATED_HEADER) {
            continue;
        }

        let id = sources.add(name, content.clone());
        let (tokens, lex_errors) = Lexer::new(&content, id).collect_all();
        if !lex_errors.is_empty() {
            for error in &lex_errors {
                let start = error.position();
                diags.push(
                    Diag::new(DiagKind::Parse, error.to_string()).at(Span {
                        start,
                        end: start + 1,
                        context: id,
                    }),
                );
            }
            continue;
        }

        let eoi = Span {
            start: content.len(),
            end: content.len(),
            context: id,
        };
        let parsed = parser::parse_file(&tokens, eoi);
        if parsed.has_errors() {
            for error in parsed.errors() {
                diags.push(Diag::new(DiagKind::Parse, error.to_string()).at(*error.span()));
            }
            continue;
        }
        if let Some(file) = parsed.into_output() {
            files.push(file);
        }
    }

    Ok(LoadedTarget {
        files,
        sources,
        diags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vfs::MemoryFS;

    fn memory_root(files: &[(&str, &str)]) -> VfsPath {
        let root: VfsPath = MemoryFS::new().into();
        for (name, content) in files {
            let path = root.join(name).unwrap();
            path.create_file()
                .unwrap()
                .write_all(content.as_bytes())
                .unwrap();
        }
        root
    }

    #[test]
    fn loads_files_in_name_order() {
        let root = memory_root(&[
            ("b.weft", "package b \"example.com/b\"\n"),
            ("a.weft", "package a \"example.com/a\"\n"),
            ("notes.txt", "ignored"),
        ]);
        let target = load_dir(&root).unwrap();
        assert!(target.diags.is_empty());
        assert_eq!(target.files.len(), 2);
        assert_eq!(target.files[0].package.name, "a");
        assert_eq!(target.files[1].package.name, "b");
    }

    #[test]
    fn generated_files_are_skipped() {
        let root = memory_root(&[
            ("a.weft", "package a \"example.com/a\"\n"),
            (
                "a_gen.weft",
                "// Code generated by weft. DO NOT EDIT.\n\npackage a \"example.com/a\"\n",
            ),
        ]);
        let target = load_dir(&root).unwrap();
        assert!(target.diags.is_empty());
        assert_eq!(target.files.len(), 1);
    }

    #[test]
    fn missing_sources_is_an_error() {
        let root = memory_root(&[("notes.txt", "nothing here")]);
        assert!(matches!(load_dir(&root), Err(LoadError::NoSources(_))));
    }

    #[test]
    fn parse_errors_become_diagnostics() {
        let root = memory_root(&[("bad.weft", "package app \"example.com/app\"\nfn (\n")]);
        let target = load_dir(&root).unwrap();
        assert!(!target.diags.is_empty());
        assert!(target.files.is_empty());
    }
}
