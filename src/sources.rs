use crate::parser::ast::{SourceId, Span};
use std::collections::HashMap;
use std::ops::Range;

/// A collection of source files for error reporting.
/// Maps SourceId to (filename, content, line starts) for multi-file diagnostics.
pub struct FileSources {
    files: HashMap<SourceId, FileEntry>,
    next_id: usize,
}

struct FileEntry {
    name: String,
    source: String,
    line_starts: Vec<usize>,
}

impl FileEntry {
    fn new(name: String, source: String) -> Self {
        let mut line_starts = vec![0];
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        FileEntry {
            name,
            source,
            line_starts,
        }
    }

    fn line_index(&self, byte_index: usize) -> usize {
        match self.line_starts.binary_search(&byte_index) {
            Ok(line) => line,
            Err(next_line) => next_line - 1,
        }
    }
}

impl FileSources {
    pub fn new() -> Self {
        FileSources {
            files: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register a file, allocating a fresh SourceId for it.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.files
            .insert(id, FileEntry::new(name.into(), source.into()));
        id
    }

    /// Create a FileSources with a single file using the SYNTHETIC SourceId.
    pub fn single(name: impl Into<String>, source: impl Into<String>) -> Self {
        let mut files = Self::new();
        files.add(name, source);
        files
    }

    pub fn name_of(&self, id: SourceId) -> Option<&str> {
        self.files.get(&id).map(|entry| entry.name.as_str())
    }

    /// Renders a span as `file:line:col` with 1-based line and column.
    /// Used by the plain (non-terminal) diagnostic rendering.
    pub fn location(&self, span: Span) -> Option<String> {
        let entry = self.files.get(&span.context)?;
        let line = entry.line_index(span.start);
        let col = span.start - entry.line_starts.get(line).copied().unwrap_or(0);
        Some(format!("{}:{}:{}", entry.name, line + 1, col + 1))
    }
}

impl Default for FileSources {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> codespan_reporting::files::Files<'a> for FileSources {
    type FileId = SourceId;
    type Name = &'a str;
    type Source = &'a str;

    fn name(&'a self, id: Self::FileId) -> Result<Self::Name, codespan_reporting::files::Error> {
        self.files
            .get(&id)
            .map(|entry| entry.name.as_str())
            .ok_or(codespan_reporting::files::Error::FileMissing)
    }

    fn source(
        &'a self,
        id: Self::FileId,
    ) -> Result<Self::Source, codespan_reporting::files::Error> {
        self.files
            .get(&id)
            .map(|entry| entry.source.as_str())
            .ok_or(codespan_reporting::files::Error::FileMissing)
    }

    fn line_index(
        &'a self,
        id: Self::FileId,
        byte_index: usize,
    ) -> Result<usize, codespan_reporting::files::Error> {
        let entry = self
            .files
            .get(&id)
            .ok_or(codespan_reporting::files::Error::FileMissing)?;
        Ok(entry.line_index(byte_index))
    }

    fn line_range(
        &'a self,
        id: Self::FileId,
        line_index: usize,
    ) -> Result<Range<usize>, codespan_reporting::files::Error> {
        let entry = self
            .files
            .get(&id)
            .ok_or(codespan_reporting::files::Error::FileMissing)?;
        let max = entry.line_starts.len() - 1;
        if line_index > max {
            return Err(codespan_reporting::files::Error::LineTooLarge {
                given: line_index,
                max,
            });
        }
        let start = entry.line_starts[line_index];
        let end = entry
            .line_starts
            .get(line_index + 1)
            .map(|next| next - 1)
            .unwrap_or(entry.source.len());
        Ok(start..end)
    }
}
