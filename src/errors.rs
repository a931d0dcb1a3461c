use crate::parser::ast::Span;
use crate::sources::FileSources;

/// The class of a diagnostic. Messages carry the detail; the kind is what
/// tests and tooling match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    /// The solver cannot resolve a required type.
    NoProvider,
    /// A type is reachable from itself through provider inputs.
    Cycle,
    /// Two declarations provide the same type.
    MultipleBindings,
    /// A declaration is never reached by any injector.
    UnusedDeclaration,
    /// A `Bind` target does not implement the interface, or binds it to itself.
    IncompatibleBinding,
    /// A marker-construct argument has the wrong shape.
    InvalidArgument,
    /// A function provider violates the return or parameter rules.
    BadProviderSignature,
    CleanupMismatch,
    ErrorMismatch,
    /// An unexported or local identifier is referenced from another package.
    Visibility,
    /// An injector body is not a single `Build` call.
    InvalidInjector,
    /// A name or type failed to resolve while building the program model.
    Resolve,
    /// A source file failed to lex or parse.
    Parse,
}

/// A diagnostic: a message with an optional primary position, secondary
/// labels, and notes. Plain values; phases accumulate them and continue.
#[derive(Debug, Clone, PartialEq)]
pub struct Diag {
    pub kind: DiagKind,
    pub message: String,
    pub pos: Option<Span>,
    pub labels: Vec<(Span, String)>,
    pub notes: Vec<String>,
}

impl Diag {
    pub fn new(kind: DiagKind, message: impl Into<String>) -> Self {
        Diag {
            kind,
            message: message.into(),
            pos: None,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Attaches a position. The first position attached wins; re-wrapping an
    /// already-positioned diagnostic is a no-op.
    pub fn at(mut self, pos: Span) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
        self
    }

    pub fn with_label(mut self, pos: Span, message: impl Into<String>) -> Self {
        self.labels.push((pos, message.into()));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Renders the diagnostic as plain text: `file:line:col: message`, or the
    /// bare message when no position is known. Labels and notes follow on
    /// indented lines.
    pub fn render(&self, sources: &FileSources) -> String {
        let mut out = match self.pos.and_then(|pos| sources.location(pos)) {
            Some(location) => format!("{}: {}", location, self.message),
            None => self.message.clone(),
        };
        for (pos, message) in &self.labels {
            out.push_str("\n\t");
            out.push_str(message);
            if let Some(location) = sources.location(*pos) {
                out.push_str(&format!(" ({})", location));
            }
        }
        for note in &self.notes {
            out.push_str("\n\t");
            out.push_str(note);
        }
        out
    }
}

/// Attaches `pos` to every diagnostic that does not yet carry one.
pub fn note_position_all(pos: Span, diags: Vec<Diag>) -> Vec<Diag> {
    diags.into_iter().map(|diag| diag.at(pos)).collect()
}

/// Accumulates diagnostics across a phase. Consumed at boundary points with
/// [`DiagCollector::into_diags`], which also collapses duplicates.
#[derive(Debug, Default)]
pub struct DiagCollector {
    diags: Vec<Diag>,
}

impl DiagCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diag: Diag) {
        self.diags.push(diag);
    }

    pub fn add_opt(&mut self, diag: Option<Diag>) {
        if let Some(diag) = diag {
            self.diags.push(diag);
        }
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diag>) {
        self.diags.extend(diags);
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diags.len()
    }

    /// Drains the collector, dropping diagnostics whose (position, message)
    /// pair was already seen. Order is preserved.
    pub fn into_diags(self) -> Vec<Diag> {
        let mut seen: Vec<(Option<Span>, &str)> = Vec::new();
        let mut out = Vec::with_capacity(self.diags.len());
        for diag in &self.diags {
            let key = (diag.pos, diag.message.as_str());
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            out.push(diag.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::SourceId;

    fn span(start: usize, end: usize) -> Span {
        Span {
            start,
            end,
            context: SourceId::SYNTHETIC,
        }
    }

    #[test]
    fn first_position_wins() {
        let diag = Diag::new(DiagKind::NoProvider, "no provider found for X")
            .at(span(3, 5))
            .at(span(10, 12));
        assert_eq!(diag.pos, Some(span(3, 5)));
    }

    #[test]
    fn render_with_position() {
        let sources = FileSources::single("main.weft", "package app \"a\"\nfn F()\n");
        let diag = Diag::new(DiagKind::Cycle, "cycle for app.A").at(span(16, 18));
        assert_eq!(diag.render(&sources), "main.weft:2:1: cycle for app.A");
    }

    #[test]
    fn render_without_position() {
        let sources = FileSources::new();
        let diag = Diag::new(DiagKind::NoProvider, "no provider found for app.A");
        assert_eq!(diag.render(&sources), "no provider found for app.A");
    }

    #[test]
    fn notes_render_on_indented_lines() {
        let sources = FileSources::new();
        let diag = Diag::new(DiagKind::NoProvider, "no provider found for app.A")
            .with_note("needed by app.B in provider set \"Base\"");
        assert_eq!(
            diag.render(&sources),
            "no provider found for app.A\n\tneeded by app.B in provider set \"Base\""
        );
    }

    #[test]
    fn collector_dedups_identical_messages_at_same_position() {
        let mut collector = DiagCollector::new();
        collector.add(Diag::new(DiagKind::NoProvider, "no provider found for app.A").at(span(0, 1)));
        collector.add(Diag::new(DiagKind::NoProvider, "no provider found for app.A").at(span(0, 1)));
        collector.add(Diag::new(DiagKind::NoProvider, "no provider found for app.A").at(span(2, 3)));
        assert_eq!(collector.into_diags().len(), 2);
    }

    #[test]
    fn add_opt_drops_none() {
        let mut collector = DiagCollector::new();
        collector.add_opt(None);
        collector.add_opt(Some(Diag::new(DiagKind::Cycle, "cycle for app.A")));
        assert_eq!(collector.len(), 1);
    }
}
