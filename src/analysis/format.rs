use crate::errors::Diag;
use crate::sources::FileSources;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::WriteColor;

/// Renders collected diagnostics with codespan-reporting: the primary label
/// at the diagnostic's position, secondary labels for related declarations
/// (conflict sources), and notes for dependency chains.
pub fn report_diags(
    writer: &mut impl WriteColor,
    files: &FileSources,
    diags: &[Diag],
) -> Result<(), codespan_reporting::files::Error> {
    let config = term::Config::default();

    for diag in diags {
        let mut labels = Vec::new();
        if let Some(pos) = diag.pos {
            labels.push(Label::primary(pos.context, pos.start..pos.end));
        }
        for (pos, message) in &diag.labels {
            labels.push(
                Label::secondary(pos.context, pos.start..pos.end).with_message(message.clone()),
            );
        }
        let diagnostic = Diagnostic::error()
            .with_message(diag.message.clone())
            .with_labels(labels)
            .with_notes(diag.notes.clone());
        term::emit(writer, &config, files, &diagnostic)?;
    }

    Ok(())
}
