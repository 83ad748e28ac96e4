use crate::model::{FileId, Line, NodeRef, SourceFile};

/// A position inside a file of the artifact store.
///
/// Positions refer to files by id only; the file may be edited or removed
/// after the position was taken, and every query re-checks it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactPosition {
    pub file: FileId,
    pub offset: usize,
    pub line: Line,
    /// Smallest node enclosing `offset` when the position was taken.
    pub element: NodeRef,
}

impl ArtifactPosition {
    pub fn at_offset(file_id: FileId, file: &SourceFile, offset: usize) -> Self {
        Self {
            file: file_id,
            offset,
            line: file.lines().line_of(offset),
            element: file.element_at(offset),
        }
    }

    /// Position of the first non-blank column of `line`, as produced by a
    /// click in the editor gutter.
    pub fn at_line(file_id: FileId, file: &SourceFile, line: Line) -> Option<Self> {
        let range = file.lines().line_range(line)?;
        let text = &file.text()[range.start..range.end];
        let column = text.find(|c: char| !c.is_whitespace()).unwrap_or(0);
        Some(Self::at_offset(file_id, file, range.start + column))
    }
}
