//! Read-only model of parsed disassembly files.
//!
//! Parsing smali text is somebody else's job; this module only describes the
//! structure the position engine queries (one class per file, its methods and
//! their instructions) and an in-memory store that hands out consistent read
//! snapshots.

use std::collections::BTreeMap;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::names;

/// 1-based line number.
pub type Line = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

/// Half-open byte range into a file's text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Line-start table for a file's text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Line containing `offset`. Offsets past the end clamp to the last line.
    pub fn line_of(&self, offset: usize) -> Line {
        let idx = self.starts.partition_point(|&start| start <= offset);
        idx.max(1) as Line
    }

    /// Range of `line`, excluding its trailing newline.
    pub fn line_range(&self, line: Line) -> Option<TextRange> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.starts.get(idx)?;
        let end = match self.starts.get(idx + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        Some(TextRange::new(start, end))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmaliInstruction {
    pub range: TextRange,
    /// Byte offset of the instruction inside the method's code.
    pub code_offset: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmaliMethod {
    pub name: String,
    pub descriptor: String,
    pub range: TextRange,
    pub instructions: Vec<SmaliInstruction>,
}

impl SmaliMethod {
    /// Name and prototype concatenated the way the VM spells a method
    /// signature (`bar()V`).
    pub fn name_and_proto(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    /// First instruction whose code offset is at or past `code_offset`.
    pub fn instruction_at_code_offset(
        &self,
        code_offset: u64,
    ) -> Option<(usize, &SmaliInstruction)> {
        self.instructions
            .iter()
            .enumerate()
            .find(|(_, insn)| insn.code_offset >= code_offset)
    }

    /// Instruction containing `offset`, or the next one after it.
    ///
    /// Blank and directive lines inside the body resolve to the following
    /// instruction; anything after the last instruction resolves to nothing.
    pub fn instruction_at_or_after(&self, offset: usize) -> Option<(usize, &SmaliInstruction)> {
        if !self.range.contains(offset) {
            return None;
        }
        self.instructions
            .iter()
            .enumerate()
            .find(|(_, insn)| insn.range.end > offset)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmaliClass {
    /// Class name as written in the file (`Lcom/example/Foo;`).
    pub name: String,
    pub range: TextRange,
    pub methods: Vec<SmaliMethod>,
}

impl SmaliClass {
    /// Binary name (`com.example.Foo`), or `None` if the file declares a
    /// malformed name.
    pub fn qualified_name(&self) -> Option<String> {
        names::binary_name(&self.name)
    }

    pub fn method(&self, index: usize) -> Option<&SmaliMethod> {
        self.methods.get(index)
    }

    pub fn method_containing(&self, offset: usize) -> Option<(usize, &SmaliMethod)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, method)| method.range.contains(offset))
    }

    pub fn element_at(&self, offset: usize) -> NodeRef {
        if !self.range.contains(offset) {
            return NodeRef::File;
        }
        let Some((method_idx, method)) = self.method_containing(offset) else {
            return NodeRef::Class;
        };
        match method
            .instructions
            .iter()
            .position(|insn| insn.range.contains(offset))
        {
            Some(index) => NodeRef::Instruction {
                method: method_idx,
                index,
            },
            None => NodeRef::Method(method_idx),
        }
    }
}

/// Smallest structural node enclosing an offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    File,
    Class,
    Method(usize),
    Instruction { method: usize, index: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// A smali file. It always defines exactly one top-level class.
    Smali(SmaliClass),
    Foreign,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    path: String,
    text: String,
    lines: LineIndex,
    kind: FileKind,
}

impl SourceFile {
    pub fn smali(path: impl Into<String>, text: impl Into<String>, class: SmaliClass) -> Self {
        Self::new(path.into(), text.into(), FileKind::Smali(class))
    }

    /// Any non-disassembly file a debugger might place positions in.
    pub fn foreign(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(path.into(), text.into(), FileKind::Foreign)
    }

    fn new(path: String, text: String, kind: FileKind) -> Self {
        let lines = LineIndex::new(&text);
        Self {
            path,
            text,
            lines,
            kind,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn kind(&self) -> &FileKind {
        &self.kind
    }

    pub fn smali_class(&self) -> Option<&SmaliClass> {
        match &self.kind {
            FileKind::Smali(class) => Some(class),
            FileKind::Foreign => None,
        }
    }

    pub fn element_at(&self, offset: usize) -> NodeRef {
        match &self.kind {
            FileKind::Smali(class) => class.element_at(offset),
            FileKind::Foreign => NodeRef::File,
        }
    }
}

/// A consistent, read-only snapshot of the artifact store.
///
/// Holding a view blocks writers, so it must be dropped before calling into
/// the debugged process or any other code that may wait.
pub trait ArtifactView {
    /// `None` if the file has been removed.
    fn file(&self, id: FileId) -> Option<&SourceFile>;

    fn revision(&self) -> u64;
}

pub trait ArtifactModel: Send + Sync {
    /// Acquires the read-consistency scope for one query.
    fn read(&self) -> Box<dyn ArtifactView + '_>;
}

#[derive(Default)]
struct StoreInner {
    files: BTreeMap<FileId, SourceFile>,
    next_id: u32,
    revision: u64,
}

/// In-memory artifact store.
#[derive(Default)]
pub struct MemoryArtifactStore {
    inner: RwLock<StoreInner>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: SourceFile) -> FileId {
        let mut inner = self.inner.write();
        let id = FileId::from_raw(inner.next_id);
        inner.next_id += 1;
        inner.files.insert(id, file);
        inner.revision += 1;
        id
    }

    /// Replaces the contents of an existing file. Returns `false` if the file
    /// does not exist.
    pub fn set_file(&self, id: FileId, file: SourceFile) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.files.get_mut(&id) else {
            return false;
        };
        *slot = file;
        inner.revision += 1;
        true
    }

    pub fn remove(&self, id: FileId) -> Option<SourceFile> {
        let mut inner = self.inner.write();
        let removed = inner.files.remove(&id);
        if removed.is_some() {
            inner.revision += 1;
        }
        removed
    }

    pub fn file_ids(&self) -> Vec<FileId> {
        self.inner.read().files.keys().copied().collect()
    }

    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }
}

struct MemoryView<'a> {
    guard: RwLockReadGuard<'a, StoreInner>,
}

impl ArtifactView for MemoryView<'_> {
    fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.guard.files.get(&id)
    }

    fn revision(&self) -> u64 {
        self.guard.revision
    }
}

impl ArtifactModel for MemoryArtifactStore {
    fn read(&self) -> Box<dyn ArtifactView + '_> {
        Box::new(MemoryView {
            guard: self.inner.read(),
        })
    }
}
