//! Name → artifact lookups.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::model::{ArtifactView, FileId, SourceFile};
use crate::names;

/// Restricts the universe a [`SymbolIndex`] lookup searches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchScope {
    /// Every file visible to the debug session.
    Project,
    File(FileId),
}

impl SearchScope {
    pub fn contains(self, file: FileId) -> bool {
        match self {
            Self::Project => true,
            Self::File(scope) => scope == file,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassSymbol {
    pub file: FileId,
    /// Binary name (`com.example.Foo`).
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodSymbol {
    pub file: FileId,
    /// Index into the class's method list.
    pub method: usize,
    pub name_and_proto: String,
}

/// Index over smali classes and methods.
///
/// Implementations may return candidates in any order and may return
/// entries for files that have since been edited or removed; callers must
/// re-check every candidate against the current [`ArtifactView`].
pub trait SymbolIndex: Send + Sync {
    fn classes_by_name(&self, name: &str, scope: SearchScope) -> Vec<ClassSymbol>;

    /// `key` is the method name immediately followed by its descriptor
    /// (`bar()V`).
    fn methods_by_name_and_proto(&self, key: &str, scope: SearchScope) -> Vec<MethodSymbol>;
}

#[derive(Default)]
struct IndexInner {
    classes: BTreeMap<String, BTreeSet<FileId>>,
    methods: BTreeMap<String, BTreeSet<(FileId, usize)>>,
    by_file: HashMap<FileId, FileEntries>,
}

#[derive(Default)]
struct FileEntries {
    class: Option<String>,
    methods: Vec<String>,
}

impl IndexInner {
    fn remove_file(&mut self, file: FileId) {
        let Some(entries) = self.by_file.remove(&file) else {
            return;
        };
        if let Some(class) = entries.class {
            if let Some(files) = self.classes.get_mut(&class) {
                files.remove(&file);
                if files.is_empty() {
                    self.classes.remove(&class);
                }
            }
        }
        for key in entries.methods {
            if let Some(methods) = self.methods.get_mut(&key) {
                methods.retain(|(f, _)| *f != file);
                if methods.is_empty() {
                    self.methods.remove(&key);
                }
            }
        }
    }

    fn add_file(&mut self, file: FileId, source: &SourceFile) {
        let Some(class) = source.smali_class() else {
            return;
        };
        let mut entries = FileEntries::default();
        if let Some(name) = class.qualified_name() {
            self.classes.entry(name.clone()).or_default().insert(file);
            entries.class = Some(name);
        }
        for (idx, method) in class.methods.iter().enumerate() {
            let key = method.name_and_proto();
            self.methods
                .entry(key.clone())
                .or_default()
                .insert((file, idx));
            entries.methods.push(key);
        }
        self.by_file.insert(file, entries);
    }
}

/// In-memory [`SymbolIndex`].
///
/// Results come back sorted by file id (then method position), so picking
/// the first candidate is deterministic.
#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<IndexInner>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index over `files` as seen by `view`.
    pub fn from_view(view: &dyn ArtifactView, files: impl IntoIterator<Item = FileId>) -> Self {
        let index = Self::new();
        for file in files {
            index.update_file(file, view.file(file));
        }
        index
    }

    /// (Re)indexes `file`; `None` drops it.
    pub fn update_file(&self, file: FileId, source: Option<&SourceFile>) {
        let mut inner = self.inner.write();
        inner.remove_file(file);
        if let Some(source) = source {
            inner.add_file(file, source);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_file.is_empty()
    }
}

impl SymbolIndex for MemoryIndex {
    fn classes_by_name(&self, name: &str, scope: SearchScope) -> Vec<ClassSymbol> {
        let Some(name) = names::binary_name(name) else {
            return Vec::new();
        };
        let inner = self.inner.read();
        let Some(files) = inner.classes.get(&name) else {
            return Vec::new();
        };
        files
            .iter()
            .copied()
            .filter(|file| scope.contains(*file))
            .map(|file| ClassSymbol {
                file,
                name: name.clone(),
            })
            .collect()
    }

    fn methods_by_name_and_proto(&self, key: &str, scope: SearchScope) -> Vec<MethodSymbol> {
        let inner = self.inner.read();
        let Some(methods) = inner.methods.get(key) else {
            return Vec::new();
        };
        methods
            .iter()
            .copied()
            .filter(|(file, _)| scope.contains(*file))
            .map(|(file, method)| MethodSymbol {
                file,
                method,
                name_and_proto: key.to_string(),
            })
            .collect()
    }
}
