//! Debugger position mapping for smali disassembly.
//!
//! Android apps are often debugged without their Java sources. This crate lets
//! a debugger use baksmali output instead: it maps a VM stop location
//! (declaring type, method, code index) to the instruction in a `.smali` file,
//! maps a clicked line back to VM locations for breakpoints, and defers
//! breakpoints on classes that are not loaded yet until the VM reports them
//! prepared.
//!
//! The engine sits between three collaborators, each behind a trait so tests
//! can substitute fakes:
//!
//! - [`ArtifactModel`]: parsed smali files, read under a consistent snapshot.
//! - [`SymbolIndex`]: class and method lookups by name.
//! - [`DebugProcess`]: the VM's loaded-type directory and class-prepare
//!   requests.
//!
//! [`PositionManager`] bundles the three into the calls a debugger engine
//! makes.

mod builder;
mod config;
mod error;
mod host;
mod index;
mod manager;
mod mock;
mod model;
pub mod names;
mod position;
mod resolver;
mod translator;
mod watch;

pub use builder::{MethodBuilder, SmaliFileBuilder};
pub use config::{ConfigError, PositionConfig};
pub use error::{HostError, NoMappingReason, PositionError, Result};
pub use host::{
    ClassPrepareEvent, ClassPrepareRequestId, DebugProcess, ReferenceTypeId, RuntimeLocation,
    RuntimeTypeHandle,
};
pub use index::{ClassSymbol, MemoryIndex, MethodSymbol, SearchScope, SymbolIndex};
pub use manager::{ClassPrepareHook, ForwardToRequestor, PositionManager};
pub use mock::MockDebugProcess;
pub use model::{
    ArtifactModel, ArtifactView, FileId, FileKind, Line, LineIndex, MemoryArtifactStore, NodeRef,
    SmaliClass, SmaliInstruction, SmaliMethod, SourceFile, TextRange,
};
pub use position::ArtifactPosition;
pub use resolver::TypeResolver;
pub use translator::LocationTranslator;
pub use watch::{ClassPrepareRequestor, WatchHandle, WatchId, WatchManager, WatchState};
