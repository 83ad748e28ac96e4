use std::fmt;

use thiserror::Error;

use crate::model::FileId;

/// Why a query could not be answered against the disassembly artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoMappingReason {
    /// The position points into a file that is not a smali disassembly file.
    NotDisassembly,
    /// The file referenced by the position (or by an index entry) no longer exists.
    MissingFile(FileId),
    /// The position lies outside the file's class definition.
    OutsideClass { file: FileId, offset: usize },
    /// The name is not a class name (e.g. an array descriptor).
    InvalidTypeName(String),
    UnknownType(String),
    UnknownMethod { class: String, method: String },
    /// The code offset lies past the last instruction of the method.
    NoInstruction { method: String, code_offset: u64 },
}

impl fmt::Display for NoMappingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDisassembly => f.write_str("position is not inside a smali file"),
            Self::MissingFile(file) => write!(f, "file {} no longer exists", file.to_raw()),
            Self::OutsideClass { file, offset } => write!(
                f,
                "offset {offset} is outside the class defined in file {}",
                file.to_raw()
            ),
            Self::InvalidTypeName(name) => write!(f, "`{name}` is not a class name"),
            Self::UnknownType(name) => write!(f, "no smali class named `{name}`"),
            Self::UnknownMethod { class, method } => {
                write!(f, "no method `{method}` in smali class `{class}`")
            }
            Self::NoInstruction {
                method,
                code_offset,
            } => write!(f, "no instruction at code offset {code_offset} in `{method}`"),
        }
    }
}

/// Failure reported by the debugged process.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("debugged process has terminated")]
    Terminated,
    #[error("debugged process is not connected")]
    NotConnected,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum PositionError {
    /// The query does not correspond to any disassembly artifact or symbol.
    ///
    /// This is distinct from a valid query with an empty answer, which is
    /// reported as `Ok(vec![])`.
    #[error("no mapping: {0}")]
    NoMapping(NoMappingReason),

    #[error("host process unavailable: {0}")]
    HostUnavailable(#[from] HostError),
}

impl PositionError {
    pub fn is_no_mapping(&self) -> bool {
        matches!(self, Self::NoMapping(_))
    }
}

impl From<NoMappingReason> for PositionError {
    fn from(reason: NoMappingReason) -> Self {
        Self::NoMapping(reason)
    }
}

pub type Result<T, E = PositionError> = std::result::Result<T, E>;
