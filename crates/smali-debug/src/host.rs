//! Interface to the debugged process.
//!
//! The engine never talks to a VM directly; a debugger front end implements
//! [`DebugProcess`] on top of its wire client (JDWP, ADB, ...) and forwards
//! class-prepare events to [`crate::WatchManager::dispatch`].

use crate::error::HostError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceTypeId(pub u64);

/// A type loaded in the debugged process.
///
/// The same class name can be loaded more than once (one per class loader),
/// each with its own id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuntimeTypeHandle {
    pub id: ReferenceTypeId,
    /// Binary name as reported by the VM (`com.example.Foo`).
    pub name: String,
}

/// A position in the executing program's instruction stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuntimeLocation {
    pub type_id: ReferenceTypeId,
    pub declaring_type: String,
    pub method_name: String,
    pub method_descriptor: String,
    /// Offset in 16-bit code units from the start of the method.
    pub code_index: u64,
}

impl RuntimeLocation {
    pub fn method_name_and_proto(&self) -> String {
        format!("{}{}", self.method_name, self.method_descriptor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassPrepareRequestId(pub i32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassPrepareEvent {
    pub request_id: ClassPrepareRequestId,
    pub type_handle: RuntimeTypeHandle,
}

pub trait DebugProcess: Send + Sync {
    /// Loaded types whose binary name is exactly `name`.
    fn classes_by_name(&self, name: &str) -> Result<Vec<RuntimeTypeHandle>, HostError>;

    /// Whether the loaded type declares `name` with `descriptor`.
    fn has_method(
        &self,
        _ty: &RuntimeTypeHandle,
        _name: &str,
        _descriptor: &str,
    ) -> Result<bool, HostError> {
        Ok(true)
    }

    /// Asks the VM to report when a class named `class_name` is prepared.
    ///
    /// The resulting event may reach [`crate::WatchManager::dispatch`] from
    /// any thread, even before this call returns.
    fn request_class_prepare(&self, class_name: &str) -> Result<ClassPrepareRequestId, HostError>;

    /// Best effort: a failure here only leaks a request in the VM.
    fn clear_class_prepare(&self, request: ClassPrepareRequestId);
}
