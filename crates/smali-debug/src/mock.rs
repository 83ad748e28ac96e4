use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::error::HostError;
use crate::host::{
    ClassPrepareEvent, ClassPrepareRequestId, DebugProcess, ReferenceTypeId, RuntimeTypeHandle,
};
use crate::names;

#[derive(Clone, Debug)]
struct MockClass {
    handle: RuntimeTypeHandle,
    methods: BTreeSet<String>,
}

#[derive(Default)]
struct MockState {
    next_type_id: u64,
    next_request_id: i32,
    classes: Vec<MockClass>,
    requests: BTreeMap<ClassPrepareRequestId, String>,
    cleared: Vec<ClassPrepareRequestId>,
    terminated: bool,
}

/// Deterministic, in-memory [`DebugProcess`] test double.
///
/// Classes are loaded explicitly; [`MockDebugProcess::prepare_class`] returns
/// the class-prepare events the VM would send so tests can deliver them from
/// whichever thread they like.
#[derive(Default)]
pub struct MockDebugProcess {
    state: Mutex<MockState>,
}

impl MockDebugProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a loaded type declaring `methods` (`name` + descriptor, e.g. `bar()V`).
    pub fn load_class(&self, name: &str, methods: &[&str]) -> RuntimeTypeHandle {
        let mut state = self.state.lock();
        state.next_type_id += 1;
        let handle = RuntimeTypeHandle {
            id: ReferenceTypeId(state.next_type_id),
            name: names::binary_name(name).unwrap_or_else(|| name.to_string()),
        };
        state.classes.push(MockClass {
            handle: handle.clone(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
        });
        handle
    }

    /// Loads a type and returns the events for every live request matching it.
    pub fn prepare_class(
        &self,
        name: &str,
        methods: &[&str],
    ) -> (RuntimeTypeHandle, Vec<ClassPrepareEvent>) {
        let handle = self.load_class(name, methods);
        let state = self.state.lock();
        let events = state
            .requests
            .iter()
            .filter(|(_, class)| **class == handle.name)
            .map(|(request_id, _)| ClassPrepareEvent {
                request_id: *request_id,
                type_handle: handle.clone(),
            })
            .collect();
        (handle, events)
    }

    pub fn active_requests(&self) -> Vec<(ClassPrepareRequestId, String)> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|(id, class)| (*id, class.clone()))
            .collect()
    }

    pub fn cleared_requests(&self) -> Vec<ClassPrepareRequestId> {
        self.state.lock().cleared.clone()
    }

    /// Every subsequent call fails with [`HostError::Terminated`].
    pub fn terminate(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        state.requests.clear();
    }

    fn check_alive(state: &MockState) -> Result<(), HostError> {
        if state.terminated {
            Err(HostError::Terminated)
        } else {
            Ok(())
        }
    }
}

impl DebugProcess for MockDebugProcess {
    fn classes_by_name(&self, name: &str) -> Result<Vec<RuntimeTypeHandle>, HostError> {
        let state = self.state.lock();
        Self::check_alive(&state)?;
        Ok(state
            .classes
            .iter()
            .filter(|class| class.handle.name == name)
            .map(|class| class.handle.clone())
            .collect())
    }

    fn has_method(
        &self,
        ty: &RuntimeTypeHandle,
        name: &str,
        descriptor: &str,
    ) -> Result<bool, HostError> {
        let state = self.state.lock();
        Self::check_alive(&state)?;
        let key = format!("{name}{descriptor}");
        Ok(state
            .classes
            .iter()
            .any(|class| class.handle.id == ty.id && class.methods.contains(&key)))
    }

    fn request_class_prepare(&self, class_name: &str) -> Result<ClassPrepareRequestId, HostError> {
        let mut state = self.state.lock();
        Self::check_alive(&state)?;
        state.next_request_id += 1;
        let id = ClassPrepareRequestId(state.next_request_id);
        state.requests.insert(id, class_name.to_string());
        Ok(id)
    }

    fn clear_class_prepare(&self, request: ClassPrepareRequestId) {
        let mut state = self.state.lock();
        if state.requests.remove(&request).is_some() {
            state.cleared.push(request);
        }
    }
}
