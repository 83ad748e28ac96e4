//! One-shot class-prepare watches.
//!
//! A watch is armed for a class that is not loaded yet. The host forwards
//! class-prepare events to [`WatchManager::dispatch`], possibly from its own
//! event thread; the first matching event fires the watch's requestor and
//! retires it. Firing and cancelling race on the watch's slot lock, so each
//! watch makes exactly one terminal transition.
//!
//! The registry lock is never held while the host is called. Events that
//! arrive before a pending registration learns its request id are kept until
//! that registration claims them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{NoMappingReason, Result};
use crate::host::{ClassPrepareEvent, ClassPrepareRequestId, DebugProcess, RuntimeTypeHandle};
use crate::names;

/// Completion routine run once the watched class is prepared.
pub trait ClassPrepareRequestor: Send + Sync {
    fn process_class_prepare(&self, process: &dyn DebugProcess, ty: &RuntimeTypeHandle);
}

impl<F> ClassPrepareRequestor for F
where
    F: Fn(&dyn DebugProcess, &RuntimeTypeHandle) + Send + Sync,
{
    fn process_class_prepare(&self, process: &dyn DebugProcess, ty: &RuntimeTypeHandle) {
        self(process, ty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    Armed,
    Fired,
    Cancelled,
}

enum Slot {
    Armed(Arc<dyn ClassPrepareRequestor>),
    Fired,
    Cancelled,
}

impl Slot {
    fn state(&self) -> WatchState {
        match self {
            Slot::Armed(_) => WatchState::Armed,
            Slot::Fired => WatchState::Fired,
            Slot::Cancelled => WatchState::Cancelled,
        }
    }
}

struct Watch {
    id: WatchId,
    class_name: String,
    request_id: ClassPrepareRequestId,
    slot: Mutex<Slot>,
}

impl Watch {
    /// Moves an armed watch into `terminal`, returning its requestor.
    fn retire(&self, terminal: Slot) -> Option<Arc<dyn ClassPrepareRequestor>> {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Armed(_)) {
            return None;
        }
        match std::mem::replace(&mut *slot, terminal) {
            Slot::Armed(requestor) => Some(requestor),
            Slot::Fired | Slot::Cancelled => None,
        }
    }
}

/// Caller-side reference to a watch. Cheap to clone.
#[derive(Clone)]
pub struct WatchHandle {
    watch: Arc<Watch>,
}

impl WatchHandle {
    pub fn id(&self) -> WatchId {
        self.watch.id
    }

    /// Binary name of the watched class.
    pub fn class_name(&self) -> &str {
        &self.watch.class_name
    }

    pub fn request_id(&self) -> ClassPrepareRequestId {
        self.watch.request_id
    }

    pub fn state(&self) -> WatchState {
        self.watch.slot.lock().state()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.watch.id)
            .field("class_name", &self.watch.class_name)
            .field("request_id", &self.watch.request_id)
            .field("state", &self.state())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    armed: BTreeMap<WatchId, Arc<Watch>>,
    /// Registrations waiting on the host for their request id.
    in_flight: usize,
    /// Events that matched no armed watch while a registration was in flight.
    unclaimed: Vec<ClassPrepareEvent>,
    /// Bumped by `cancel_all`.
    detach_epoch: u64,
}

impl Registry {
    fn claim(
        &mut self,
        request_id: ClassPrepareRequestId,
        class_name: &str,
    ) -> Option<ClassPrepareEvent> {
        let idx = self.unclaimed.iter().position(|event| {
            event.request_id == request_id
                && names::binary_name(&event.type_handle.name).as_deref() == Some(class_name)
        })?;
        Some(self.unclaimed.swap_remove(idx))
    }

    fn finish_registration(&mut self) {
        self.in_flight -= 1;
        if self.in_flight == 0 {
            self.unclaimed.clear();
        }
    }
}

pub struct WatchManager {
    process: Arc<dyn DebugProcess>,
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

impl WatchManager {
    pub fn new(process: Arc<dyn DebugProcess>) -> Self {
        Self {
            process,
            next_id: AtomicU64::new(1),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Arms a watch for `class_name` (binary or descriptor form).
    ///
    /// Fails with `HostUnavailable` if the process refuses the request; no
    /// watch is registered in that case. If the class is prepared before the
    /// host hands back the request id, the requestor runs on this thread and
    /// the returned handle is already [`WatchState::Fired`].
    pub fn create_watch(
        &self,
        class_name: &str,
        requestor: impl ClassPrepareRequestor + 'static,
    ) -> Result<WatchHandle> {
        self.create_watch_arc(class_name, Arc::new(requestor))
    }

    pub fn create_watch_arc(
        &self,
        class_name: &str,
        requestor: Arc<dyn ClassPrepareRequestor>,
    ) -> Result<WatchHandle> {
        let class_name = names::binary_name(class_name)
            .ok_or_else(|| NoMappingReason::InvalidTypeName(class_name.to_string()))?;

        let epoch = {
            let mut registry = self.registry.lock();
            registry.in_flight += 1;
            registry.detach_epoch
        };
        // No lock is held here: the host may deliver events, including the
        // one for this request, before it returns.
        let requested = self.process.request_class_prepare(&class_name);

        let mut registry = self.registry.lock();
        let request_id = match requested {
            Ok(request_id) => request_id,
            Err(err) => {
                registry.finish_registration();
                return Err(err.into());
            }
        };
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let detached = registry.detach_epoch != epoch;
        let early = if detached {
            None
        } else {
            registry.claim(request_id, &class_name)
        };
        let slot = match (&early, detached) {
            (_, true) => Slot::Cancelled,
            (Some(_), false) => Slot::Fired,
            (None, false) => Slot::Armed(requestor.clone()),
        };
        let watch = Arc::new(Watch {
            id,
            class_name,
            request_id,
            slot: Mutex::new(slot),
        });
        if !detached && early.is_none() {
            registry.armed.insert(id, watch.clone());
        }
        registry.finish_registration();
        drop(registry);

        if detached {
            self.process.clear_class_prepare(request_id);
            tracing::trace!(
                watch = %id,
                class = %watch.class_name,
                "process detached while arming; watch cancelled"
            );
        } else if let Some(event) = early {
            self.process.clear_class_prepare(request_id);
            tracing::trace!(
                watch = %id,
                class = %watch.class_name,
                "class prepared while arming; watch fired"
            );
            requestor.process_class_prepare(&*self.process, &event.type_handle);
        } else {
            tracing::trace!(
                watch = %id,
                class = %watch.class_name,
                request = request_id.0,
                "armed class-prepare watch"
            );
        }
        Ok(WatchHandle { watch })
    }

    /// Cancels an armed watch. Returns `false` (and does nothing) if the watch
    /// already fired or was cancelled.
    pub fn cancel(&self, handle: &WatchHandle) -> bool {
        let watch = &handle.watch;
        if watch.retire(Slot::Cancelled).is_none() {
            return false;
        }
        self.registry.lock().armed.remove(&watch.id);
        self.process.clear_class_prepare(watch.request_id);
        tracing::trace!(
            watch = %watch.id,
            class = %watch.class_name,
            "cancelled class-prepare watch"
        );
        true
    }

    /// Fires every armed watch registered for `event`'s request. Returns the
    /// number of requestors run.
    ///
    /// Requestors run on the calling thread after all registry locks are
    /// released, so they may create or cancel watches themselves. An event
    /// that matches nothing while a registration is waiting on the host is
    /// kept for that registration to claim.
    pub fn dispatch(&self, event: &ClassPrepareEvent) -> usize {
        let prepared = names::binary_name(&event.type_handle.name);
        let matching: Vec<Arc<Watch>> = {
            let mut registry = self.registry.lock();
            let ids: Vec<WatchId> = registry
                .armed
                .values()
                .filter(|watch| {
                    watch.request_id == event.request_id
                        && prepared.as_deref() == Some(watch.class_name.as_str())
                })
                .map(|watch| watch.id)
                .collect();
            let matching: Vec<Arc<Watch>> =
                ids.iter().filter_map(|id| registry.armed.remove(id)).collect();
            if matching.is_empty() && registry.in_flight > 0 {
                registry.unclaimed.push(event.clone());
                tracing::trace!(
                    request = event.request_id.0,
                    class = %event.type_handle.name,
                    "holding class-prepare event for a pending registration"
                );
                return 0;
            }
            matching
        };

        if matching.is_empty() {
            tracing::debug!(
                request = event.request_id.0,
                class = %event.type_handle.name,
                "class-prepare event matches no armed watch"
            );
            return 0;
        }

        let mut fired = 0;
        for watch in matching {
            let Some(requestor) = watch.retire(Slot::Fired) else {
                continue;
            };
            self.process.clear_class_prepare(watch.request_id);
            tracing::trace!(
                watch = %watch.id,
                class = %watch.class_name,
                "class-prepare watch fired"
            );
            requestor.process_class_prepare(&*self.process, &event.type_handle);
            fired += 1;
        }
        fired
    }

    /// Cancels every armed watch, e.g. when the debugger detaches.
    /// Registrations still waiting on the host end up cancelled as well.
    pub fn cancel_all(&self) -> usize {
        let drained = {
            let mut registry = self.registry.lock();
            registry.detach_epoch += 1;
            registry.unclaimed.clear();
            std::mem::take(&mut registry.armed)
        };
        let mut cancelled = 0;
        for watch in drained.into_values() {
            if watch.retire(Slot::Cancelled).is_some() {
                self.process.clear_class_prepare(watch.request_id);
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn armed_count(&self) -> usize {
        self.registry.lock().armed.len()
    }
}
