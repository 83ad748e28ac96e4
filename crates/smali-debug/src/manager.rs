use std::sync::Arc;

use crate::config::{ConfigError, PositionConfig};
use crate::error::Result;
use crate::host::{DebugProcess, RuntimeLocation, RuntimeTypeHandle};
use crate::index::SymbolIndex;
use crate::model::ArtifactModel;
use crate::position::ArtifactPosition;
use crate::resolver::TypeResolver;
use crate::translator::LocationTranslator;
use crate::watch::{ClassPrepareRequestor, WatchHandle, WatchManager};

/// Runs when a watch armed by [`PositionManager::create_prepare_request`]
/// fires, with the position the watch was created for.
///
/// The default forwards the event to the caller's requestor unchanged. A
/// debugger front end can override it to act on the position first, e.g. to
/// place the deferred breakpoint before the requestor runs.
pub trait ClassPrepareHook: Send + Sync {
    fn on_class_prepare(
        &self,
        process: &dyn DebugProcess,
        ty: &RuntimeTypeHandle,
        _pos: &ArtifactPosition,
        requestor: &dyn ClassPrepareRequestor,
    ) {
        requestor.process_class_prepare(process, ty);
    }
}

/// The default [`ClassPrepareHook`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardToRequestor;

impl ClassPrepareHook for ForwardToRequestor {}

/// Position manager for one debug session.
///
/// Wires the artifact store, the symbol index and the debugged process into
/// the four calls a debugger engine makes: where is this stop, which types
/// back this file, where can this line break, and tell me when it loads.
pub struct PositionManager {
    translator: LocationTranslator,
    resolver: TypeResolver,
    watches: WatchManager,
    hook: Arc<dyn ClassPrepareHook>,
}

impl PositionManager {
    pub fn new(
        model: Arc<dyn ArtifactModel>,
        index: Arc<dyn SymbolIndex>,
        process: Arc<dyn DebugProcess>,
        config: PositionConfig,
    ) -> Result<Self, ConfigError> {
        let translator = LocationTranslator::new(model.clone(), index, process.clone(), config)?;
        Ok(Self {
            translator,
            resolver: TypeResolver::new(model, process.clone()),
            watches: WatchManager::new(process),
            hook: Arc::new(ForwardToRequestor),
        })
    }

    /// Replaces the hook run by watches created from now on.
    pub fn with_hook(mut self, hook: impl ClassPrepareHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Smali position shown to the user when the process stops at `loc`.
    pub fn source_position(&self, loc: &RuntimeLocation) -> Result<ArtifactPosition> {
        self.translator.to_artifact_position(loc)
    }

    pub fn all_classes(&self, pos: &ArtifactPosition) -> Result<Vec<RuntimeTypeHandle>> {
        self.resolver.all_classes(pos)
    }

    /// Locations of `pos` inside the loaded type `ty`.
    pub fn locations_of_line(
        &self,
        ty: &RuntimeTypeHandle,
        pos: &ArtifactPosition,
    ) -> Result<Vec<RuntimeLocation>> {
        self.translator.locations_for_type(ty, pos)
    }

    /// Locations of `pos` across every loaded type backing its file.
    pub fn runtime_locations(&self, pos: &ArtifactPosition) -> Result<Vec<RuntimeLocation>> {
        self.translator.to_runtime_locations(pos)
    }

    /// Arms a watch that runs `requestor` once the class defined by `pos`'s
    /// file is prepared. The event goes through the manager's
    /// [`ClassPrepareHook`] first.
    pub fn create_prepare_request(
        &self,
        pos: &ArtifactPosition,
        requestor: impl ClassPrepareRequestor + 'static,
    ) -> Result<WatchHandle> {
        let class_name = self.resolver.class_name_at(pos)?;
        let hook = self.hook.clone();
        let pos = pos.clone();
        self.watches.create_watch(
            &class_name,
            move |process: &dyn DebugProcess, ty: &RuntimeTypeHandle| {
                hook.on_class_prepare(process, ty, &pos, &requestor);
            },
        )
    }

    pub fn watches(&self) -> &WatchManager {
        &self.watches
    }

    pub fn translator(&self) -> &LocationTranslator {
        &self.translator
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }
}
