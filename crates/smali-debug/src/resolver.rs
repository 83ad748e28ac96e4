use std::sync::Arc;

use crate::error::{NoMappingReason, Result};
use crate::host::{DebugProcess, RuntimeTypeHandle};
use crate::model::{ArtifactModel, ArtifactView, SmaliClass};
use crate::names;
use crate::position::ArtifactPosition;

/// Finds the loaded runtime types backing a smali file.
#[derive(Clone)]
pub struct TypeResolver {
    model: Arc<dyn ArtifactModel>,
    process: Arc<dyn DebugProcess>,
}

impl TypeResolver {
    pub fn new(model: Arc<dyn ArtifactModel>, process: Arc<dyn DebugProcess>) -> Self {
        Self { model, process }
    }

    /// Binary name of the class defined by the file `pos` points into.
    pub fn class_name_at(&self, pos: &ArtifactPosition) -> Result<String> {
        let view = self.model.read();
        let class = class_at(&*view, pos)?;
        class_binary_name(class)
    }

    /// Every loaded type whose name is exactly the class name at `pos`.
    pub fn all_classes(&self, pos: &ArtifactPosition) -> Result<Vec<RuntimeTypeHandle>> {
        let name = self.class_name_at(pos)?;
        let mut classes = self.process.classes_by_name(&name)?;
        classes.retain(|ty| names::binary_name(&ty.name).as_deref() == Some(name.as_str()));
        tracing::trace!(class = %name, loaded = classes.len(), "resolved loaded classes");
        Ok(classes)
    }
}

/// The class of the smali file `pos` points into.
pub(crate) fn class_at<'a>(
    view: &'a dyn ArtifactView,
    pos: &ArtifactPosition,
) -> Result<&'a SmaliClass> {
    let file = view
        .file(pos.file)
        .ok_or(NoMappingReason::MissingFile(pos.file))?;
    let class = file.smali_class().ok_or(NoMappingReason::NotDisassembly)?;
    if !class.range.contains(pos.offset) {
        return Err(NoMappingReason::OutsideClass {
            file: pos.file,
            offset: pos.offset,
        }
        .into());
    }
    Ok(class)
}

pub(crate) fn class_binary_name(class: &SmaliClass) -> Result<String> {
    Ok(class
        .qualified_name()
        .ok_or_else(|| NoMappingReason::InvalidTypeName(class.name.clone()))?)
}
