//! Translation between runtime locations and smali positions.
//!
//! Runtime code indices count 16-bit code units; smali instruction offsets
//! count bytes. The two are related by [`PositionConfig::code_unit_bytes`].
//!
//! When the index reports several classes or methods for one name, the first
//! candidate still present in the store wins. Ambiguity is logged, never an
//! error.

use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, PositionConfig};
use crate::error::{NoMappingReason, Result};
use crate::host::{DebugProcess, RuntimeLocation, RuntimeTypeHandle};
use crate::index::{ClassSymbol, SearchScope, SymbolIndex};
use crate::model::{ArtifactModel, ArtifactView, NodeRef};
use crate::names;
use crate::position::ArtifactPosition;
use crate::resolver::{class_at, class_binary_name};

#[derive(Clone)]
pub struct LocationTranslator {
    model: Arc<dyn ArtifactModel>,
    index: Arc<dyn SymbolIndex>,
    process: Arc<dyn DebugProcess>,
    config: PositionConfig,
}

/// Artifact-side answer for a position, computed under one read scope.
#[derive(Debug)]
struct CodeTarget {
    class_name: String,
    method_name: String,
    method_descriptor: String,
    code_index: u64,
}

impl LocationTranslator {
    /// Fails if `config` does not pass [`PositionConfig::validate`].
    pub fn new(
        model: Arc<dyn ArtifactModel>,
        index: Arc<dyn SymbolIndex>,
        process: Arc<dyn DebugProcess>,
        config: PositionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            model,
            index,
            process,
            config,
        })
    }

    pub fn config(&self) -> &PositionConfig {
        &self.config
    }

    /// Position of the instruction executing at `loc`.
    pub fn to_artifact_position(&self, loc: &RuntimeLocation) -> Result<ArtifactPosition> {
        let class_name = names::binary_name(&loc.declaring_type)
            .ok_or_else(|| NoMappingReason::InvalidTypeName(loc.declaring_type.clone()))?;

        let view = self.model.read();
        let class = self.first_class(&*view, &class_name)?;

        let key = loc.method_name_and_proto();
        let methods = self
            .index
            .methods_by_name_and_proto(&key, SearchScope::File(class.file))
            .into_iter()
            .filter(|sym| {
                view.file(sym.file)
                    .and_then(|file| file.smali_class())
                    .and_then(|class| class.method(sym.method))
                    .is_some_and(|method| method.name_and_proto() == key)
            });
        let method_sym = pick_first(methods, "method", &key).ok_or_else(|| {
            NoMappingReason::UnknownMethod {
                class: class_name.clone(),
                method: key.clone(),
            }
        })?;

        let file = view
            .file(method_sym.file)
            .ok_or(NoMappingReason::MissingFile(method_sym.file))?;
        let method = file
            .smali_class()
            .and_then(|class| class.method(method_sym.method))
            .ok_or_else(|| NoMappingReason::UnknownMethod {
                class: class_name.clone(),
                method: key.clone(),
            })?;

        let code_offset = loc
            .code_index
            .checked_mul(u64::from(self.config.code_unit_bytes))
            .ok_or_else(|| NoMappingReason::NoInstruction {
                method: key.clone(),
                code_offset: u64::MAX,
            })?;
        let (index, insn) = method.instruction_at_code_offset(code_offset).ok_or_else(|| {
            NoMappingReason::NoInstruction {
                method: key.clone(),
                code_offset,
            }
        })?;

        Ok(ArtifactPosition {
            file: method_sym.file,
            offset: insn.range.start,
            line: file.lines().line_of(insn.range.start),
            element: NodeRef::Instruction {
                method: method_sym.method,
                index,
            },
        })
    }

    /// Runtime locations for `pos` in every loaded type backing its file.
    ///
    /// An empty result means the position is inside a smali class but maps to
    /// no code (a field, the end of a method) or the class is not loaded yet.
    pub fn to_runtime_locations(&self, pos: &ArtifactPosition) -> Result<Vec<RuntimeLocation>> {
        let Some(target) = self.code_target(pos)? else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for ty in self.process.classes_by_name(&target.class_name)? {
            out.extend(self.location_in_type(&ty, &target)?);
        }
        Ok(out)
    }

    /// Runtime locations for `pos` inside one specific loaded type.
    pub fn locations_for_type(
        &self,
        ty: &RuntimeTypeHandle,
        pos: &ArtifactPosition,
    ) -> Result<Vec<RuntimeLocation>> {
        let Some(target) = self.code_target(pos)? else {
            return Ok(Vec::new());
        };
        Ok(self.location_in_type(ty, &target)?.into_iter().collect())
    }

    fn code_target(&self, pos: &ArtifactPosition) -> Result<Option<CodeTarget>> {
        let view = self.model.read();
        let class = class_at(&*view, pos)?;
        let class_name = class_binary_name(class)?;

        let Some((_, method)) = class.method_containing(pos.offset) else {
            tracing::debug!(
                class = %class_name,
                offset = pos.offset,
                "position is outside any method"
            );
            return Ok(None);
        };
        let Some((_, insn)) = method.instruction_at_or_after(pos.offset) else {
            tracing::debug!(
                class = %class_name,
                method = %method.name_and_proto(),
                offset = pos.offset,
                "position is after the last instruction"
            );
            return Ok(None);
        };

        Ok(Some(CodeTarget {
            class_name,
            method_name: method.name.clone(),
            method_descriptor: method.descriptor.clone(),
            code_index: insn.code_offset / u64::from(self.config.code_unit_bytes),
        }))
    }

    fn location_in_type(
        &self,
        ty: &RuntimeTypeHandle,
        target: &CodeTarget,
    ) -> Result<Option<RuntimeLocation>> {
        if names::binary_name(&ty.name).as_deref() != Some(target.class_name.as_str()) {
            tracing::debug!(
                loaded = %ty.name,
                class = %target.class_name,
                "loaded type does not back this smali class"
            );
            return Ok(None);
        }
        if self.config.verify_runtime_methods
            && !self
                .process
                .has_method(ty, &target.method_name, &target.method_descriptor)?
        {
            tracing::debug!(
                class = %ty.name,
                method = %format_args!("{}{}", target.method_name, target.method_descriptor),
                "loaded type does not declare method"
            );
            return Ok(None);
        }

        Ok(Some(RuntimeLocation {
            type_id: ty.id,
            declaring_type: ty.name.clone(),
            method_name: target.method_name.clone(),
            method_descriptor: target.method_descriptor.clone(),
            code_index: target.code_index,
        }))
    }

    fn first_class(&self, view: &dyn ArtifactView, class_name: &str) -> Result<ClassSymbol> {
        let candidates = self
            .index
            .classes_by_name(class_name, SearchScope::Project)
            .into_iter()
            .filter(|sym| {
                view.file(sym.file)
                    .and_then(|file| file.smali_class())
                    .and_then(|class| class.qualified_name())
                    .is_some_and(|name| name == class_name)
            });
        pick_first(candidates, "class", class_name)
            .ok_or_else(|| NoMappingReason::UnknownType(class_name.to_string()).into())
    }
}

fn pick_first<T: fmt::Debug>(
    mut candidates: impl Iterator<Item = T>,
    kind: &str,
    name: &str,
) -> Option<T> {
    let first = candidates.next()?;
    let rest = candidates.count();
    if rest > 0 {
        tracing::debug!(
            symbol_kind = kind,
            symbol = name,
            candidates = rest + 1,
            chosen = ?first,
            "ambiguous smali symbol; using first candidate"
        );
    }
    Some(first)
}
