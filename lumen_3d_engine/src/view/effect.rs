/// Rendering effect.
///
/// An Effect is the binding contract between named parameters and pipeline
/// slots: shader programs per stage, optional fixed-function states, resource
/// bindings looked up by parameter name, and constant buffer layouts filled
/// from vector/matrix parameters.
///
/// Effects hold handles only. Views and draw items share them through `Arc`.

use std::collections::HashSet;
use slotmap::Key;
use crate::device::ShaderStage;
use crate::error::{Error, Result};
use crate::pipeline::{
    PipelineManager, StageKind, stage_error,
    CONSTANT_BUFFER_SLOTS, SHADER_RESOURCE_SLOTS, SAMPLER_SLOTS, UNORDERED_ACCESS_SLOTS,
};
use crate::registry::{ResourceRegistry, ResourceHandle};
use crate::view::parameters::{ParameterManager, ParameterKind};
use crate::engine_bail;

// ===== BINDINGS =====

/// Kind of slot a resource binding targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    ConstantBuffer,
    ShaderResource,
    Sampler,
    UnorderedAccess,
}

impl BindingKind {
    /// Parameter kind this binding reads
    pub fn parameter_kind(&self) -> ParameterKind {
        match self {
            BindingKind::ConstantBuffer => ParameterKind::ConstantBuffer,
            BindingKind::ShaderResource => ParameterKind::ShaderResource,
            BindingKind::Sampler => ParameterKind::Sampler,
            BindingKind::UnorderedAccess => ParameterKind::UnorderedAccess,
        }
    }

    fn capacity(&self, stage: ShaderStage) -> usize {
        match self {
            BindingKind::ConstantBuffer => CONSTANT_BUFFER_SLOTS,
            BindingKind::ShaderResource => SHADER_RESOURCE_SLOTS,
            BindingKind::Sampler => SAMPLER_SLOTS,
            BindingKind::UnorderedAccess if stage == ShaderStage::Compute => UNORDERED_ACCESS_SLOTS,
            BindingKind::UnorderedAccess => 0,
        }
    }
}

/// Slot fed from a named resource parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub stage: ShaderStage,
    pub slot: usize,
    pub kind: BindingKind,
    pub parameter: String,
}

impl ResourceBinding {
    pub fn new(stage: ShaderStage, slot: usize, kind: BindingKind, parameter: &str) -> Self {
        Self { stage, slot, kind, parameter: parameter.to_string() }
    }
}

/// Vector or matrix parameter placed at a byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantField {
    pub parameter: String,
    pub offset: usize,
}

/// Constant buffer owned by an effect, refilled on every bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBufferLayout {
    pub stage: ShaderStage,
    pub slot: usize,
    pub buffer: ResourceHandle,
    pub size: usize,
    pub fields: Vec<ConstantField>,
}

impl ConstantBufferLayout {
    pub fn new(stage: ShaderStage, slot: usize, buffer: ResourceHandle, size: usize) -> Self {
        Self { stage, slot, buffer, size, fields: Vec::new() }
    }

    /// Add a field (builder style)
    pub fn field(mut self, parameter: &str, offset: usize) -> Self {
        self.fields.push(ConstantField { parameter: parameter.to_string(), offset });
        self
    }
}

// ===== DESCRIPTOR =====

/// Effect creation descriptor. Null handles mean "default state".
#[derive(Debug, Clone, Default)]
pub struct EffectDesc {
    pub name: String,
    pub shaders: Vec<(ShaderStage, ResourceHandle)>,
    pub rasterizer_state: ResourceHandle,
    pub blend_state: ResourceHandle,
    pub depth_stencil_state: ResourceHandle,
    pub stencil_ref: u32,
    pub bindings: Vec<ResourceBinding>,
    pub constant_buffers: Vec<ConstantBufferLayout>,
}

// ===== EFFECT =====

#[derive(Debug, Clone)]
pub struct Effect {
    name: String,
    shaders: [ResourceHandle; 6],
    rasterizer_state: ResourceHandle,
    blend_state: ResourceHandle,
    depth_stencil_state: ResourceHandle,
    stencil_ref: u32,
    bindings: Vec<ResourceBinding>,
    constant_buffers: Vec<ConstantBufferLayout>,
}

impl Effect {
    /// Validate a descriptor and build the effect
    pub fn new(desc: EffectDesc) -> Result<Self> {
        let mut shaders = [ResourceHandle::default(); 6];
        for (stage, shader) in &desc.shaders {
            let slot = &mut shaders[stage.index()];
            if !slot.is_null() {
                engine_bail!("lumen3d::Effect",
                    "Effect '{}': two {:?} shaders", desc.name, stage);
            }
            *slot = *shader;
        }

        let mut used = HashSet::new();
        let constant_slots = desc
            .constant_buffers
            .iter()
            .map(|cb| (cb.stage, cb.slot, BindingKind::ConstantBuffer));
        let binding_slots = desc.bindings.iter().map(|b| (b.stage, b.slot, b.kind));
        for (stage, slot, kind) in constant_slots.chain(binding_slots) {
            let capacity = kind.capacity(stage);
            if slot >= capacity {
                engine_bail!("lumen3d::Effect",
                    "Effect '{}': {:?} slot {} out of range on {:?} (capacity {})",
                    desc.name, kind, slot, stage, capacity);
            }
            if !used.insert((stage, slot, kind)) {
                engine_bail!("lumen3d::Effect",
                    "Effect '{}': {:?} slot {} on {:?} bound twice", desc.name, kind, slot, stage);
            }
        }

        for cb in &desc.constant_buffers {
            if cb.size == 0 || cb.size % 16 != 0 {
                engine_bail!("lumen3d::Effect",
                    "Effect '{}': constant buffer size {} is not a positive multiple of 16",
                    desc.name, cb.size);
            }
            for field in &cb.fields {
                if field.offset % 4 != 0 || field.offset >= cb.size {
                    engine_bail!("lumen3d::Effect",
                        "Effect '{}': field '{}' at offset {} does not fit a {} byte buffer",
                        desc.name, field.parameter, field.offset, cb.size);
                }
            }
        }

        Ok(Self {
            name: desc.name,
            shaders,
            rasterizer_state: desc.rasterizer_state,
            blend_state: desc.blend_state,
            depth_stencil_state: desc.depth_stencil_state,
            stencil_ref: desc.stencil_ref,
            bindings: desc.bindings,
            constant_buffers: desc.constant_buffers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shader for `stage`, null if the effect leaves the stage empty
    pub fn shader(&self, stage: ShaderStage) -> ResourceHandle {
        self.shaders[stage.index()]
    }

    pub fn bindings(&self) -> &[ResourceBinding] {
        &self.bindings
    }

    pub fn constant_buffers(&self) -> &[ConstantBufferLayout] {
        &self.constant_buffers
    }

    /// Write this effect into the pipeline's desired state.
    ///
    /// Every shader stage is written (null for stages the effect does not
    /// use) so nothing leaks from a previous effect. Constant buffers are
    /// refilled from `params` and uploaded immediately.
    pub fn bind(
        &self,
        pipeline: &mut PipelineManager,
        registry: &ResourceRegistry,
        params: &ParameterManager,
    ) -> Result<()> {
        for stage in ShaderStage::ALL {
            pipeline.shader_stage_mut(stage).set_shader(self.shaders[stage.index()]);
        }
        pipeline.rasterizer_mut().set_rasterizer_state(self.rasterizer_state);
        let om = pipeline.output_merger_mut();
        om.set_blend_state(self.blend_state, [1.0; 4], u32::MAX);
        om.set_depth_stencil_state(self.depth_stencil_state, self.stencil_ref);

        for layout in &self.constant_buffers {
            let kind = StageKind::from(layout.stage);
            let data = fill_constants(layout, params)?;
            pipeline
                .update_buffer(registry, layout.buffer, &data)
                .map_err(|err| stage_error(kind, Some(layout.slot), err))?;
            pipeline
                .shader_stage_mut(layout.stage)
                .set_constant_buffer(layout.slot, layout.buffer)?;
        }

        for binding in &self.bindings {
            let handle = lookup_handle(binding, params)?;
            let stage = pipeline.shader_stage_mut(binding.stage);
            match binding.kind {
                BindingKind::ConstantBuffer => stage.set_constant_buffer(binding.slot, handle),
                BindingKind::ShaderResource => stage.set_shader_resource(binding.slot, handle),
                BindingKind::Sampler => stage.set_sampler(binding.slot, handle),
                BindingKind::UnorderedAccess => stage.set_unordered_access_view(binding.slot, handle),
            }?;
        }
        Ok(())
    }
}

fn missing(stage: ShaderStage, slot: usize, reason: String) -> Error {
    Error::PipelineState { stage: StageKind::from(stage), slot: Some(slot), reason }
}

fn fill_constants(layout: &ConstantBufferLayout, params: &ParameterManager) -> Result<Vec<u8>> {
    let mut data = vec![0u8; layout.size];
    for field in &layout.fields {
        let value = params.get(&field.parameter).ok_or_else(|| {
            missing(layout.stage, layout.slot, format!("parameter '{}' is not set", field.parameter))
        })?;
        let bytes = value.constant_bytes().ok_or_else(|| {
            missing(layout.stage, layout.slot, format!(
                "parameter '{}' is a {}, not a vector or matrix", field.parameter, value.kind()
            ))
        })?;
        let end = field.offset + bytes.len();
        if end > layout.size {
            return Err(missing(layout.stage, layout.slot, format!(
                "parameter '{}' ends at byte {}, past the {} byte buffer",
                field.parameter, end, layout.size
            )));
        }
        data[field.offset..end].copy_from_slice(bytes);
    }
    Ok(data)
}

fn lookup_handle(binding: &ResourceBinding, params: &ParameterManager) -> Result<ResourceHandle> {
    let expected = binding.kind.parameter_kind();
    match params.get(&binding.parameter) {
        Some(value) if value.kind() == expected => Ok(value.handle().unwrap_or_default()),
        Some(value) => Err(missing(binding.stage, binding.slot, format!(
            "parameter '{}' is a {}, expected a {}", binding.parameter, value.kind(), expected
        ))),
        None => Err(missing(binding.stage, binding.slot, format!(
            "parameter '{}' is not set", binding.parameter
        ))),
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
