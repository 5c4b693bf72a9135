/// Named rendering parameters.
///
/// Views publish their matrices and targets here, effects read them back by
/// name when they bind. The pipeline core never sees names, only the handles
/// an effect resolves from this table.

use std::fmt;
use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;
use crate::registry::ResourceHandle;

// ===== WELL-KNOWN NAMES =====

pub const WORLD_MATRIX: &str = "WorldMatrix";
pub const VIEW_MATRIX: &str = "ViewMatrix";
pub const PROJ_MATRIX: &str = "ProjMatrix";
pub const VIEW_PROJ_MATRIX: &str = "ViewProjMatrix";
pub const WORLD_VIEW_PROJ_MATRIX: &str = "WorldViewProjMatrix";
/// `(width, height, 1/width, 1/height)` of the active viewport
pub const VIEWPORT_SIZE: &str = "ViewportSize";
/// `(time, 0, 0, 0)`
pub const TIME: &str = "Time";

/// Name of the `index`-th G-buffer shader resource
pub fn gbuffer_target(index: usize) -> String {
    format!("GBufferTarget{}", index)
}

// ===== VALUES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Vector,
    Matrix,
    ShaderResource,
    Sampler,
    ConstantBuffer,
    UnorderedAccess,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::Vector => "vector",
            ParameterKind::Matrix => "matrix",
            ParameterKind::ShaderResource => "shader resource",
            ParameterKind::Sampler => "sampler",
            ParameterKind::ConstantBuffer => "constant buffer",
            ParameterKind::UnorderedAccess => "unordered access view",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Vector(Vec4),
    Matrix(Mat4),
    ShaderResource(ResourceHandle),
    Sampler(ResourceHandle),
    ConstantBuffer(ResourceHandle),
    UnorderedAccess(ResourceHandle),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Vector(_) => ParameterKind::Vector,
            ParameterValue::Matrix(_) => ParameterKind::Matrix,
            ParameterValue::ShaderResource(_) => ParameterKind::ShaderResource,
            ParameterValue::Sampler(_) => ParameterKind::Sampler,
            ParameterValue::ConstantBuffer(_) => ParameterKind::ConstantBuffer,
            ParameterValue::UnorderedAccess(_) => ParameterKind::UnorderedAccess,
        }
    }

    /// Handle carried by a resource-typed value
    pub fn handle(&self) -> Option<ResourceHandle> {
        match *self {
            ParameterValue::ShaderResource(h)
            | ParameterValue::Sampler(h)
            | ParameterValue::ConstantBuffer(h)
            | ParameterValue::UnorderedAccess(h) => Some(h),
            _ => None,
        }
    }

    /// Bytes written into a constant buffer (16 for vectors, 64 for matrices)
    pub fn constant_bytes(&self) -> Option<&[u8]> {
        match self {
            ParameterValue::Vector(v) => Some(bytemuck::bytes_of(v)),
            ParameterValue::Matrix(m) => Some(bytemuck::bytes_of(m)),
            _ => None,
        }
    }
}

impl From<Vec4> for ParameterValue {
    fn from(v: Vec4) -> Self {
        ParameterValue::Vector(v)
    }
}

impl From<Mat4> for ParameterValue {
    fn from(m: Mat4) -> Self {
        ParameterValue::Matrix(m)
    }
}

// ===== PARAMETER MANAGER =====

/// Name to value table shared by the views and effects of a frame
#[derive(Debug, Clone, Default)]
pub struct ParameterManager {
    values: FxHashMap<String, ParameterValue>,
}

impl ParameterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any previous value of any kind
    pub fn set(&mut self, name: &str, value: ParameterValue) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    pub fn set_vector(&mut self, name: &str, value: Vec4) {
        self.set(name, ParameterValue::Vector(value));
    }

    pub fn set_matrix(&mut self, name: &str, value: Mat4) {
        self.set(name, ParameterValue::Matrix(value));
    }

    pub fn set_shader_resource(&mut self, name: &str, view: ResourceHandle) {
        self.set(name, ParameterValue::ShaderResource(view));
    }

    pub fn set_sampler(&mut self, name: &str, sampler: ResourceHandle) {
        self.set(name, ParameterValue::Sampler(sampler));
    }

    pub fn set_constant_buffer(&mut self, name: &str, buffer: ResourceHandle) {
        self.set(name, ParameterValue::ConstantBuffer(buffer));
    }

    pub fn set_unordered_access(&mut self, name: &str, view: ResourceHandle) {
        self.set(name, ParameterValue::UnorderedAccess(view));
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn vector(&self, name: &str) -> Option<Vec4> {
        match self.values.get(name) {
            Some(ParameterValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn matrix(&self, name: &str) -> Option<Mat4> {
        match self.values.get(name) {
            Some(ParameterValue::Matrix(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParameterValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
#[path = "parameters_tests.rs"]
mod tests;
