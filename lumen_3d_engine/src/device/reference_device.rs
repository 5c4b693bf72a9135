/// Reference (software) graphics device.
///
/// A CPU-side device that validates descriptors and bindings the way a
/// driver would and records every context call into a shared
/// `DeviceCallLog`. It rasterizes nothing. The renderer falls back to it when
/// no hardware device can be created, and tools and tests use the call log
/// to observe exactly which API calls the pipeline issued.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::device::{
    GraphicsDevice, DeviceContext, DeviceFactory, CreatedDevice,
    NativeId, NativeVertexBuffer, DriverType, FeatureLevel, ContextKind,
    BufferDesc, Texture2dDesc, ViewDesc, ViewKind, SamplerDesc, RasterizerDesc,
    BlendDesc, DepthStencilDesc, ShaderDesc, InputLayoutDesc, SwapChainDesc,
    ShaderStage, Viewport, ScissorRect, PrimitiveTopology, IndexFormat,
    ClearFlags, BindFlags, Usage, Format,
};
use crate::{engine_debug, engine_info, engine_warn};

/// Largest constant buffer the device accepts, in bytes
pub const MAX_CONSTANT_BUFFER_SIZE: u64 = 65_536;

/// Largest swap chain buffer count
pub const MAX_SWAP_CHAIN_BUFFERS: u32 = 16;

// ============================================================================
// Call log
// ============================================================================

/// A device or context call observed by the reference device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    SetVertexBuffers { start: u32, count: u32 },
    SetIndexBuffer { format: IndexFormat },
    SetInputLayout,
    SetPrimitiveTopology(PrimitiveTopology),
    SetShader { stage: ShaderStage },
    SetConstantBuffers { stage: ShaderStage, start: u32, count: u32 },
    SetShaderResources { stage: ShaderStage, start: u32, count: u32 },
    SetSamplers { stage: ShaderStage, start: u32, count: u32 },
    SetUnorderedAccessViews { start: u32, count: u32 },
    SetRasterizerState,
    SetViewports { count: u32 },
    SetScissorRects { count: u32 },
    SetRenderTargets { start: u32, count: u32 },
    SetDepthStencilView,
    SetBlendState,
    SetDepthStencilState { stencil_ref: u32 },
    ClearRenderTarget { color: [f32; 4] },
    ClearDepthStencil { flags: ClearFlags },
    UpdateSubresource { bytes: usize },
    Draw { vertex_count: u32, start_vertex: u32 },
    DrawIndexed { index_count: u32, start_index: u32, base_vertex: i32 },
    Dispatch { x: u32, y: u32, z: u32 },
    ClearState,
    FinishCommandList,
    ExecuteCommandList,
    Present { sync_interval: u32 },
    Release(NativeId),
}

impl DeviceCall {
    /// Whether this call changes a pipeline binding
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            DeviceCall::SetVertexBuffers { .. }
                | DeviceCall::SetIndexBuffer { .. }
                | DeviceCall::SetInputLayout
                | DeviceCall::SetPrimitiveTopology(_)
                | DeviceCall::SetShader { .. }
                | DeviceCall::SetConstantBuffers { .. }
                | DeviceCall::SetShaderResources { .. }
                | DeviceCall::SetSamplers { .. }
                | DeviceCall::SetUnorderedAccessViews { .. }
                | DeviceCall::SetRasterizerState
                | DeviceCall::SetViewports { .. }
                | DeviceCall::SetScissorRects { .. }
                | DeviceCall::SetRenderTargets { .. }
                | DeviceCall::SetDepthStencilView
                | DeviceCall::SetBlendState
                | DeviceCall::SetDepthStencilState { .. }
        )
    }
}

/// Who issued a recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSource {
    /// The device itself (present, release)
    Device,
    /// A context; 0 is the immediate context, deferred contexts count up
    Context(u32),
}

/// Immediate context id in `CallSource::Context`
pub const IMMEDIATE_CONTEXT: u32 = 0;

/// A call together with its source
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub source: CallSource,
    pub call: DeviceCall,
}

/// Shared, cloneable record of every call made on reference devices
#[derive(Debug, Clone, Default)]
pub struct DeviceCallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl DeviceCallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, source: CallSource, call: DeviceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall { source, call });
    }

    /// Snapshot of all recorded calls
    pub fn records(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot of all recorded calls, without their source
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.records().into_iter().map(|r| r.call).collect()
    }

    /// Calls issued by one context
    pub fn calls_for(&self, context: u32) -> Vec<DeviceCall> {
        self.records()
            .into_iter()
            .filter(|r| r.source == CallSource::Context(context))
            .map(|r| r.call)
            .collect()
    }

    /// Number of binding calls recorded so far
    pub fn binding_count(&self) -> usize {
        self.count(DeviceCall::is_binding)
    }

    /// Number of objects released so far
    pub fn release_count(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::Release(_)))
    }

    /// Number of calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| predicate(&r.call))
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every recorded call
    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ============================================================================
// Object table
// ============================================================================

#[derive(Debug, Clone)]
enum RefObject {
    Buffer(BufferDesc),
    Texture(Texture2dDesc),
    View { kind: ViewKind, format: Format },
    Sampler,
    Rasterizer,
    Blend,
    DepthStencil,
    Shader(ShaderStage),
    InputLayout,
    SwapChain { desc: SwapChainDesc, back_buffer: Option<NativeId> },
    CommandList,
}

impl RefObject {
    fn label(&self) -> &'static str {
        match self {
            RefObject::Buffer(_) => "buffer",
            RefObject::Texture(_) => "texture",
            RefObject::View { .. } => "view",
            RefObject::Sampler => "sampler state",
            RefObject::Rasterizer => "rasterizer state",
            RefObject::Blend => "blend state",
            RefObject::DepthStencil => "depth-stencil state",
            RefObject::Shader(_) => "shader",
            RefObject::InputLayout => "input layout",
            RefObject::SwapChain { .. } => "swap chain",
            RefObject::CommandList => "command list",
        }
    }
}

struct ReferenceShared {
    driver_type: DriverType,
    feature_level: FeatureLevel,
    objects: Mutex<FxHashMap<NativeId, RefObject>>,
    next_id: AtomicU64,
    next_context: AtomicU32,
    removed: AtomicBool,
    swap_chains_rejected: AtomicBool,
    log: DeviceCallLog,
}

impl ReferenceShared {
    fn insert(&self, object: RefObject) -> NativeId {
        let id = NativeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, object);
        id
    }

    fn get(&self, id: NativeId) -> Option<RefObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn check_alive(&self) -> Result<()> {
        if self.removed.load(Ordering::Acquire) {
            return Err(Error::DeviceLost(format!(
                "{} device was removed",
                self.driver_type
            )));
        }
        Ok(())
    }

    /// Validate an optional bound object against an expected kind
    fn check_bound(
        &self,
        id: Option<NativeId>,
        expected: &str,
        accepts: impl Fn(&RefObject) -> bool,
    ) -> Result<()> {
        let Some(id) = id else { return Ok(()) };
        match self.get(id) {
            None => Err(Error::BackendError(format!(
                "{} {:?} is not a live object",
                expected, id
            ))),
            Some(object) if !accepts(&object) => Err(Error::InvalidResource(format!(
                "{:?} is a {}, expected {}",
                id,
                object.label(),
                expected
            ))),
            Some(_) => Ok(()),
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        if self.feature_level >= FeatureLevel::LEVEL_11_0 {
            16_384
        } else if self.feature_level >= FeatureLevel::LEVEL_10_0 {
            8_192
        } else {
            2_048
        }
    }
}

fn rejected(reason: String) -> Error {
    Error::ResourceCreation(reason)
}

// ============================================================================
// ReferenceDevice
// ============================================================================

/// Software device. Cheap to clone; clones share the same object table.
#[derive(Clone)]
pub struct ReferenceDevice {
    shared: Arc<ReferenceShared>,
}

impl ReferenceDevice {
    /// Create a device and its immediate context
    ///
    /// # Errors
    ///
    /// `InitializationFailed` for `DriverType::Hardware` (this device has no
    /// GPU backend) or an unknown feature level.
    pub fn create(
        driver_type: DriverType,
        feature_level: FeatureLevel,
        log: DeviceCallLog,
    ) -> Result<(ReferenceDevice, ReferenceContext)> {
        if driver_type == DriverType::Hardware {
            return Err(Error::InitializationFailed(
                "reference device cannot drive hardware".to_string(),
            ));
        }
        if !feature_level.is_known() {
            return Err(Error::InitializationFailed(format!(
                "unsupported feature level {}",
                feature_level
            )));
        }

        let shared = Arc::new(ReferenceShared {
            driver_type,
            feature_level,
            objects: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
            next_context: AtomicU32::new(IMMEDIATE_CONTEXT + 1),
            removed: AtomicBool::new(false),
            swap_chains_rejected: AtomicBool::new(false),
            log,
        });

        engine_info!("lumen3d::ReferenceDevice",
            "Created {} device at feature level {}", driver_type, feature_level);

        let context = ReferenceContext {
            shared: Arc::clone(&shared),
            kind: ContextKind::Immediate,
            id: IMMEDIATE_CONTEXT,
            recorded: 0,
            bound: FxHashMap::default(),
        };
        Ok((ReferenceDevice { shared }, context))
    }

    /// Call log shared by this device and its contexts
    pub fn call_log(&self) -> &DeviceCallLog {
        &self.shared.log
    }

    /// Number of live device objects
    pub fn live_object_count(&self) -> usize {
        self.shared.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether `id` names a live device object
    pub fn is_live(&self, id: NativeId) -> bool {
        self.shared.get(id).is_some()
    }

    /// Mark the device as removed; every later call reports `DeviceLost`
    pub fn simulate_device_removed(&self) {
        engine_warn!("lumen3d::ReferenceDevice", "Simulating device removal");
        self.shared.removed.store(true, Ordering::Release);
    }

    /// Make every later `create_swap_chain` fail, as on an adapter with no
    /// output attached
    pub fn reject_swap_chains(&self) {
        self.shared.swap_chains_rejected.store(true, Ordering::Release);
    }

    fn validate_buffer(&self, desc: &BufferDesc) -> Result<()> {
        if desc.size == 0 {
            return Err(rejected("buffer size is zero".to_string()));
        }
        if desc.bind.is_empty() && desc.usage != Usage::Staging {
            return Err(rejected("buffer has no bind flags".to_string()));
        }
        if desc.bind.intersects(BindFlags::RENDER_TARGET | BindFlags::DEPTH_STENCIL) {
            return Err(rejected("buffers cannot be render or depth targets".to_string()));
        }
        if desc.bind.contains(BindFlags::CONSTANT_BUFFER) {
            if desc.size % 16 != 0 {
                return Err(rejected(format!(
                    "constant buffer size {} is not a multiple of 16",
                    desc.size
                )));
            }
            if desc.size > MAX_CONSTANT_BUFFER_SIZE {
                return Err(rejected(format!(
                    "constant buffer size {} exceeds {}",
                    desc.size, MAX_CONSTANT_BUFFER_SIZE
                )));
            }
        }
        match &desc.initial_data {
            Some(data) if data.len() as u64 > desc.size => Err(rejected(format!(
                "initial data ({} bytes) larger than buffer ({} bytes)",
                data.len(),
                desc.size
            ))),
            None if desc.usage == Usage::Immutable => {
                Err(rejected("immutable buffer without initial data".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn validate_texture(&self, desc: &Texture2dDesc) -> Result<()> {
        let max = self.shared.max_texture_dimension();
        if desc.width == 0 || desc.height == 0 {
            return Err(rejected(format!(
                "texture size {}x{} is empty",
                desc.width, desc.height
            )));
        }
        if desc.width > max || desc.height > max {
            return Err(rejected(format!(
                "texture size {}x{} exceeds {} at feature level {}",
                desc.width, desc.height, max, self.shared.feature_level
            )));
        }
        if desc.mip_levels == 0 || desc.array_size == 0 || desc.sample_count == 0 {
            return Err(rejected("mip levels, array size and sample count must be at least 1".to_string()));
        }
        if desc.format == Format::Unknown {
            return Err(rejected("texture format is unknown".to_string()));
        }
        let depth = desc.format.is_depth();
        if desc.bind.contains(BindFlags::DEPTH_STENCIL) && !depth {
            return Err(rejected(format!(
                "depth-stencil binding needs a depth format, got {:?}",
                desc.format
            )));
        }
        if depth && desc.bind.intersects(BindFlags::RENDER_TARGET | BindFlags::UNORDERED_ACCESS) {
            return Err(rejected(format!(
                "depth format {:?} cannot be a render target or UAV",
                desc.format
            )));
        }
        if desc.bind.intersects(BindFlags::VERTEX_BUFFER | BindFlags::INDEX_BUFFER | BindFlags::CONSTANT_BUFFER) {
            return Err(rejected("textures cannot carry buffer bind flags".to_string()));
        }
        if desc.usage == Usage::Dynamic
            && desc.bind.intersects(BindFlags::RENDER_TARGET | BindFlags::DEPTH_STENCIL | BindFlags::UNORDERED_ACCESS)
        {
            return Err(rejected("dynamic textures cannot be written by the GPU".to_string()));
        }
        let expected = desc.width as usize
            * desc.height as usize
            * desc.format.bytes_per_pixel() as usize
            * desc.array_size as usize;
        match &desc.initial_data {
            Some(data) if data.len() != expected => Err(rejected(format!(
                "initial data is {} bytes, expected {}",
                data.len(),
                expected
            ))),
            None if desc.usage == Usage::Immutable => {
                Err(rejected("immutable texture without initial data".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl GraphicsDevice for ReferenceDevice {
    fn driver_type(&self) -> DriverType {
        self.shared.driver_type
    }

    fn feature_level(&self) -> FeatureLevel {
        self.shared.feature_level
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        self.validate_buffer(desc)?;
        Ok(self.shared.insert(RefObject::Buffer(desc.without_data())))
    }

    fn create_texture_2d(&self, desc: &Texture2dDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        self.validate_texture(desc)?;
        Ok(self.shared.insert(RefObject::Texture(desc.without_data())))
    }

    fn create_view(&self, resource: NativeId, desc: &ViewDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        let (bind, resource_format, mip_levels) = match self.shared.get(resource) {
            Some(RefObject::Texture(tex)) => (tex.bind, tex.format, tex.mip_levels),
            Some(RefObject::Buffer(buf)) => (buf.bind, Format::Unknown, 1),
            Some(other) => {
                return Err(rejected(format!("cannot create a view of a {}", other.label())))
            }
            None => return Err(rejected(format!("view parent {:?} is not alive", resource))),
        };
        let required = desc.kind.required_bind_flag();
        if !bind.contains(required) {
            return Err(rejected(format!(
                "{:?} view needs {:?} on the resource (has {:?})",
                desc.kind, required, bind
            )));
        }
        if desc.mip_slice >= mip_levels {
            return Err(rejected(format!(
                "mip slice {} out of range ({} levels)",
                desc.mip_slice, mip_levels
            )));
        }
        let format = desc.format.unwrap_or(resource_format);
        match desc.kind {
            ViewKind::DepthStencil if !format.is_depth() => {
                return Err(rejected(format!("depth-stencil view with color format {:?}", format)))
            }
            ViewKind::RenderTarget if format.is_depth() => {
                return Err(rejected(format!("render target view with depth format {:?}", format)))
            }
            _ => {}
        }
        Ok(self.shared.insert(RefObject::View { kind: desc.kind, format }))
    }

    fn create_sampler_state(&self, desc: &SamplerDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        if desc.max_anisotropy == 0 || desc.max_anisotropy > 16 {
            return Err(rejected(format!(
                "max anisotropy {} outside 1..=16",
                desc.max_anisotropy
            )));
        }
        if desc.min_lod > desc.max_lod {
            return Err(rejected("sampler min LOD above max LOD".to_string()));
        }
        Ok(self.shared.insert(RefObject::Sampler))
    }

    fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        if !desc.slope_scaled_depth_bias.is_finite() {
            return Err(rejected("slope scaled depth bias is not finite".to_string()));
        }
        Ok(self.shared.insert(RefObject::Rasterizer))
    }

    fn create_blend_state(&self, desc: &BlendDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        if desc.blend_enable && desc.write_mask.is_empty() {
            engine_warn!("lumen3d::ReferenceDevice", "Blend state enabled with an empty write mask");
        }
        Ok(self.shared.insert(RefObject::Blend))
    }

    fn create_depth_stencil_state(&self, _desc: &DepthStencilDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        Ok(self.shared.insert(RefObject::DepthStencil))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        if desc.bytecode.is_empty() {
            return Err(rejected(format!("{:?} shader has no bytecode", desc.stage)));
        }
        let needs_11 = matches!(desc.stage, ShaderStage::Hull | ShaderStage::Domain);
        if needs_11 && self.shared.feature_level < FeatureLevel::LEVEL_11_0 {
            return Err(rejected(format!(
                "{:?} shaders need feature level 11_0 (device is {})",
                desc.stage, self.shared.feature_level
            )));
        }
        Ok(self.shared.insert(RefObject::Shader(desc.stage)))
    }

    fn create_input_layout(&self, desc: &InputLayoutDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        if desc.elements.is_empty() {
            return Err(rejected("input layout has no elements".to_string()));
        }
        if let Some(bad) = desc.elements.iter().find(|e| e.semantic.is_empty() || e.format == Format::Unknown) {
            return Err(rejected(format!(
                "input element '{}' has no semantic or format",
                bad.semantic
            )));
        }
        Ok(self.shared.insert(RefObject::InputLayout))
    }

    fn create_swap_chain(&self, desc: &SwapChainDesc) -> Result<NativeId> {
        self.shared.check_alive()?;
        if self.shared.swap_chains_rejected.load(Ordering::Acquire) {
            return Err(rejected("device has no output for a swap chain".to_string()));
        }
        if desc.size.width == 0 || desc.size.height == 0 {
            return Err(rejected("swap chain size is empty".to_string()));
        }
        if desc.buffer_count == 0 || desc.buffer_count > MAX_SWAP_CHAIN_BUFFERS {
            return Err(rejected(format!(
                "swap chain buffer count {} outside 1..={}",
                desc.buffer_count, MAX_SWAP_CHAIN_BUFFERS
            )));
        }
        Ok(self.shared.insert(RefObject::SwapChain { desc: desc.clone(), back_buffer: None }))
    }

    fn swap_chain_back_buffer(&self, swap_chain: NativeId) -> Result<NativeId> {
        self.shared.check_alive()?;
        let desc = match self.shared.get(swap_chain) {
            Some(RefObject::SwapChain { back_buffer: Some(existing), .. }) => return Ok(existing),
            Some(RefObject::SwapChain { desc, .. }) => desc,
            _ => return Err(Error::InvalidResource(format!("{:?} is not a swap chain", swap_chain))),
        };
        let mut texture = Texture2dDesc::render_target(desc.size.width, desc.size.height, desc.format);
        texture.bind = BindFlags::RENDER_TARGET;
        let back_buffer = self.shared.insert(RefObject::Texture(texture));
        let mut objects = self.shared.objects.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(RefObject::SwapChain { back_buffer: slot, .. }) = objects.get_mut(&swap_chain) {
            *slot = Some(back_buffer);
        }
        Ok(back_buffer)
    }

    fn resize_swap_chain(&self, swap_chain: NativeId, width: u32, height: u32) -> Result<()> {
        self.shared.check_alive()?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource("swap chain size is empty".to_string()));
        }
        let mut objects = self.shared.objects.lock().unwrap_or_else(PoisonError::into_inner);
        let back_buffer = match objects.get(&swap_chain) {
            Some(RefObject::SwapChain { back_buffer, .. }) => *back_buffer,
            _ => return Err(Error::InvalidResource(format!("{:?} is not a swap chain", swap_chain))),
        };
        if let Some(old) = back_buffer {
            if objects.contains_key(&old) {
                return Err(Error::InvalidResource(
                    "back buffer must be released before resizing".to_string(),
                ));
            }
        }
        if let Some(RefObject::SwapChain { desc, back_buffer }) = objects.get_mut(&swap_chain) {
            desc.size = winit::dpi::PhysicalSize::new(width, height);
            *back_buffer = None;
        }
        Ok(())
    }

    fn present(&self, swap_chain: NativeId, sync_interval: u32) -> Result<()> {
        self.shared.check_alive()?;
        match self.shared.get(swap_chain) {
            Some(RefObject::SwapChain { .. }) => {}
            _ => return Err(Error::InvalidResource(format!("{:?} is not a swap chain", swap_chain))),
        }
        self.shared.log.push(CallSource::Device, DeviceCall::Present { sync_interval });
        Ok(())
    }

    fn release(&self, object: NativeId) {
        let removed = self.shared.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&object);
        match removed {
            Some(_) => self.shared.log.push(CallSource::Device, DeviceCall::Release(object)),
            None => engine_warn!("lumen3d::ReferenceDevice",
                "Release of unknown object {:?}", object),
        }
    }

    fn status(&self) -> Result<()> {
        self.shared.check_alive()
    }

    fn create_deferred_context(&self) -> Result<Box<dyn DeviceContext>> {
        self.shared.check_alive()?;
        let id = self.shared.next_context.fetch_add(1, Ordering::Relaxed);
        engine_debug!("lumen3d::ReferenceDevice", "Created deferred context {}", id);
        Ok(Box::new(ReferenceContext {
            shared: Arc::clone(&self.shared),
            kind: ContextKind::Deferred,
            id,
            recorded: 0,
            bound: FxHashMap::default(),
        }))
    }
}

// ============================================================================
// ReferenceContext
// ============================================================================

/// Where an object is bound on a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BindPoint {
    VertexBuffer(u32),
    IndexBuffer,
    InputLayout,
    Shader(ShaderStage),
    ConstantBuffer(ShaderStage, u32),
    ShaderResource(ShaderStage, u32),
    Sampler(ShaderStage, u32),
    UnorderedAccess(u32),
    RasterizerState,
    RenderTarget(u32),
    DepthStencilView,
    BlendState,
    DepthStencilState,
}

/// Immediate or deferred context of a `ReferenceDevice`
pub struct ReferenceContext {
    shared: Arc<ReferenceShared>,
    kind: ContextKind,
    id: u32,
    /// Calls recorded since the last finish_command_list
    recorded: u32,
    /// Objects currently bound, checked again at every draw
    bound: FxHashMap<BindPoint, NativeId>,
}

impl ReferenceContext {
    /// Context id used in `CallSource::Context`
    pub fn id(&self) -> u32 {
        self.id
    }

    fn record(&mut self, call: DeviceCall) -> Result<()> {
        self.shared.check_alive()?;
        self.recorded += 1;
        self.shared.log.push(CallSource::Context(self.id), call);
        Ok(())
    }

    fn bind(&mut self, point: BindPoint, object: Option<NativeId>) {
        match object {
            Some(id) => self.bound.insert(point, id),
            None => self.bound.remove(&point),
        };
    }

    fn bind_range(&mut self, point: impl Fn(u32) -> BindPoint, start_slot: u32, objects: &[Option<NativeId>]) {
        for (slot, object) in (start_slot..).zip(objects) {
            self.bind(point(slot), *object);
        }
    }

    /// Every bound object must still be alive when work is issued
    fn check_bindings_alive(&self) -> Result<()> {
        for (point, id) in &self.bound {
            if self.shared.get(*id).is_none() {
                return Err(Error::BackendError(format!(
                    "{:?} bound at {:?} was released", id, point
                )));
            }
        }
        Ok(())
    }

    fn check_views(&self, views: &[Option<NativeId>], kind: ViewKind, expected: &str) -> Result<()> {
        for view in views {
            self.shared.check_bound(*view, expected, |o| {
                matches!(o, RefObject::View { kind: k, .. } if *k == kind)
            })?;
        }
        Ok(())
    }
}

impl DeviceContext for ReferenceContext {
    fn kind(&self) -> ContextKind {
        self.kind
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[NativeVertexBuffer]) -> Result<()> {
        for binding in buffers {
            self.shared.check_bound(binding.buffer, "vertex buffer", |o| {
                matches!(o, RefObject::Buffer(d) if d.bind.contains(BindFlags::VERTEX_BUFFER))
            })?;
        }
        self.record(DeviceCall::SetVertexBuffers { start: start_slot, count: buffers.len() as u32 })?;
        for (slot, binding) in (start_slot..).zip(buffers) {
            self.bind(BindPoint::VertexBuffer(slot), binding.buffer);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: Option<NativeId>, format: IndexFormat, _offset: u32) -> Result<()> {
        self.shared.check_bound(buffer, "index buffer", |o| {
            matches!(o, RefObject::Buffer(d) if d.bind.contains(BindFlags::INDEX_BUFFER))
        })?;
        self.record(DeviceCall::SetIndexBuffer { format })?;
        self.bind(BindPoint::IndexBuffer, buffer);
        Ok(())
    }

    fn set_input_layout(&mut self, layout: Option<NativeId>) -> Result<()> {
        self.shared.check_bound(layout, "input layout", |o| matches!(o, RefObject::InputLayout))?;
        self.record(DeviceCall::SetInputLayout)?;
        self.bind(BindPoint::InputLayout, layout);
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.record(DeviceCall::SetPrimitiveTopology(topology))
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeId>) -> Result<()> {
        self.shared.check_bound(shader, "shader", |o| matches!(o, RefObject::Shader(s) if *s == stage))?;
        self.record(DeviceCall::SetShader { stage })?;
        self.bind(BindPoint::Shader(stage), shader);
        Ok(())
    }

    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[Option<NativeId>]) -> Result<()> {
        for buffer in buffers {
            self.shared.check_bound(*buffer, "constant buffer", |o| {
                matches!(o, RefObject::Buffer(d) if d.bind.contains(BindFlags::CONSTANT_BUFFER))
            })?;
        }
        self.record(DeviceCall::SetConstantBuffers { stage, start: start_slot, count: buffers.len() as u32 })?;
        self.bind_range(|slot| BindPoint::ConstantBuffer(stage, slot), start_slot, buffers);
        Ok(())
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeId>]) -> Result<()> {
        self.check_views(views, ViewKind::ShaderResource, "shader resource view")?;
        self.record(DeviceCall::SetShaderResources { stage, start: start_slot, count: views.len() as u32 })?;
        self.bind_range(|slot| BindPoint::ShaderResource(stage, slot), start_slot, views);
        Ok(())
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeId>]) -> Result<()> {
        for sampler in samplers {
            self.shared.check_bound(*sampler, "sampler state", |o| matches!(o, RefObject::Sampler))?;
        }
        self.record(DeviceCall::SetSamplers { stage, start: start_slot, count: samplers.len() as u32 })?;
        self.bind_range(|slot| BindPoint::Sampler(stage, slot), start_slot, samplers);
        Ok(())
    }

    fn set_unordered_access_views(&mut self, start_slot: u32, views: &[Option<NativeId>]) -> Result<()> {
        self.check_views(views, ViewKind::UnorderedAccess, "unordered access view")?;
        self.record(DeviceCall::SetUnorderedAccessViews { start: start_slot, count: views.len() as u32 })?;
        self.bind_range(BindPoint::UnorderedAccess, start_slot, views);
        Ok(())
    }

    fn set_rasterizer_state(&mut self, state: Option<NativeId>) -> Result<()> {
        self.shared.check_bound(state, "rasterizer state", |o| matches!(o, RefObject::Rasterizer))?;
        self.record(DeviceCall::SetRasterizerState)?;
        self.bind(BindPoint::RasterizerState, state);
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<()> {
        self.record(DeviceCall::SetViewports { count: viewports.len() as u32 })
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) -> Result<()> {
        self.record(DeviceCall::SetScissorRects { count: rects.len() as u32 })
    }

    fn set_render_targets(&mut self, start_slot: u32, views: &[Option<NativeId>]) -> Result<()> {
        self.check_views(views, ViewKind::RenderTarget, "render target view")?;
        self.record(DeviceCall::SetRenderTargets { start: start_slot, count: views.len() as u32 })?;
        self.bind_range(BindPoint::RenderTarget, start_slot, views);
        Ok(())
    }

    fn set_depth_stencil_view(&mut self, view: Option<NativeId>) -> Result<()> {
        self.check_views(&[view], ViewKind::DepthStencil, "depth-stencil view")?;
        self.record(DeviceCall::SetDepthStencilView)?;
        self.bind(BindPoint::DepthStencilView, view);
        Ok(())
    }

    fn set_blend_state(&mut self, state: Option<NativeId>, _blend_factor: [f32; 4], _sample_mask: u32) -> Result<()> {
        self.shared.check_bound(state, "blend state", |o| matches!(o, RefObject::Blend))?;
        self.record(DeviceCall::SetBlendState)?;
        self.bind(BindPoint::BlendState, state);
        Ok(())
    }

    fn set_depth_stencil_state(&mut self, state: Option<NativeId>, stencil_ref: u32) -> Result<()> {
        self.shared.check_bound(state, "depth-stencil state", |o| matches!(o, RefObject::DepthStencil))?;
        self.record(DeviceCall::SetDepthStencilState { stencil_ref })?;
        self.bind(BindPoint::DepthStencilState, state);
        Ok(())
    }

    fn clear_render_target_view(&mut self, view: NativeId, color: [f32; 4]) -> Result<()> {
        self.check_views(&[Some(view)], ViewKind::RenderTarget, "render target view")?;
        self.record(DeviceCall::ClearRenderTarget { color })
    }

    fn clear_depth_stencil_view(&mut self, view: NativeId, flags: ClearFlags, _depth: f32, _stencil: u8) -> Result<()> {
        self.check_views(&[Some(view)], ViewKind::DepthStencil, "depth-stencil view")?;
        if let Some(RefObject::View { format, .. }) = self.shared.get(view) {
            if flags.contains(ClearFlags::STENCIL) && !format.has_stencil() {
                engine_warn!("lumen3d::ReferenceContext",
                    "Stencil clear on a {:?} view, which has no stencil", format);
            }
        }
        self.record(DeviceCall::ClearDepthStencil { flags })
    }

    fn update_subresource(&mut self, resource: NativeId, data: &[u8]) -> Result<()> {
        match self.shared.get(resource) {
            Some(RefObject::Buffer(desc)) => {
                if data.len() as u64 > desc.size {
                    return Err(Error::InvalidResource(format!(
                        "update of {} bytes into a {} byte buffer",
                        data.len(),
                        desc.size
                    )));
                }
                if desc.usage == Usage::Immutable {
                    return Err(Error::InvalidResource("cannot update an immutable buffer".to_string()));
                }
            }
            Some(other) => {
                return Err(Error::InvalidResource(format!("cannot update a {}", other.label())))
            }
            None => return Err(Error::BackendError(format!("{:?} is not a live object", resource))),
        }
        self.record(DeviceCall::UpdateSubresource { bytes: data.len() })
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> Result<()> {
        self.shared.check_alive()?;
        self.check_bindings_alive()?;
        self.record(DeviceCall::Draw { vertex_count, start_vertex })
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) -> Result<()> {
        self.shared.check_alive()?;
        self.check_bindings_alive()?;
        self.record(DeviceCall::DrawIndexed { index_count, start_index, base_vertex })
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        if x == 0 || y == 0 || z == 0 {
            return Err(Error::InvalidResource(format!("empty dispatch {}x{}x{}", x, y, z)));
        }
        self.shared.check_alive()?;
        self.check_bindings_alive()?;
        self.record(DeviceCall::Dispatch { x, y, z })
    }

    fn clear_state(&mut self) -> Result<()> {
        self.record(DeviceCall::ClearState)?;
        self.bound.clear();
        Ok(())
    }

    fn finish_command_list(&mut self) -> Result<NativeId> {
        if self.kind != ContextKind::Deferred {
            return Err(Error::InvalidResource(
                "finish_command_list on an immediate context".to_string(),
            ));
        }
        self.record(DeviceCall::FinishCommandList)?;
        engine_debug!("lumen3d::ReferenceDevice",
            "Context {} closed a command list of {} calls", self.id, self.recorded);
        self.recorded = 0;
        self.bound.clear();
        Ok(self.shared.insert(RefObject::CommandList))
    }

    fn execute_command_list(&mut self, list: NativeId) -> Result<()> {
        if self.kind != ContextKind::Immediate {
            return Err(Error::InvalidResource(
                "execute_command_list on a deferred context".to_string(),
            ));
        }
        self.shared.check_bound(Some(list), "command list", |o| matches!(o, RefObject::CommandList))?;
        self.record(DeviceCall::ExecuteCommandList)?;
        // Executing a list leaves the immediate context in its default state
        self.bound.clear();
        Ok(())
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Factory producing reference, software and WARP devices.
///
/// All devices it creates share one `DeviceCallLog`. Hardware requests
/// fail: this factory has no GPU backend. Clones share the log and the
/// last created device.
#[derive(Clone, Default)]
pub struct ReferenceDeviceFactory {
    log: DeviceCallLog,
    last_device: Arc<Mutex<Option<ReferenceDevice>>>,
}

impl ReferenceDeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call log shared by every device this factory created
    pub fn call_log(&self) -> DeviceCallLog {
        self.log.clone()
    }

    /// Most recently created device
    pub fn last_device(&self) -> Option<ReferenceDevice> {
        self.last_device.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DeviceFactory for ReferenceDeviceFactory {
    fn create_device(&self, driver: DriverType, feature_level: FeatureLevel) -> Result<CreatedDevice> {
        let (device, context) = ReferenceDevice::create(driver, feature_level, self.log.clone())?;
        *self.last_device.lock().unwrap_or_else(PoisonError::into_inner) = Some(device.clone());
        Ok(CreatedDevice {
            device: Arc::new(device),
            immediate_context: Box::new(context),
        })
    }
}

#[cfg(test)]
#[path = "reference_device_tests.rs"]
mod tests;
