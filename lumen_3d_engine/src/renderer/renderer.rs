/// Renderer: the explicit top-level context of the engine.
///
/// Owns the device, its immediate pipeline, the resource registry, the
/// parameter table, swap chains and deferred pipelines. There is no global
/// instance; applications construct one with a `DeviceFactory` and drive it
/// once per frame:
///
/// ```ignore
/// let mut renderer = Renderer::new(RendererConfig::default(), Box::new(factory));
/// renderer.initialize(DriverType::Hardware, FeatureLevel::LEVEL_11_0)?;
/// let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(1280, 720))?;
/// loop {
///     renderer.render_views(&mut views, elapsed)?;
///     renderer.present(swap_chain)?;
/// }
/// ```

use std::fmt;
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use crate::device::{
    GraphicsDevice, DeviceFactory, CreatedDevice, NativeId, DriverType, FeatureLevel,
    BufferDesc, Texture2dDesc, SamplerDesc, RasterizerDesc, BlendDesc, DepthStencilDesc,
    ShaderDesc, InputLayoutDesc, SwapChainDesc, Viewport, BindFlags,
};
use crate::error::{Error, Result};
use crate::pipeline::PipelineManager;
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceProxy, ViewportId};
use crate::renderer::{RendererConfig, TextureImage};
use crate::utils::SlotAllocator;
use crate::view::{FrameContext, ParameterManager, RenderView, ViewPass};
use crate::{engine_debug, engine_error, engine_info, engine_report, engine_warn};

const SOURCE: &str = "lumen3d::Renderer";

// ============================================================================
// Identifiers
// ============================================================================

/// Swap chain created by a `Renderer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapChainId(u32);

impl fmt::Display for SwapChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swap chain #{}", self.0)
    }
}

/// Deferred pipeline created by a `Renderer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferredPipelineId(u32);

impl fmt::Display for DeferredPipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deferred pipeline #{}", self.0)
    }
}

/// Outcome of `Renderer::present`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// The frame was presented
    Presented,
    /// The device was lost and has been re-created; every resource handle is
    /// stale and must be re-created
    DeviceReset,
}

// ============================================================================
// Device state
// ============================================================================

struct SwapChain {
    desc: SwapChainDesc,
    native: NativeId,
    back_buffer: ResourceProxy,
}

/// Everything that lives and dies with one device
struct ActiveDevice {
    /// Driver type passed to `initialize` (recovery asks for it again)
    requested: DriverType,
    driver: DriverType,
    feature_level: FeatureLevel,
    device: Arc<dyn GraphicsDevice>,
    pipeline: PipelineManager,
    registry: ResourceRegistry,
}

impl ActiveDevice {
    fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> Result<SwapChain> {
        let native = self.device.create_swap_chain(desc)?;
        match self.adopt_back_buffer(native, desc) {
            Ok(back_buffer) => Ok(SwapChain { desc: desc.clone(), native, back_buffer }),
            Err(err) => {
                self.device.release(native);
                Err(err)
            }
        }
    }

    fn adopt_back_buffer(&mut self, swap_chain: NativeId, desc: &SwapChainDesc) -> Result<ResourceProxy> {
        let texture = self.device.swap_chain_back_buffer(swap_chain)?;
        let mut texture_desc = Texture2dDesc::render_target(desc.size.width, desc.size.height, desc.format);
        texture_desc.bind = BindFlags::RENDER_TARGET;
        self.registry.adopt_texture(texture, &texture_desc)
    }

    fn resize_swap_chain(&mut self, swap_chain: &mut SwapChain, width: u32, height: u32) -> Result<ResourceProxy> {
        // The back buffer must not stay bound while its storage is replaced
        self.pipeline.clear_render_targets();
        self.pipeline.apply_render_targets(&self.registry)?;
        self.registry.release_now(swap_chain.back_buffer.resource)?;
        self.device.resize_swap_chain(swap_chain.native, width, height)?;
        swap_chain.desc.size = PhysicalSize::new(width, height);
        swap_chain.back_buffer = self.adopt_back_buffer(swap_chain.native, &swap_chain.desc)?;
        Ok(swap_chain.back_buffer)
    }

    fn submit(&mut self, deferred: &mut PipelineManager) -> Result<()> {
        let list = deferred.finish_command_list()?;
        let result = self.pipeline.execute_command_list(list);
        self.device.release(list);
        result
    }

    fn render_view(&mut self, view: &mut RenderView, params: &mut ParameterManager, elapsed: f32) -> Result<()> {
        view.update(elapsed)?;
        let mut frame = FrameContext { pipeline: &mut self.pipeline, registry: &self.registry, params };
        view.pre_draw(&mut frame)?;
        view.set_render_params(frame.params)?;
        view.draw(&mut frame)?;
        view.set_usage_params(frame.params)
    }

    /// Re-create swap chains and deferred contexts on a fresh device
    fn rebuild_outputs(
        &mut self,
        swap_chains: &mut [Option<SwapChain>],
        deferred: &mut [Option<PipelineManager>],
    ) -> Result<()> {
        for swap_chain in swap_chains.iter_mut().flatten() {
            *swap_chain = self.create_swap_chain(&swap_chain.desc)?;
        }
        for pipeline in deferred.iter_mut().flatten() {
            *pipeline = PipelineManager::new(self.device.create_deferred_context()?);
        }
        Ok(())
    }
}

// ============================================================================
// Renderer
// ============================================================================

pub struct Renderer {
    config: RendererConfig,
    factory: Box<dyn DeviceFactory>,
    active: Option<ActiveDevice>,
    params: ParameterManager,
    swap_chain_ids: SlotAllocator,
    swap_chains: Vec<Option<SwapChain>>,
    deferred_ids: SlotAllocator,
    deferred: Vec<Option<PipelineManager>>,
    device_lost: bool,
    /// Bumped every time the device is re-created
    generation: u64,
}

impl Renderer {
    /// Create an uninitialized renderer; no device exists until `initialize`
    pub fn new(config: RendererConfig, factory: Box<dyn DeviceFactory>) -> Self {
        Self {
            config,
            factory,
            active: None,
            params: ParameterManager::new(),
            swap_chain_ids: SlotAllocator::new(),
            swap_chains: Vec::new(),
            deferred_ids: SlotAllocator::new(),
            deferred: Vec::new(),
            device_lost: false,
            generation: 0,
        }
    }

    // ===== INITIALIZATION =====

    /// Create the device.
    ///
    /// If a hardware device cannot be created and `fallback_to_reference` is
    /// set, the reference driver is tried at the same feature level.
    ///
    /// # Returns
    ///
    /// The driver type actually created
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when every attempt failed, `InvalidOperation`
    /// if the renderer is already initialized.
    pub fn initialize(&mut self, driver: DriverType, feature_level: FeatureLevel) -> Result<DriverType> {
        if self.active.is_some() {
            return Err(Error::InvalidOperation("renderer is already initialized".to_string()));
        }
        engine_info!(SOURCE, "Initializing '{}': {} driver, feature level {}, validation {}",
            self.config.app_name, driver, feature_level,
            if self.config.enable_validation { "on" } else { "off" });

        let (created, used) = self.create_device(driver, feature_level)?;
        let registry = ResourceRegistry::new(Arc::clone(&created.device), self.config.frame_latency);
        self.active = Some(ActiveDevice {
            requested: driver,
            driver: used,
            feature_level,
            device: created.device,
            pipeline: PipelineManager::new(created.immediate_context),
            registry,
        });
        self.device_lost = false;

        engine_info!(SOURCE, "Renderer initialized with the {} driver", used);
        Ok(used)
    }

    fn create_device(&self, driver: DriverType, feature_level: FeatureLevel) -> Result<(CreatedDevice, DriverType)> {
        let first = match self.factory.create_device(driver, feature_level) {
            Ok(created) => return Ok((created, driver)),
            Err(err) => err,
        };
        if driver != DriverType::Hardware || !self.config.fallback_to_reference {
            return Err(engine_report!(SOURCE, Error::InitializationFailed(format!(
                "{} device: {}", driver, first
            ))));
        }

        engine_warn!(SOURCE, "Hardware device creation failed ({}), falling back to the reference driver", first);
        match self.factory.create_device(DriverType::Reference, feature_level) {
            Ok(created) => Ok((created, DriverType::Reference)),
            Err(second) => Err(engine_report!(SOURCE, Error::InitializationFailed(format!(
                "hardware device: {}; reference device: {}", first, second
            )))),
        }
    }

    /// Re-create the device after it was lost.
    ///
    /// Every resource handle becomes stale and the parameter table is
    /// emptied. Viewports, swap chain ids and deferred pipeline ids stay
    /// valid; swap chains get new back buffers.
    ///
    /// # Errors
    ///
    /// `DeviceLost` if no device can be created or a swap chain or deferred
    /// context cannot be rebuilt on it; the renderer stays lost and the next
    /// `present` tries again.
    pub fn recover_device(&mut self) -> Result<()> {
        let (requested, feature_level) = match &self.active {
            Some(active) => (active.requested, active.feature_level),
            None => return Err(not_initialized()),
        };
        engine_warn!(SOURCE, "Re-creating the device after device loss");

        let (created, driver) = self.create_device(requested, feature_level).map_err(|err| {
            engine_report!(SOURCE, Error::DeviceLost(format!("device re-initialization failed: {}", err)))
        })?;
        let Some(active) = self.active.as_mut() else {
            return Err(not_initialized());
        };
        active.registry.replace_device(Arc::clone(&created.device));
        active.device = created.device;
        active.driver = driver;
        active.pipeline = PipelineManager::new(created.immediate_context);
        self.params.clear();

        // Stay lost until every output exists on the new device
        if let Err(err) = active.rebuild_outputs(&mut self.swap_chains, &mut self.deferred) {
            return Err(engine_report!(SOURCE, Error::DeviceLost(format!(
                "output re-creation failed: {}", err
            ))));
        }
        self.generation += 1;
        self.device_lost = false;
        engine_info!(SOURCE, "Device re-created with the {} driver (generation {})", driver, self.generation);
        Ok(())
    }

    /// Release every resource and the device. Returns the number of
    /// registry resources released.
    pub fn shutdown(&mut self) -> usize {
        let Some(mut active) = self.active.take() else {
            return 0;
        };
        self.deferred.clear();
        self.deferred_ids = SlotAllocator::new();

        let released = if self.device_lost {
            active.registry.invalidate_all();
            0
        } else {
            let released = active.registry.flush();
            for swap_chain in self.swap_chains.iter().flatten() {
                active.device.release(swap_chain.native);
            }
            released
        };
        self.swap_chains.clear();
        self.swap_chain_ids = SlotAllocator::new();
        self.params.clear();
        self.device_lost = false;

        engine_info!(SOURCE, "Renderer shut down, released {} resources", released);
        released
    }

    // ===== ERROR HANDLING =====

    /// Record device loss and escalate programmer errors before handing an
    /// error back to the caller
    fn fail(&mut self, error: Error) -> Error {
        if error.is_device_lost() && !self.device_lost {
            engine_error!(SOURCE, "{}", error);
            self.device_lost = true;
        }
        escalate(&self.config, error)
    }

    fn checked<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.fail(err))
    }

    fn active_mut(&mut self) -> Result<&mut ActiveDevice> {
        self.active.as_mut().ok_or_else(not_initialized)
    }

    fn active(&self) -> Result<&ActiveDevice> {
        self.active.as_ref().ok_or_else(not_initialized)
    }

    // ===== RESOURCE CREATION =====

    pub fn create_buffer(&mut self, desc: &BufferDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_buffer(desc));
        self.checked(result)
    }

    /// Create a texture and the views its bind flags request
    pub fn create_texture_2d(&mut self, desc: &Texture2dDesc) -> Result<ResourceProxy> {
        let result = self.active_mut().and_then(|active| active.registry.create_texture_2d(desc));
        self.checked(result)
    }

    /// Create an immutable shader-readable texture from decoded pixels
    pub fn load_texture(&mut self, image: TextureImage) -> Result<ResourceProxy> {
        let (width, height, format) = (image.width(), image.height(), image.format());
        let desc = Texture2dDesc::sampled(width, height, format, image.into_pixels());
        let proxy = self.create_texture_2d(&desc)?;
        engine_debug!(SOURCE, "Loaded {}x{} {:?} texture", width, height, format);
        Ok(proxy)
    }

    pub fn create_sampler_state(&mut self, desc: &SamplerDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_sampler_state(desc));
        self.checked(result)
    }

    pub fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_rasterizer_state(desc));
        self.checked(result)
    }

    pub fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_blend_state(desc));
        self.checked(result)
    }

    pub fn create_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_depth_stencil_state(desc));
        self.checked(result)
    }

    pub fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_shader(desc));
        self.checked(result)
    }

    pub fn create_input_layout(&mut self, desc: &InputLayoutDesc) -> Result<ResourceHandle> {
        let result = self.active_mut().and_then(|active| active.registry.create_input_layout(desc));
        self.checked(result)
    }

    pub fn create_viewport(&mut self, viewport: Viewport) -> Result<ViewportId> {
        let result = self.active_mut().and_then(|active| active.registry.create_viewport(viewport));
        self.checked(result)
    }

    /// Destroy a resource; its native object is released `frame_latency`
    /// presents later. Returns false for null, stale or destroyed handles.
    pub fn destroy(&mut self, handle: ResourceHandle) -> bool {
        match self.active.as_mut() {
            Some(active) => active.registry.destroy(handle),
            None => false,
        }
    }

    // ===== SWAP CHAINS =====

    pub fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> Result<SwapChainId> {
        let result = self.active_mut().and_then(|active| active.create_swap_chain(desc));
        let swap_chain = self.checked(result)?;
        let id = self.swap_chain_ids.alloc();
        store(&mut self.swap_chains, id, swap_chain);
        engine_debug!(SOURCE, "Created swap chain #{} ({}x{})", id, desc.size.width, desc.size.height);
        Ok(SwapChainId(id))
    }

    /// Back buffer of a swap chain (render target view in `rtv`).
    ///
    /// The proxy changes on `resize_swap_chain` and device recovery.
    pub fn swap_chain_resource(&self, id: SwapChainId) -> Result<ResourceProxy> {
        match slot(&self.swap_chains, id.0) {
            Some(swap_chain) => Ok(swap_chain.back_buffer),
            None => Err(escalate(&self.config, unknown_swap_chain(id))),
        }
    }

    /// Resize the swap chain buffers and return the new back buffer.
    ///
    /// Render targets are unbound first; the old back buffer handle becomes
    /// stale immediately.
    pub fn resize_swap_chain(&mut self, id: SwapChainId, width: u32, height: u32) -> Result<ResourceProxy> {
        let result = match (self.active.as_mut(), slot_mut(&mut self.swap_chains, id.0)) {
            (None, _) => Err(not_initialized()),
            (_, None) => Err(unknown_swap_chain(id)),
            (Some(active), Some(swap_chain)) => active.resize_swap_chain(swap_chain, width, height),
        };
        let back_buffer = self.checked(result)?;
        engine_debug!(SOURCE, "Resized {} to {}x{}", id, width, height);
        Ok(back_buffer)
    }

    /// Release a swap chain and its back buffer right away
    pub fn destroy_swap_chain(&mut self, id: SwapChainId) -> bool {
        let Some(swap_chain) = self.swap_chains.get_mut(id.0 as usize).and_then(Option::take) else {
            engine_warn!(SOURCE, "Ignoring destroy of unknown {}", id);
            return false;
        };
        self.swap_chain_ids.free(id.0);
        if let Some(active) = self.active.as_mut() {
            active.pipeline.clear_render_targets();
            if let Err(err) = active.pipeline.apply_render_targets(&active.registry) {
                engine_warn!(SOURCE, "Unbinding render targets before destroying {} failed: {}", id, err);
            }
            if let Err(err) = active.registry.release_now(swap_chain.back_buffer.resource) {
                engine_warn!(SOURCE, "Back buffer of {} already released: {}", id, err);
            }
            active.device.release(swap_chain.native);
        }
        engine_debug!(SOURCE, "Destroyed {}", id);
        true
    }

    // ===== DEFERRED PIPELINES =====

    /// Pipeline over a new deferred context, for recording command lists
    pub fn create_deferred_pipeline(&mut self) -> Result<DeferredPipelineId> {
        let result = self.active_mut().and_then(|active| active.device.create_deferred_context());
        let context = self.checked(result)?;
        let id = self.deferred_ids.alloc();
        store(&mut self.deferred, id, PipelineManager::new(context));
        engine_debug!(SOURCE, "Created deferred pipeline #{}", id);
        Ok(DeferredPipelineId(id))
    }

    pub fn deferred_pipeline_mut(&mut self, id: DeferredPipelineId) -> Result<&mut PipelineManager> {
        match slot_mut(&mut self.deferred, id.0) {
            Some(pipeline) => Ok(pipeline),
            None => Err(escalate(&self.config, unknown_deferred(id))),
        }
    }

    /// Frame context recording into a deferred pipeline
    pub fn deferred_frame(&mut self, id: DeferredPipelineId) -> Result<FrameContext<'_>> {
        let Some(active) = self.active.as_ref() else {
            return Err(not_initialized());
        };
        match slot_mut(&mut self.deferred, id.0) {
            Some(pipeline) => Ok(FrameContext { pipeline, registry: &active.registry, params: &mut self.params }),
            None => Err(escalate(&self.config, unknown_deferred(id))),
        }
    }

    /// Close the deferred pipeline's command list and execute it on the
    /// immediate pipeline. Both pipelines re-apply their full state next time.
    pub fn submit_deferred(&mut self, id: DeferredPipelineId) -> Result<()> {
        let result = match (self.active.as_mut(), slot_mut(&mut self.deferred, id.0)) {
            (None, _) => Err(not_initialized()),
            (_, None) => Err(unknown_deferred(id)),
            (Some(active), Some(deferred)) => active.submit(deferred),
        };
        self.checked(result)
    }

    pub fn destroy_deferred_pipeline(&mut self, id: DeferredPipelineId) -> bool {
        match self.deferred.get_mut(id.0 as usize).and_then(Option::take) {
            Some(_) => self.deferred_ids.free(id.0),
            None => false,
        }
    }

    // ===== FRAME =====

    /// Run one frame of every view, in order.
    ///
    /// Each view goes through update, pre_draw, set_render_params, draw and
    /// set_usage_params. A view failing with `PipelineState` is skipped with a
    /// warning. While the device is lost nothing is drawn.
    ///
    /// # Returns
    ///
    /// The number of views drawn
    pub fn render_views(&mut self, views: &mut [RenderView], elapsed: f32) -> Result<usize> {
        let Some(active) = self.active.as_mut() else {
            return Err(not_initialized());
        };
        if self.device_lost {
            engine_debug!(SOURCE, "Device lost, dropping {} views", views.len());
            return Ok(0);
        }
        active.registry.integrate_uploads();

        let mut drawn = 0;
        for view in views.iter_mut() {
            match active.render_view(view, &mut self.params, elapsed) {
                Ok(()) => drawn += 1,
                Err(err @ Error::PipelineState { .. }) => {
                    engine_warn!(SOURCE, "Skipping {} view: {}", view.kind_name(), err);
                }
                Err(err) if err.is_device_lost() => {
                    engine_error!(SOURCE, "Device lost while drawing the {} view: {}", view.kind_name(), err);
                    self.device_lost = true;
                    break;
                }
                Err(err) => return Err(escalate(&self.config, err)),
            }
        }
        Ok(drawn)
    }

    /// Present a swap chain and advance the deferred-destruction clock.
    ///
    /// Blocks for vertical sync when `sync_interval > 0`. On device loss the
    /// device is re-created and `DeviceReset` is returned.
    pub fn present(&mut self, id: SwapChainId) -> Result<PresentStatus> {
        if self.active.is_none() {
            return Err(not_initialized());
        }
        if self.device_lost {
            return self.recover_device().map(|()| PresentStatus::DeviceReset);
        }
        let Some(native) = slot(&self.swap_chains, id.0).map(|swap_chain| swap_chain.native) else {
            return Err(escalate(&self.config, unknown_swap_chain(id)));
        };
        let Some(active) = self.active.as_mut() else {
            return Err(not_initialized());
        };

        match active.device.present(native, self.config.sync_interval) {
            Ok(()) => {
                active.registry.advance_frame();
                Ok(PresentStatus::Presented)
            }
            Err(err) if err.is_device_lost() => {
                engine_error!(SOURCE, "Present failed: {}", err);
                self.device_lost = true;
                self.recover_device().map(|()| PresentStatus::DeviceReset)
            }
            Err(err) => Err(engine_report!(SOURCE, err)),
        }
    }

    /// Frame context over the immediate pipeline
    pub fn frame(&mut self) -> Result<FrameContext<'_>> {
        let Some(active) = self.active.as_mut() else {
            return Err(not_initialized());
        };
        Ok(FrameContext { pipeline: &mut active.pipeline, registry: &active.registry, params: &mut self.params })
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Driver type of the current device
    pub fn driver_type(&self) -> Option<DriverType> {
        self.active.as_ref().map(|active| active.driver)
    }

    pub fn feature_level(&self) -> Option<FeatureLevel> {
        self.active.as_ref().map(|active| active.feature_level)
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost
    }

    /// Number of times the device has been re-created
    pub fn device_generation(&self) -> u64 {
        self.generation
    }

    pub fn pipeline(&self) -> Result<&PipelineManager> {
        self.active().map(|active| &active.pipeline)
    }

    pub fn pipeline_mut(&mut self) -> Result<&mut PipelineManager> {
        self.active_mut().map(|active| &mut active.pipeline)
    }

    pub fn registry(&self) -> Result<&ResourceRegistry> {
        self.active().map(|active| &active.registry)
    }

    pub fn registry_mut(&mut self) -> Result<&mut ResourceRegistry> {
        self.active_mut().map(|active| &mut active.registry)
    }

    pub fn params(&self) -> &ParameterManager {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterManager {
        &mut self.params
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ===== HELPERS =====

/// Log programmer errors and panic on them when configured to
fn escalate(config: &RendererConfig, error: Error) -> Error {
    if error.is_programmer_error() {
        engine_error!(SOURCE, "Programmer error: {}", error);
        if config.panic_on_programmer_error {
            panic!("lumen3d programmer error: {}", error);
        }
    }
    error
}

fn not_initialized() -> Error {
    Error::InvalidOperation("renderer is not initialized".to_string())
}

fn unknown_swap_chain(id: SwapChainId) -> Error {
    Error::InvalidHandle(format!("unknown {}", id))
}

fn unknown_deferred(id: DeferredPipelineId) -> Error {
    Error::InvalidHandle(format!("unknown {}", id))
}

fn store<T>(slots: &mut Vec<Option<T>>, id: u32, value: T) {
    let index = id as usize;
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
    slots[index] = Some(value);
}

fn slot<T>(slots: &[Option<T>], id: u32) -> Option<&T> {
    slots.get(id as usize).and_then(Option::as_ref)
}

fn slot_mut<T>(slots: &mut [Option<T>], id: u32) -> Option<&mut T> {
    slots.get_mut(id as usize).and_then(Option::as_mut)
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
