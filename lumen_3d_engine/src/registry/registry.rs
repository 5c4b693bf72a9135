/// ResourceRegistry: owns every GPU resource behind a `ResourceHandle`.
///
/// Destruction is two-phase. `destroy` retires a record at the current frame
/// index and the handle stops resolving at once; `advance_frame` physically
/// releases the native object `frame_latency` frames later, and only after
/// every view created over it has been released. Until then the slot stays
/// occupied, so the handle can never be handed out again while the GPU may
/// still reference the object.

use std::sync::atomic::AtomicU64;
use std::sync::{mpsc, Arc};
use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};
use crate::device::{
    GraphicsDevice, NativeId, BufferDesc, Texture2dDesc, ViewDesc, ViewKind,
    SamplerDesc, RasterizerDesc, BlendDesc, DepthStencilDesc, ShaderDesc,
    InputLayoutDesc, Viewport,
};
use crate::error::{Error, Result};
use crate::registry::{
    ResourceHandle, ViewportId, ResourceProxy, ResourceRecord, ResourceDesc,
    ResourceKind, RecordState, UploadQueue, UploadTicket,
};
use crate::registry::upload::{
    CompletedUpload, PendingResource, create_texture_views, release_pending,
};
use crate::{engine_debug, engine_trace, engine_warn, engine_report};

const SOURCE: &str = "lumen3d::Registry";

/// Frames an integrated upload result waits for `take_upload` before it is
/// dropped
pub const UNCLAIMED_UPLOAD_FRAMES: u64 = 64;

/// Registry of GPU resources for one device
pub struct ResourceRegistry {
    device: Arc<dyn GraphicsDevice>,
    /// Bumped whenever the device is replaced; uploads from an older device are dropped
    generation: u64,
    records: SlotMap<ResourceHandle, ResourceRecord>,
    /// Retired handles waiting for physical release, oldest first
    retired: Vec<ResourceHandle>,
    frame_index: u64,
    frame_latency: u64,
    /// Bumped whenever a handle stops resolving
    retire_epoch: u64,
    viewports: Vec<Viewport>,
    upload_tx: mpsc::Sender<CompletedUpload>,
    upload_rx: mpsc::Receiver<CompletedUpload>,
    next_ticket: Arc<AtomicU64>,
    /// Integrated upload results and the frame they arrived in
    completed_uploads: FxHashMap<UploadTicket, (u64, Result<ResourceProxy>)>,
}

impl ResourceRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    ///
    /// * `device` - Device that creates and releases the native objects
    /// * `frame_latency` - Frames a destroyed resource stays alive (K)
    pub fn new(device: Arc<dyn GraphicsDevice>, frame_latency: u32) -> Self {
        let (upload_tx, upload_rx) = mpsc::channel();
        Self {
            device,
            generation: 0,
            records: SlotMap::with_key(),
            retired: Vec::new(),
            frame_index: 0,
            frame_latency: u64::from(frame_latency),
            retire_epoch: 0,
            viewports: Vec::new(),
            upload_tx,
            upload_rx,
            next_ticket: Arc::new(AtomicU64::new(0)),
            completed_uploads: FxHashMap::default(),
        }
    }

    // ===== CREATION =====

    fn insert(&mut self, native: NativeId, desc: ResourceDesc) -> ResourceHandle {
        let kind = desc.kind();
        let handle = self.records.insert(ResourceRecord::new(native, desc));
        engine_trace!(SOURCE, "Created {} {:#x} ({:?})", kind, handle.to_raw(), native);
        handle
    }

    fn created(&mut self, result: Result<NativeId>, desc: ResourceDesc) -> Result<ResourceHandle> {
        match result {
            Ok(native) => Ok(self.insert(native, desc)),
            Err(err) => Err(engine_report!(SOURCE, err)),
        }
    }

    pub fn create_buffer(&mut self, desc: &BufferDesc) -> Result<ResourceHandle> {
        let result = self.device.create_buffer(desc);
        self.created(result, ResourceDesc::Buffer(desc.without_data()))
    }

    /// Create a texture and the views its bind flags request.
    ///
    /// If any view fails the texture is released immediately and nothing is
    /// registered.
    pub fn create_texture_2d(&mut self, desc: &Texture2dDesc) -> Result<ResourceProxy> {
        let native = self.device
            .create_texture_2d(desc)
            .map_err(|err| engine_report!(SOURCE, err))?;
        self.adopt_texture(native, desc)
    }

    /// Register a texture created outside the registry (swap chain back
    /// buffer) and create its views. The registry takes ownership of `native`.
    pub fn adopt_texture(&mut self, native: NativeId, desc: &Texture2dDesc) -> Result<ResourceProxy> {
        let views = match create_texture_views(self.device.as_ref(), native, desc) {
            Ok(views) => views,
            Err(err) => {
                self.device.release(native);
                return Err(engine_report!(SOURCE, err));
            }
        };
        Ok(self.insert_texture(native, desc.without_data(), views))
    }

    fn insert_texture(
        &mut self,
        native: NativeId,
        desc: Texture2dDesc,
        views: Vec<(ViewDesc, NativeId)>,
    ) -> ResourceProxy {
        let resource = self.insert(native, ResourceDesc::Texture2d(desc));
        let mut proxy = ResourceProxy::single(resource);
        for (view_desc, view_native) in views {
            let view = self.insert_view(resource, view_desc, view_native);
            match view_desc.kind {
                ViewKind::RenderTarget => proxy.rtv = view,
                ViewKind::DepthStencil => proxy.dsv = view,
                ViewKind::ShaderResource => proxy.srv = view,
                ViewKind::UnorderedAccess => proxy.uav = view,
            }
        }
        proxy
    }

    fn insert_view(&mut self, parent: ResourceHandle, desc: ViewDesc, native: NativeId) -> ResourceHandle {
        if let Some(record) = self.records.get_mut(parent) {
            record.view_refs += 1;
        }
        self.insert(native, ResourceDesc::View { parent, desc })
    }

    /// Create a view over a live buffer or texture
    pub fn create_view(&mut self, parent: ResourceHandle, desc: &ViewDesc) -> Result<ResourceHandle> {
        let record = self.resolve(parent)?;
        if !matches!(record.kind(), ResourceKind::Buffer | ResourceKind::Texture2d) {
            return Err(engine_report!(SOURCE, Error::InvalidResource(format!(
                "cannot create a view of a {}", record.kind()
            ))));
        }
        let native = self.device
            .create_view(record.native, desc)
            .map_err(|err| engine_report!(SOURCE, err))?;
        Ok(self.insert_view(parent, *desc, native))
    }

    pub fn create_sampler_state(&mut self, desc: &SamplerDesc) -> Result<ResourceHandle> {
        let result = self.device.create_sampler_state(desc);
        self.created(result, ResourceDesc::Sampler(*desc))
    }

    pub fn create_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<ResourceHandle> {
        let result = self.device.create_rasterizer_state(desc);
        self.created(result, ResourceDesc::Rasterizer(*desc))
    }

    pub fn create_blend_state(&mut self, desc: &BlendDesc) -> Result<ResourceHandle> {
        let result = self.device.create_blend_state(desc);
        self.created(result, ResourceDesc::Blend(*desc))
    }

    pub fn create_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> Result<ResourceHandle> {
        let result = self.device.create_depth_stencil_state(desc);
        self.created(result, ResourceDesc::DepthStencil(*desc))
    }

    pub fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ResourceHandle> {
        let result = self.device.create_shader(desc);
        self.created(result, ResourceDesc::Shader {
            stage: desc.stage,
            entry_point: desc.entry_point.clone(),
        })
    }

    pub fn create_input_layout(&mut self, desc: &InputLayoutDesc) -> Result<ResourceHandle> {
        let result = self.device.create_input_layout(desc);
        self.created(result, ResourceDesc::InputLayout(desc.clone()))
    }

    /// Attach a debug name to a live record
    pub fn set_name(&mut self, handle: ResourceHandle, name: &str) -> Result<()> {
        self.resolve(handle)?;
        if let Some(record) = self.records.get_mut(handle) {
            record.name = Some(name.to_string());
        }
        Ok(())
    }

    // ===== LOOKUP =====

    /// Record of a live handle
    ///
    /// # Errors
    ///
    /// `InvalidHandle` for the null handle, a stale handle, or a handle
    /// that was destroyed (even if not yet physically released).
    pub fn resolve(&self, handle: ResourceHandle) -> Result<&ResourceRecord> {
        if handle.is_null() {
            return Err(Error::InvalidHandle("null handle".to_string()));
        }
        match self.records.get(handle) {
            Some(record) if record.is_live() => Ok(record),
            Some(_) => Err(Error::InvalidHandle(format!(
                "handle {:#x} was destroyed", handle.to_raw()
            ))),
            None => Err(Error::InvalidHandle(format!(
                "handle {:#x} is stale or unknown", handle.to_raw()
            ))),
        }
    }

    /// Native object to bind for `handle`.
    ///
    /// The null handle resolves to `None` (unbind the slot).
    ///
    /// # Errors
    ///
    /// `InvalidHandle` as for `resolve`, `InvalidResource` when the record
    /// is not of `expected` kind.
    pub fn resolve_native(&self, handle: ResourceHandle, expected: ResourceKind) -> Result<Option<NativeId>> {
        if handle.is_null() {
            return Ok(None);
        }
        let record = self.resolve(handle)?;
        if record.kind() != expected {
            return Err(Error::InvalidResource(format!(
                "handle {:#x} is a {}, expected a {}",
                handle.to_raw(), record.kind(), expected
            )));
        }
        Ok(Some(record.native))
    }

    /// Whether `handle` resolves
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.resolve(handle).is_ok()
    }

    /// Live handles
    pub fn handles(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.records
            .iter()
            .filter(|(_, record)| record.is_live())
            .map(|(handle, _)| handle)
    }

    // ===== DESTRUCTION =====

    /// Logically destroy a resource.
    ///
    /// The handle stops resolving immediately. Destroying a null, stale or
    /// already destroyed handle logs a warning and returns `false`.
    pub fn destroy(&mut self, handle: ResourceHandle) -> bool {
        let frame = self.frame_index;
        match self.records.get_mut(handle) {
            Some(record) if record.is_live() => {
                record.state = RecordState::Retired { frame };
                self.retired.push(handle);
                self.retire_epoch += 1;
                engine_trace!(SOURCE, "Retired {:#x} at frame {}", handle.to_raw(), frame);
                true
            }
            _ => {
                engine_warn!(SOURCE, "Ignoring destroy of {:#x}: not a live handle", handle.to_raw());
                false
            }
        }
    }

    fn release_record(&mut self, handle: ResourceHandle) -> bool {
        let Some(record) = self.records.remove(handle) else { return false };
        self.device.release(record.native);
        if let Some(parent) = record.desc.parent() {
            if let Some(parent_record) = self.records.get_mut(parent) {
                parent_record.view_refs = parent_record.view_refs.saturating_sub(1);
            }
        }
        engine_trace!(SOURCE, "Released {} {:#x}", record.kind(), handle.to_raw());
        true
    }

    /// Advance the frame clock and release every retired record that is due.
    ///
    /// Returns the number of native objects released.
    pub fn advance_frame(&mut self) -> usize {
        self.frame_index += 1;
        self.prune_uploads();
        self.release_due()
    }

    fn release_due(&mut self) -> usize {
        let mut released = 0;
        loop {
            let due: Vec<ResourceHandle> = self.retired
                .iter()
                .copied()
                .filter(|&handle| self.is_due(handle))
                .collect();
            if due.is_empty() {
                break;
            }
            for handle in &due {
                if self.release_record(*handle) {
                    released += 1;
                }
            }
            self.retired.retain(|handle| !due.contains(handle));
        }
        if released > 0 {
            engine_debug!(SOURCE, "Frame {}: released {} resources", self.frame_index, released);
        }
        released
    }

    fn is_due(&self, handle: ResourceHandle) -> bool {
        match self.records.get(handle) {
            Some(record) => match record.state {
                RecordState::Retired { frame } => {
                    self.frame_index >= frame + self.frame_latency && record.view_refs == 0
                }
                RecordState::Live => false,
            },
            // Already gone (release_now): drop it from the list
            None => true,
        }
    }

    /// Release a resource and all views over it right now, bypassing the
    /// frame latency. The caller guarantees the GPU no longer uses them.
    pub fn release_now(&mut self, handle: ResourceHandle) -> Result<()> {
        if handle.is_null() || !self.records.contains_key(handle) {
            return Err(Error::InvalidHandle(format!(
                "handle {:#x} is stale or unknown", handle.to_raw()
            )));
        }
        let views: Vec<ResourceHandle> = self.records
            .iter()
            .filter(|(_, record)| record.desc.parent() == Some(handle))
            .map(|(view, _)| view)
            .collect();
        for view in views {
            self.release_record(view);
        }
        self.release_record(handle);
        self.retired.retain(|h| self.records.contains_key(*h));
        self.retire_epoch += 1;
        Ok(())
    }

    /// Release every record immediately (shutdown). Returns the count.
    pub fn flush(&mut self) -> usize {
        self.integrate_uploads();
        let mut views = Vec::new();
        let mut resources = Vec::new();
        for (handle, record) in &self.records {
            if record.kind().is_view() {
                views.push(handle);
            } else {
                resources.push(handle);
            }
        }
        let mut released = 0;
        for handle in views.into_iter().chain(resources) {
            if self.release_record(handle) {
                released += 1;
            }
        }
        self.retired.clear();
        self.completed_uploads.clear();
        engine_debug!(SOURCE, "Flushed {} resources", released);
        released
    }

    /// Forget every record without touching the device (device lost).
    ///
    /// Every handle becomes stale. Viewports are plain data and survive.
    pub fn invalidate_all(&mut self) {
        let dropped = self.records.len();
        self.records.clear();
        self.retired.clear();
        self.completed_uploads.clear();
        while self.upload_rx.try_recv().is_ok() {}
        self.generation += 1;
        self.retire_epoch += 1;
        engine_warn!(SOURCE, "Invalidated {} resources after device loss", dropped);
    }

    /// Invalidate everything and continue on a new device
    pub fn replace_device(&mut self, device: Arc<dyn GraphicsDevice>) {
        self.invalidate_all();
        self.device = device;
    }

    // ===== VIEWPORTS =====

    /// Register an immutable viewport
    pub fn create_viewport(&mut self, viewport: Viewport) -> Result<ViewportId> {
        let valid_size = viewport.width > 0.0 && viewport.height > 0.0;
        let valid_depth = (0.0..=1.0).contains(&viewport.min_depth)
            && (0.0..=1.0).contains(&viewport.max_depth)
            && viewport.min_depth <= viewport.max_depth;
        if !valid_size || !valid_depth {
            return Err(engine_report!(SOURCE, Error::ResourceCreation(format!(
                "invalid viewport {:?}", viewport
            ))));
        }
        let id = ViewportId(self.viewports.len() as u32);
        self.viewports.push(viewport);
        Ok(id)
    }

    pub fn viewport(&self, id: ViewportId) -> Result<&Viewport> {
        self.viewports
            .get(id.index())
            .ok_or_else(|| Error::InvalidHandle(format!("unknown {}", id)))
    }

    // ===== UPLOADS =====

    /// Queue for creating resources from worker threads
    pub fn upload_queue(&self) -> UploadQueue {
        UploadQueue::new(
            Arc::clone(&self.device),
            self.generation,
            self.upload_tx.clone(),
            Arc::clone(&self.next_ticket),
        )
    }

    /// Register every upload finished so far. Returns how many arrived.
    pub fn integrate_uploads(&mut self) -> usize {
        let mut count = 0;
        while let Ok(upload) = self.upload_rx.try_recv() {
            count += 1;
            if upload.generation != self.generation {
                // Created on a device that is gone; its objects died with it
                continue;
            }
            let result = match upload.result {
                Ok(PendingResource::Buffer { native, desc }) => {
                    Ok(ResourceProxy::single(self.insert(native, ResourceDesc::Buffer(desc))))
                }
                Ok(PendingResource::Texture { native, desc, views }) => {
                    Ok(self.insert_texture(native, desc, views))
                }
                Err(err) => Err(engine_report!(SOURCE, err)),
            };
            if let (Ok(proxy), Some(name)) = (&result, &upload.name) {
                if let Some(record) = self.records.get_mut(proxy.resource) {
                    record.name = Some(name.clone());
                }
            }
            self.completed_uploads.insert(upload.ticket, (self.frame_index, result));
        }
        count
    }

    /// Result of a finished upload, once integrated.
    ///
    /// Results not taken within `UNCLAIMED_UPLOAD_FRAMES` frames are dropped;
    /// the resources they created stay registered.
    pub fn take_upload(&mut self, ticket: UploadTicket) -> Option<Result<ResourceProxy>> {
        self.completed_uploads.remove(&ticket).map(|(_, result)| result)
    }

    /// Integrated upload results nobody has taken yet
    pub fn unclaimed_upload_count(&self) -> usize {
        self.completed_uploads.len()
    }

    fn prune_uploads(&mut self) {
        let frame = self.frame_index;
        let before = self.completed_uploads.len();
        self.completed_uploads
            .retain(|_, (arrived, _)| frame < *arrived + UNCLAIMED_UPLOAD_FRAMES);
        let dropped = before - self.completed_uploads.len();
        if dropped > 0 {
            engine_warn!(SOURCE, "Dropped {} upload results that were never taken", dropped);
        }
    }

    // ===== QUERIES =====

    /// Number of live (resolvable) records
    pub fn len(&self) -> usize {
        self.records.len() - self.retired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retired records not yet physically released
    pub fn pending_release_count(&self) -> usize {
        self.retired.len()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frame_latency(&self) -> u64 {
        self.frame_latency
    }

    /// Changes every time a handle stops resolving (destroy, release, device
    /// loss). Pipelines compare it to re-check what they have bound.
    pub fn retire_epoch(&self) -> u64 {
        self.retire_epoch
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }
}

impl Drop for ResourceRegistry {
    fn drop(&mut self) {
        while let Ok(upload) = self.upload_rx.try_recv() {
            if let (Ok(pending), true) = (upload.result, upload.generation == self.generation) {
                release_pending(self.device.as_ref(), pending);
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
