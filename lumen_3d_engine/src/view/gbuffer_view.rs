/// Deferred geometry-buffer view.
///
/// Renders its draw queue into up to eight G-buffer targets plus a depth
/// target, and publishes the targets' shader resource views for the lighting
/// passes that consume them. An optional stencil mask pass draws a
/// full-screen quad before the geometry, using view-owned depth-stencil and
/// rasterizer states.

use std::sync::Arc;
use glam::Mat4;
use slotmap::Key;
use crate::device::{CullMode, DepthStencilDesc, RasterizerDesc};
use crate::error::{Error, Result};
use crate::pipeline::{StageKind, RENDER_TARGET_SLOTS};
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceProxy, ViewportId};
use crate::view::draw_queue::DrawQueue;
use crate::view::effect::Effect;
use crate::view::geometry::Geometry;
use crate::view::lifecycle::{Lifecycle, ViewState};
use crate::view::parameters::{ParameterManager, gbuffer_target};
use crate::view::render_view::{FrameContext, ViewPass, ViewCamera, bind_and_clear_targets};
use crate::{engine_debug, engine_report, engine_trace};

/// Stencil reference written by the mask pass
pub const MASK_STENCIL_REF: u32 = 1;

struct Targets {
    gbuffer: Vec<ResourceProxy>,
    /// Render target views of `gbuffer`, in slot order
    rtvs: Vec<ResourceHandle>,
    depth: ResourceProxy,
    viewport: ViewportId,
}

struct StencilMask {
    effect: Arc<Effect>,
    depth_stencil_state: ResourceHandle,
    rasterizer_state: ResourceHandle,
    quad: Geometry,
}

impl StencilMask {
    fn resources(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        [self.depth_stencil_state, self.rasterizer_state]
            .into_iter()
            .chain(self.quad.resources())
    }
}

pub struct GBufferView {
    lifecycle: Lifecycle,
    targets: Option<Targets>,
    camera: ViewCamera,
    queue: DrawQueue,
    mask: Option<StencilMask>,
}

impl Default for GBufferView {
    fn default() -> Self {
        Self::new()
    }
}

impl GBufferView {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("gbuffer"),
            targets: None,
            camera: ViewCamera::default(),
            queue: DrawQueue::new(),
            mask: None,
        }
    }

    /// Bind the view to its G-buffer targets, depth target and viewport.
    ///
    /// Every G-buffer proxy needs a render target view. The depth proxy
    /// needs a depth-stencil view.
    pub fn set_targets(&mut self, gbuffer: &[ResourceProxy], depth: ResourceProxy, viewport: ViewportId) -> Result<()> {
        if gbuffer.is_empty() {
            return Err(Error::InvalidOperation("G-buffer view needs at least one target".to_string()));
        }
        if gbuffer.len() > RENDER_TARGET_SLOTS {
            return Err(engine_report!("lumen3d::View", Error::SlotRange {
                stage: StageKind::OutputMerger,
                slot: gbuffer.len() - 1,
                capacity: RENDER_TARGET_SLOTS,
            }));
        }
        if let Some(i) = gbuffer.iter().position(|p| p.rtv.is_null()) {
            return Err(Error::InvalidOperation(format!("G-buffer target {} has no render target view", i)));
        }
        if depth.dsv.is_null() {
            return Err(Error::InvalidOperation("G-buffer depth target has no depth-stencil view".to_string()));
        }

        self.lifecycle.configure()?;
        self.targets = Some(Targets {
            gbuffer: gbuffer.to_vec(),
            rtvs: gbuffer.iter().map(|p| p.rtv).collect(),
            depth,
            viewport,
        });
        Ok(())
    }

    /// Enable the stencil mask pass, creating its states and quad
    pub fn enable_stencil_mask(&mut self, registry: &mut ResourceRegistry, effect: Arc<Effect>) -> Result<()> {
        self.disable_stencil_mask(registry);

        let depth_stencil_state = registry.create_depth_stencil_state(&DepthStencilDesc::stencil_write())?;
        let rasterizer_state = match registry.create_rasterizer_state(&RasterizerDesc {
            cull_mode: CullMode::None,
            ..RasterizerDesc::default()
        }) {
            Ok(state) => state,
            Err(err) => {
                registry.destroy(depth_stencil_state);
                return Err(err);
            }
        };
        let quad = match Geometry::full_screen_quad(registry) {
            Ok(quad) => quad,
            Err(err) => {
                registry.destroy(depth_stencil_state);
                registry.destroy(rasterizer_state);
                return Err(err);
            }
        };

        engine_debug!("lumen3d::View", "G-buffer stencil mask enabled with effect '{}'", effect.name());
        self.mask = Some(StencilMask { effect, depth_stencil_state, rasterizer_state, quad });
        Ok(())
    }

    /// Drop the stencil mask pass and destroy its resources
    pub fn disable_stencil_mask(&mut self, registry: &mut ResourceRegistry) {
        if let Some(mask) = self.mask.take() {
            for handle in mask.resources() {
                registry.destroy(handle);
            }
        }
    }

    pub fn has_stencil_mask(&self) -> bool {
        self.mask.is_some()
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.camera.view = view;
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.camera.projection = projection;
    }

    pub fn target_count(&self) -> usize {
        self.targets.as_ref().map_or(0, |t| t.gbuffer.len())
    }

    pub fn queue(&self) -> &DrawQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut DrawQueue {
        &mut self.queue
    }

    fn draw_mask(mask: &StencilMask, frame: &mut FrameContext<'_>) -> Result<()> {
        mask.effect.bind(frame.pipeline, frame.registry, frame.params)?;
        frame
            .pipeline
            .output_merger_mut()
            .set_depth_stencil_state(mask.depth_stencil_state, MASK_STENCIL_REF);
        frame.pipeline.rasterizer_mut().set_rasterizer_state(mask.rasterizer_state);
        mask.quad.bind(frame.pipeline)?;
        mask.quad.draw(frame.pipeline, frame.registry)
    }
}

impl ViewPass for GBufferView {
    fn state(&self) -> ViewState {
        self.lifecycle.state()
    }

    fn update(&mut self, time: f32) -> Result<()> {
        self.lifecycle.updated()?;
        self.camera.time = time;
        Ok(())
    }

    fn pre_draw(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        self.lifecycle.require_configured("pre_draw")?;
        if let Some(targets) = &self.targets {
            let viewport = bind_and_clear_targets(
                frame,
                &targets.rtvs,
                targets.depth.dsv,
                targets.viewport,
                [0.0; 4],
            )?;
            self.camera.viewport = Some(viewport);
        }
        Ok(())
    }

    fn set_render_params(&self, params: &mut ParameterManager) -> Result<()> {
        self.lifecycle.require_configured("set_render_params")?;
        self.camera.publish(params);
        Ok(())
    }

    fn draw(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        self.lifecycle.require_configured("draw")?;
        if let Some(mask) = &self.mask {
            Self::draw_mask(mask, frame)?;
        }
        let drawn = self.queue.draw(frame.pipeline, frame.registry, frame.params)?;
        engine_trace!("lumen3d::View", "G-buffer view drew {} items", drawn);
        self.lifecycle.drawn()
    }

    fn set_usage_params(&self, params: &mut ParameterManager) -> Result<()> {
        self.lifecycle.require_configured("set_usage_params")?;
        if let Some(targets) = &self.targets {
            for (i, proxy) in targets.gbuffer.iter().enumerate() {
                params.set_shader_resource(&gbuffer_target(i), proxy.srv);
            }
        }
        Ok(())
    }

    fn destroy(&mut self, registry: &mut ResourceRegistry) -> Result<()> {
        self.lifecycle.destroy()?;
        self.disable_stencil_mask(registry);
        self.queue.clear();
        self.targets = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "gbuffer_view_tests.rs"]
mod tests;
