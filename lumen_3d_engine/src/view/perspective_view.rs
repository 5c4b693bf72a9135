/// Forward-shaded perspective view.
///
/// Renders its draw queue into one color target (typically a swap chain back
/// buffer) with an optional depth target.

use glam::Mat4;
use crate::error::Result;
use crate::registry::{ResourceRegistry, ResourceHandle, ViewportId};
use crate::view::draw_queue::DrawQueue;
use crate::view::lifecycle::{Lifecycle, ViewState};
use crate::view::parameters::ParameterManager;
use crate::view::render_view::{FrameContext, ViewPass, ViewCamera, bind_and_clear_targets};
use crate::engine_trace;

#[derive(Debug, Clone, Copy)]
struct Targets {
    render_target: ResourceHandle,
    depth_target: ResourceHandle,
    viewport: ViewportId,
}

pub struct PerspectiveView {
    lifecycle: Lifecycle,
    targets: Option<Targets>,
    clear_color: [f32; 4],
    camera: ViewCamera,
    queue: DrawQueue,
}

impl PerspectiveView {
    /// New view, clearing its color target to `clear_color` every frame
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            lifecycle: Lifecycle::new("perspective"),
            targets: None,
            clear_color,
            camera: ViewCamera::default(),
            queue: DrawQueue::new(),
        }
    }

    /// Bind the view to a render target view, an optional depth-stencil view
    /// (null for none) and a viewport
    pub fn set_targets(
        &mut self,
        render_target: ResourceHandle,
        depth_target: ResourceHandle,
        viewport: ViewportId,
    ) -> Result<()> {
        self.lifecycle.configure()?;
        self.targets = Some(Targets { render_target, depth_target, viewport });
        Ok(())
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.camera.view = view;
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.camera.projection = projection;
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.camera.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.camera.projection
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn queue(&self) -> &DrawQueue {
        &self.queue
    }

    /// Objects drawn by this view every frame
    pub fn queue_mut(&mut self) -> &mut DrawQueue {
        &mut self.queue
    }
}

impl ViewPass for PerspectiveView {
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
        if let Some(targets) = self.targets {
            let viewport = bind_and_clear_targets(
                frame,
                &[targets.render_target],
                targets.depth_target,
                targets.viewport,
                self.clear_color,
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
        let drawn = self.queue.draw(frame.pipeline, frame.registry, frame.params)?;
        engine_trace!("lumen3d::View", "Perspective view drew {} items", drawn);
        self.lifecycle.drawn()
    }

    fn set_usage_params(&self, _params: &mut ParameterManager) -> Result<()> {
        // Output goes straight to its target; nothing to publish
        self.lifecycle.require_configured("set_usage_params")
    }

    fn destroy(&mut self, _registry: &mut ResourceRegistry) -> Result<()> {
        self.lifecycle.destroy()?;
        self.queue.clear();
        self.targets = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "perspective_view_tests.rs"]
mod tests;
