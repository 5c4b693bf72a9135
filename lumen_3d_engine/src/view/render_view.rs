/// Render views: configured passes bound to color/depth targets and a viewport.
///
/// The set of pass kinds is closed (`RenderView`). Each kind implements the
/// `ViewPass` capability set the frame driver calls in order:
/// `update -> pre_draw -> set_render_params -> draw -> set_usage_params`.

use glam::{Mat4, Vec4};
use slotmap::Key;
use crate::device::{ClearFlags, Viewport};
use crate::error::Result;
use crate::pipeline::{PipelineManager, StageKind, stage_error};
use crate::registry::{ResourceRegistry, ResourceHandle, ViewportId};
use crate::view::lifecycle::ViewState;
use crate::view::parameters::{
    ParameterManager, VIEW_MATRIX, PROJ_MATRIX, VIEW_PROJ_MATRIX, VIEWPORT_SIZE, TIME,
};
use crate::view::perspective_view::PerspectiveView;
use crate::view::gbuffer_view::GBufferView;

/// Borrowed frame state handed to views
pub struct FrameContext<'a> {
    pub pipeline: &'a mut PipelineManager,
    pub registry: &'a ResourceRegistry,
    pub params: &'a mut ParameterManager,
}

/// Capabilities every view kind provides
pub trait ViewPass {
    fn state(&self) -> ViewState;

    /// Refresh time-varying parameters
    fn update(&mut self, time: f32) -> Result<()>;

    /// Bind targets and viewport, apply them, then clear the targets
    fn pre_draw(&mut self, frame: &mut FrameContext<'_>) -> Result<()>;

    /// Publish this view's own parameters for its effects
    fn set_render_params(&self, params: &mut ParameterManager) -> Result<()>;

    /// Issue the pass's draw calls
    fn draw(&mut self, frame: &mut FrameContext<'_>) -> Result<()>;

    /// Publish parameters for consumers of this view's output
    fn set_usage_params(&self, params: &mut ParameterManager) -> Result<()>;

    /// Release view-owned resources; every later call fails
    fn destroy(&mut self, registry: &mut ResourceRegistry) -> Result<()>;
}

// ===== RENDER VIEW =====

pub enum RenderView {
    /// Forward-shaded perspective pass
    Perspective(PerspectiveView),
    /// Deferred geometry-buffer pass
    GBuffer(GBufferView),
}

impl RenderView {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RenderView::Perspective(_) => "perspective",
            RenderView::GBuffer(_) => "gbuffer",
        }
    }

    fn pass(&self) -> &dyn ViewPass {
        match self {
            RenderView::Perspective(view) => view,
            RenderView::GBuffer(view) => view,
        }
    }

    fn pass_mut(&mut self) -> &mut dyn ViewPass {
        match self {
            RenderView::Perspective(view) => view,
            RenderView::GBuffer(view) => view,
        }
    }
}

impl From<PerspectiveView> for RenderView {
    fn from(view: PerspectiveView) -> Self {
        RenderView::Perspective(view)
    }
}

impl From<GBufferView> for RenderView {
    fn from(view: GBufferView) -> Self {
        RenderView::GBuffer(view)
    }
}

impl ViewPass for RenderView {
    fn state(&self) -> ViewState {
        self.pass().state()
    }

    fn update(&mut self, time: f32) -> Result<()> {
        self.pass_mut().update(time)
    }

    fn pre_draw(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        self.pass_mut().pre_draw(frame)
    }

    fn set_render_params(&self, params: &mut ParameterManager) -> Result<()> {
        self.pass().set_render_params(params)
    }

    fn draw(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        self.pass_mut().draw(frame)
    }

    fn set_usage_params(&self, params: &mut ParameterManager) -> Result<()> {
        self.pass().set_usage_params(params)
    }

    fn destroy(&mut self, registry: &mut ResourceRegistry) -> Result<()> {
        self.pass_mut().destroy(registry)
    }
}

// ===== SHARED PASS HELPERS =====

/// Camera state shared by both view kinds
#[derive(Debug, Clone, Copy)]
pub(crate) struct ViewCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub time: f32,
    /// Viewport resolved at the last `pre_draw`
    pub viewport: Option<Viewport>,
}

impl Default for ViewCamera {
    fn default() -> Self {
        Self { view: Mat4::IDENTITY, projection: Mat4::IDENTITY, time: 0.0, viewport: None }
    }
}

impl ViewCamera {
    pub(crate) fn publish(&self, params: &mut ParameterManager) {
        params.set_matrix(VIEW_MATRIX, self.view);
        params.set_matrix(PROJ_MATRIX, self.projection);
        params.set_matrix(VIEW_PROJ_MATRIX, self.projection * self.view);
        params.set_vector(TIME, Vec4::new(self.time, 0.0, 0.0, 0.0));
        if let Some(vp) = self.viewport {
            let (w, h) = (vp.width.max(1.0), vp.height.max(1.0));
            params.set_vector(VIEWPORT_SIZE, Vec4::new(vp.width, vp.height, 1.0 / w, 1.0 / h));
        }
    }
}

/// Bind `render_targets`, `depth_target` and `viewport`, apply them and
/// clear every bound target. Returns the resolved viewport.
pub(crate) fn bind_and_clear_targets(
    frame: &mut FrameContext<'_>,
    render_targets: &[ResourceHandle],
    depth_target: ResourceHandle,
    viewport: ViewportId,
    clear_color: [f32; 4],
) -> Result<Viewport> {
    let resolved = *frame
        .registry
        .viewport(viewport)
        .map_err(|err| stage_error(StageKind::Rasterizer, Some(0), err))?;

    let pipeline = &mut *frame.pipeline;
    pipeline.clear_render_targets();
    for (slot, rtv) in render_targets.iter().enumerate() {
        pipeline.output_merger_mut().set_render_target(slot, *rtv)?;
    }
    pipeline.output_merger_mut().set_depth_target(depth_target);
    pipeline.rasterizer_mut().set_viewport_count(1)?;
    pipeline.rasterizer_mut().set_viewport(0, viewport)?;
    pipeline.apply_render_targets(frame.registry)?;

    for (slot, rtv) in render_targets.iter().enumerate() {
        pipeline
            .clear_color_target(frame.registry, *rtv, clear_color)
            .map_err(|err| stage_error(StageKind::OutputMerger, Some(slot), err))?;
    }
    if !depth_target.is_null() {
        pipeline
            .clear_depth_stencil_target(frame.registry, depth_target, ClearFlags::DEPTH | ClearFlags::STENCIL, 1.0, 0)
            .map_err(|err| stage_error(StageKind::OutputMerger, None, err))?;
    }
    Ok(resolved)
}
