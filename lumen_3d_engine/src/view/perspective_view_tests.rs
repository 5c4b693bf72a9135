use super::*;
use std::sync::Arc;
use glam::{Mat4, Vec3, Vec4};
use crate::device::{
    ReferenceDevice, DeviceCallLog, DeviceCall, DriverType, FeatureLevel, Texture2dDesc, Format,
    Viewport, ClearFlags, ShaderDesc, ShaderStage,
};
use crate::error::Error;
use crate::pipeline::PipelineManager;
use crate::registry::ResourceProxy;
use crate::view::effect::{Effect, EffectDesc};
use crate::view::geometry::Geometry;
use crate::view::parameters::{VIEWPORT_SIZE, VIEW_PROJ_MATRIX, TIME};

struct Fixture {
    registry: ResourceRegistry,
    pipeline: PipelineManager,
    params: ParameterManager,
    log: DeviceCallLog,
    color: ResourceProxy,
    depth: ResourceProxy,
    viewport: ViewportId,
}

fn fixture() -> Fixture {
    let log = DeviceCallLog::new();
    let (device, context) =
        ReferenceDevice::create(DriverType::Reference, FeatureLevel::LEVEL_11_0, log.clone()).unwrap();
    let mut registry = ResourceRegistry::new(Arc::new(device), 2);
    let color = registry
        .create_texture_2d(&Texture2dDesc::render_target(1280, 720, Format::R8G8B8A8_UNORM))
        .unwrap();
    let depth = registry.create_texture_2d(&Texture2dDesc::depth_buffer(1280, 720)).unwrap();
    let viewport = registry.create_viewport(Viewport::full(1280, 720)).unwrap();
    Fixture {
        registry,
        pipeline: PipelineManager::new(Box::new(context)),
        params: ParameterManager::new(),
        log,
        color,
        depth,
        viewport,
    }
}

fn frame(f: &mut Fixture) -> FrameContext<'_> {
    FrameContext { pipeline: &mut f.pipeline, registry: &f.registry, params: &mut f.params }
}

const CLEAR: [f32; 4] = [0.1, 0.2, 0.3, 1.0];

#[test]
fn test_draw_before_set_targets_fails() {
    let mut f = fixture();
    let mut view = PerspectiveView::new(CLEAR);

    assert!(matches!(view.update(0.0), Err(Error::UnconfiguredView(_))));
    assert!(matches!(view.draw(&mut frame(&mut f)), Err(Error::UnconfiguredView(_))));
    assert!(matches!(view.pre_draw(&mut frame(&mut f)), Err(Error::UnconfiguredView(_))));
    assert_eq!(view.state(), ViewState::Created);
    assert!(f.log.is_empty());
}

#[test]
fn test_pre_draw_binds_and_clears_targets() {
    let mut f = fixture();
    let mut view = PerspectiveView::new(CLEAR);
    view.set_targets(f.color.rtv, f.depth.dsv, f.viewport).unwrap();
    view.update(1.0).unwrap();

    view.pre_draw(&mut frame(&mut f)).unwrap();

    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetViewports { count: 1 },
        DeviceCall::SetRenderTargets { start: 0, count: 1 },
        DeviceCall::SetDepthStencilView,
        DeviceCall::ClearRenderTarget { color: CLEAR },
        DeviceCall::ClearDepthStencil { flags: ClearFlags::DEPTH | ClearFlags::STENCIL },
    ]);
}

#[test]
fn test_pre_draw_without_depth() {
    let mut f = fixture();
    let mut view = PerspectiveView::new(CLEAR);
    view.set_targets(f.color.rtv, ResourceHandle::default(), f.viewport).unwrap();

    view.pre_draw(&mut frame(&mut f)).unwrap();

    assert_eq!(f.log.count(|c| matches!(c, DeviceCall::ClearDepthStencil { .. })), 0);
    assert_eq!(f.log.count(|c| matches!(c, DeviceCall::SetDepthStencilView)), 0);
}

#[test]
fn test_render_params_published() {
    let mut f = fixture();
    let mut view = PerspectiveView::new(CLEAR);
    let eye = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
    view.set_view_matrix(eye);
    view.set_projection_matrix(proj);
    view.set_targets(f.color.rtv, f.depth.dsv, f.viewport).unwrap();
    view.update(2.5).unwrap();
    view.pre_draw(&mut frame(&mut f)).unwrap();

    view.set_render_params(&mut f.params).unwrap();

    assert_eq!(f.params.matrix(VIEW_PROJ_MATRIX), Some(proj * eye));
    assert_eq!(f.params.vector(TIME), Some(Vec4::new(2.5, 0.0, 0.0, 0.0)));
    assert_eq!(
        f.params.vector(VIEWPORT_SIZE),
        Some(Vec4::new(1280.0, 720.0, 1.0 / 1280.0, 1.0 / 720.0))
    );
}

#[test]
fn test_draw_issues_queue() {
    let mut f = fixture();
    let vs = f
        .registry
        .create_shader(&ShaderDesc { stage: ShaderStage::Vertex, bytecode: vec![7], entry_point: "main".to_string() })
        .unwrap();
    let effect = Arc::new(
        Effect::new(EffectDesc { shaders: vec![(ShaderStage::Vertex, vs)], ..EffectDesc::default() }).unwrap(),
    );
    let quad = Arc::new(Geometry::full_screen_quad(&mut f.registry).unwrap());

    let mut view = PerspectiveView::new(CLEAR);
    view.queue_mut().push(effect.clone(), quad.clone(), Mat4::IDENTITY).unwrap();
    view.queue_mut().push(effect, quad, Mat4::IDENTITY).unwrap();
    view.set_targets(f.color.rtv, f.depth.dsv, f.viewport).unwrap();
    view.update(0.0).unwrap();
    view.pre_draw(&mut frame(&mut f)).unwrap();
    view.set_render_params(&mut f.params).unwrap();
    view.draw(&mut frame(&mut f)).unwrap();

    assert_eq!(view.state(), ViewState::Drawn);
    assert_eq!(f.log.count(|c| matches!(c, DeviceCall::Draw { vertex_count: 4, .. })), 2);
    view.set_usage_params(&mut f.params).unwrap();
}

#[test]
fn test_unknown_viewport_is_pipeline_state_error() {
    let mut f = fixture();
    let mut view = PerspectiveView::new(CLEAR);
    view.set_targets(f.color.rtv, f.depth.dsv, ViewportId(99)).unwrap();

    let err = view.pre_draw(&mut frame(&mut f)).unwrap_err();
    assert!(matches!(err, Error::PipelineState { .. }));
}

#[test]
fn test_destroyed_view_rejects_calls() {
    let mut f = fixture();
    let mut view = PerspectiveView::new(CLEAR);
    view.set_targets(f.color.rtv, f.depth.dsv, f.viewport).unwrap();
    view.destroy(&mut f.registry).unwrap();

    assert_eq!(view.state(), ViewState::Destroyed);
    assert!(matches!(view.update(0.0), Err(Error::InvalidOperation(_))));
    assert!(matches!(view.draw(&mut frame(&mut f)), Err(Error::InvalidOperation(_))));
    assert!(matches!(
        view.set_targets(f.color.rtv, f.depth.dsv, f.viewport),
        Err(Error::InvalidOperation(_))
    ));
}
