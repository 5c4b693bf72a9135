//! Integration tests for pipeline state application
//!
//! Verifies redundant-binding elimination and draw submission against the
//! reference device's call log.
//!
//! Run with: cargo test --test pipeline_integration_tests


use std::sync::Arc;
use lumen_3d_engine::glam::Mat4;
use lumen_3d_engine::lumen3d::device::{
    BufferDesc, DeviceCall, Format, ShaderStage, Texture2dDesc, Viewport,
};
use lumen_3d_engine::lumen3d::pipeline::{ApplyStats, StageKind};
use lumen_3d_engine::lumen3d::view::parameters::{VIEW_PROJ_MATRIX, WORLD_VIEW_PROJ_MATRIX};
use lumen_3d_engine::lumen3d::view::{
    BindingKind, ConstantBufferLayout, DrawQueue, Effect, EffectDesc, Geometry, ResourceBinding,
};
use lumen_3d_engine::lumen3d::Error;
use test_utils::{reference_renderer, shader};

// ============================================================================
// REDUNDANT BINDING ELIMINATION
// ============================================================================

#[test]
fn test_integration_render_target_bound_once() {
    let mut t = reference_renderer();
    let target = t.renderer
        .create_texture_2d(&Texture2dDesc::render_target(1280, 720, Format::R8G8B8A8_UNORM))
        .unwrap();
    t.log.clear();

    let frame = t.renderer.frame().unwrap();
    frame.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();

    let first = frame.pipeline.apply_all(frame.registry).unwrap();
    assert_eq!(first, ApplyStats { bind_calls: 1 });
    assert_eq!(t.log.calls(), vec![DeviceCall::SetRenderTargets { start: 0, count: 1 }]);

    let second = frame.pipeline.apply_all(frame.registry).unwrap();
    assert_eq!(second, ApplyStats { bind_calls: 0 });
    assert_eq!(t.log.len(), 1);
}

#[test]
fn test_integration_unchanged_rebind_is_free() {
    let mut t = reference_renderer();
    let cb = t.renderer.create_buffer(&BufferDesc::constant(64)).unwrap();

    let frame = t.renderer.frame().unwrap();
    let stage = frame.pipeline.shader_stage_mut(ShaderStage::Pixel);
    stage.set_constant_buffer(0, cb).unwrap();
    frame.pipeline.apply_all(frame.registry).unwrap();
    t.log.clear();

    // Same value again, then a clear followed by the same value
    frame.pipeline.shader_stage_mut(ShaderStage::Pixel).set_constant_buffer(0, cb).unwrap();
    frame.pipeline.clear_pipeline_resources();
    frame.pipeline.shader_stage_mut(ShaderStage::Pixel).set_constant_buffer(0, cb).unwrap();

    assert_eq!(frame.pipeline.apply_all(frame.registry).unwrap().bind_calls, 0);
    assert!(t.log.is_empty());
    assert!(!frame.pipeline.is_dirty(StageKind::Pixel));
}

#[test]
fn test_integration_destroyed_handle_fails_apply() {
    let mut t = reference_renderer();
    let target = t.renderer
        .create_texture_2d(&Texture2dDesc::render_target(64, 64, Format::R8G8B8A8_UNORM))
        .unwrap();
    t.renderer.destroy(target.resource);
    t.renderer.destroy(target.rtv);

    let frame = t.renderer.frame().unwrap();
    frame.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();

    let err = frame.pipeline.apply_all(frame.registry).unwrap_err();
    assert!(matches!(err, Error::PipelineState { stage: StageKind::OutputMerger, .. }));
    assert!(frame.pipeline.is_dirty(StageKind::OutputMerger));
}

// ============================================================================
// DRAW SUBMISSION
// ============================================================================

#[test]
fn test_integration_effect_draw_queue() {
    let mut t = reference_renderer();
    let vs = shader(&mut t.renderer, ShaderStage::Vertex, "vs_main");
    let ps = shader(&mut t.renderer, ShaderStage::Pixel, "ps_main");
    let transform = t.renderer.create_buffer(&BufferDesc::constant(64)).unwrap();
    let texture = t.renderer
        .create_texture_2d(&Texture2dDesc::render_target(128, 128, Format::R8G8B8A8_UNORM))
        .unwrap();
    let target = t.renderer
        .create_texture_2d(&Texture2dDesc::render_target(1280, 720, Format::R8G8B8A8_UNORM))
        .unwrap();
    let viewport = t.renderer.create_viewport(Viewport::full(1280, 720)).unwrap();

    let effect = Arc::new(Effect::new(EffectDesc {
        name: "textured".to_string(),
        shaders: vec![(ShaderStage::Vertex, vs), (ShaderStage::Pixel, ps)],
        bindings: vec![ResourceBinding::new(ShaderStage::Pixel, 0, BindingKind::ShaderResource, "DiffuseTexture")],
        constant_buffers: vec![
            ConstantBufferLayout::new(ShaderStage::Vertex, 0, transform, 64).field(WORLD_VIEW_PROJ_MATRIX, 0),
        ],
        ..EffectDesc::default()
    }).unwrap());
    let quad = Arc::new(Geometry::full_screen_quad(t.renderer.registry_mut().unwrap()).unwrap());

    let mut queue = DrawQueue::new();
    queue.push(effect.clone(), quad.clone(), Mat4::IDENTITY).unwrap();
    queue.push(effect, quad, Mat4::from_translation([1.0, 0.0, 0.0].into())).unwrap();

    let frame = t.renderer.frame().unwrap();
    frame.params.set_shader_resource("DiffuseTexture", texture.srv);
    frame.params.set_matrix(VIEW_PROJ_MATRIX, Mat4::IDENTITY);
    frame.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    frame.pipeline.rasterizer_mut().set_viewport_count(1).unwrap();
    frame.pipeline.rasterizer_mut().set_viewport(0, viewport).unwrap();
    t.log.clear();

    let drawn = queue.draw(frame.pipeline, frame.registry, frame.params).unwrap();

    assert_eq!(drawn, 2);
    assert_eq!(t.log.count(|c| matches!(c, DeviceCall::Draw { vertex_count: 4, .. })), 2);
    assert_eq!(t.log.count(|c| matches!(c, DeviceCall::UpdateSubresource { bytes: 64 })), 2);
    // Shaders, target and texture do not change between the two items
    assert_eq!(t.log.count(|c| matches!(c, DeviceCall::SetShader { stage: ShaderStage::Pixel })), 1);
    assert_eq!(t.log.count(|c| matches!(c, DeviceCall::SetRenderTargets { .. })), 1);
    assert_eq!(t.log.count(|c| matches!(c, DeviceCall::SetShaderResources { .. })), 1);
    assert_eq!(frame.pipeline.take_stats().draw_calls, 2);
}

#[test]
fn test_integration_missing_parameter_is_pipeline_state() {
    let mut t = reference_renderer();
    let ps = shader(&mut t.renderer, ShaderStage::Pixel, "ps_main");
    let effect = Effect::new(EffectDesc {
        shaders: vec![(ShaderStage::Pixel, ps)],
        bindings: vec![ResourceBinding::new(ShaderStage::Pixel, 3, BindingKind::Sampler, "LinearSampler")],
        ..EffectDesc::default()
    }).unwrap();

    let frame = t.renderer.frame().unwrap();
    let err = effect.bind(frame.pipeline, frame.registry, frame.params).unwrap_err();

    assert!(matches!(err, Error::PipelineState { stage: StageKind::Pixel, slot: Some(3), .. }));
}
