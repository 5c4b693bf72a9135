//! Unit tests for PipelineManager and the stage state blocks

use super::*;
use std::sync::Arc;
use crate::device::{
    ReferenceDevice, DeviceCallLog, DeviceCall, DriverType, FeatureLevel, GraphicsDevice,
    BufferDesc, Texture2dDesc, Format, SamplerDesc, ShaderDesc, Viewport, ScissorRect,
    PrimitiveTopology, IndexFormat, DepthStencilDesc, BlendDesc, IMMEDIATE_CONTEXT,
};
use crate::registry::ResourceProxy;
use crate::pipeline::RENDER_TARGET_SLOTS;

struct Fixture {
    device: ReferenceDevice,
    registry: ResourceRegistry,
    pipeline: PipelineManager,
    log: DeviceCallLog,
}

fn fixture() -> Fixture {
    let log = DeviceCallLog::new();
    let (device, context) =
        ReferenceDevice::create(DriverType::Reference, FeatureLevel::LEVEL_11_0, log.clone()).unwrap();
    let registry = ResourceRegistry::new(Arc::new(device.clone()), 2);
    let pipeline = PipelineManager::new(Box::new(context));
    Fixture { device, registry, pipeline, log }
}

fn render_target(f: &mut Fixture) -> ResourceProxy {
    f.registry
        .create_texture_2d(&Texture2dDesc::render_target(1280, 720, Format::R8G8B8A8_UNORM))
        .unwrap()
}

fn shader(f: &mut Fixture, stage: ShaderStage) -> ResourceHandle {
    f.registry
        .create_shader(&ShaderDesc { stage, bytecode: vec![1, 2, 3, 4], entry_point: "main".to_string() })
        .unwrap()
}

// ============================================================================
// Diff and apply
// ============================================================================

#[test]
fn test_single_render_target_one_call_then_none() {
    let mut f = fixture();
    let target = render_target(&mut f);

    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    let stats = f.pipeline.apply_all(&f.registry).unwrap();

    assert_eq!(stats.bind_calls, 1);
    assert_eq!(f.log.calls(), vec![DeviceCall::SetRenderTargets { start: 0, count: 1 }]);
    assert_eq!(f.pipeline.output_merger().bound_render_target(0), Some(target.rtv));

    let again = f.pipeline.apply_all(&f.registry).unwrap();
    assert_eq!(again.bind_calls, 0);
    assert_eq!(f.log.len(), 1);
}

#[test]
fn test_same_value_set_twice_issues_no_call() {
    let mut f = fixture();
    let target = render_target(&mut f);
    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    f.pipeline.apply_all(&f.registry).unwrap();

    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    assert!(f.pipeline.is_dirty(StageKind::OutputMerger));
    assert_eq!(f.pipeline.apply_all(&f.registry).unwrap().bind_calls, 0);
    assert!(!f.pipeline.is_dirty(StageKind::OutputMerger));
}

#[test]
fn test_adjacent_slots_coalesce_into_ranges() {
    let mut f = fixture();
    let views: Vec<ResourceHandle> = (0..4)
        .map(|_| {
            f.registry
                .create_texture_2d(&Texture2dDesc::sampled(2, 2, Format::R8G8B8A8_UNORM, vec![0; 16]))
                .unwrap()
                .srv
        })
        .collect();

    let ps = f.pipeline.shader_stage_mut(ShaderStage::Pixel);
    ps.set_shader_resource(0, views[0]).unwrap();
    ps.set_shader_resource(1, views[1]).unwrap();
    ps.set_shader_resource(2, views[2]).unwrap();
    ps.set_shader_resource(10, views[3]).unwrap();

    let stats = f.pipeline.apply_stage(StageKind::Pixel, &f.registry).unwrap();
    assert_eq!(stats.bind_calls, 2);
    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetShaderResources { stage: ShaderStage::Pixel, start: 0, count: 3 },
        DeviceCall::SetShaderResources { stage: ShaderStage::Pixel, start: 10, count: 1 },
    ]);
}

#[test]
fn test_apply_order_is_fixed() {
    let mut f = fixture();
    let target = render_target(&mut f);
    let vs = shader(&mut f, ShaderStage::Vertex);
    let ps = shader(&mut f, ShaderStage::Pixel);
    let vp = f.registry.create_viewport(Viewport::full(1280, 720)).unwrap();

    // Set in reverse order of application
    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    f.pipeline.rasterizer_mut().set_viewport_count(1).unwrap();
    f.pipeline.rasterizer_mut().set_viewport(0, vp).unwrap();
    f.pipeline.shader_stage_mut(ShaderStage::Pixel).set_shader(ps);
    f.pipeline.shader_stage_mut(ShaderStage::Vertex).set_shader(vs);
    f.pipeline.input_assembler_mut().set_primitive_topology(PrimitiveTopology::TriangleList);

    f.pipeline.apply_all(&f.registry).unwrap();

    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetPrimitiveTopology(PrimitiveTopology::TriangleList),
        DeviceCall::SetShader { stage: ShaderStage::Vertex },
        DeviceCall::SetShader { stage: ShaderStage::Pixel },
        DeviceCall::SetViewports { count: 1 },
        DeviceCall::SetRenderTargets { start: 0, count: 1 },
    ]);
}

#[test]
fn test_apply_render_targets_keeps_apply_order() {
    let mut f = fixture();
    let target = render_target(&mut f);
    let vp = f.registry.create_viewport(Viewport::full(1280, 720)).unwrap();

    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    f.pipeline.rasterizer_mut().set_viewport_count(1).unwrap();
    f.pipeline.rasterizer_mut().set_viewport(0, vp).unwrap();
    let stats = f.pipeline.apply_render_targets(&f.registry).unwrap();

    assert_eq!(stats.bind_calls, 2);
    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetViewports { count: 1 },
        DeviceCall::SetRenderTargets { start: 0, count: 1 },
    ]);
}

#[test]
fn test_input_assembler_bindings() {
    let mut f = fixture();
    let vertices: [[f32; 3]; 3] = [[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let vb = f.registry.create_buffer(&BufferDesc::vertex(&vertices)).unwrap();
    let ib = f.registry.create_buffer(&BufferDesc::index_u16(&[0, 1, 2])).unwrap();

    let ia = f.pipeline.input_assembler_mut();
    ia.set_vertex_buffer(0, vb, 12, 0).unwrap();
    ia.set_index_buffer(ib, IndexFormat::U16, 0);

    assert_eq!(f.pipeline.apply_stage(StageKind::InputAssembler, &f.registry).unwrap().bind_calls, 2);
    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetVertexBuffers { start: 0, count: 1 },
        DeviceCall::SetIndexBuffer { format: IndexFormat::U16 },
    ]);
    assert_eq!(f.pipeline.input_assembler().vertex_buffer(0).map(|b| b.stride), Some(12));
}

#[test]
fn test_viewports_set_as_whole_array() {
    let mut f = fixture();
    let a = f.registry.create_viewport(Viewport::full(640, 360)).unwrap();
    let b = f.registry.create_viewport(Viewport::full(1280, 720)).unwrap();

    let rs = f.pipeline.rasterizer_mut();
    rs.set_viewport_count(2).unwrap();
    rs.set_viewport(0, a).unwrap();
    rs.set_viewport(1, b).unwrap();
    f.pipeline.apply_stage(StageKind::Rasterizer, &f.registry).unwrap();

    // Changing one slot rebinds the whole array
    f.pipeline.rasterizer_mut().set_viewport(1, a).unwrap();
    f.pipeline.apply_stage(StageKind::Rasterizer, &f.registry).unwrap();

    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetViewports { count: 2 },
        DeviceCall::SetViewports { count: 2 },
    ]);

    // Slots past the count do not trigger a call
    f.pipeline.rasterizer_mut().set_viewport(5, b).unwrap();
    assert_eq!(f.pipeline.apply_stage(StageKind::Rasterizer, &f.registry).unwrap().bind_calls, 0);
}

#[test]
fn test_scissor_rects() {
    let mut f = fixture();
    let rs = f.pipeline.rasterizer_mut();
    rs.set_scissor_count(1).unwrap();
    rs.set_scissor_rect(0, ScissorRect { left: 0, top: 0, right: 64, bottom: 64 }).unwrap();
    f.pipeline.apply_all(&f.registry).unwrap();
    assert_eq!(f.log.calls(), vec![DeviceCall::SetScissorRects { count: 1 }]);
}

#[test]
fn test_active_unset_viewport_fails() {
    let mut f = fixture();
    f.pipeline.rasterizer_mut().set_viewport_count(1).unwrap();
    let err = f.pipeline.apply_all(&f.registry).unwrap_err();
    assert!(matches!(err, Error::PipelineState { stage: StageKind::Rasterizer, slot: Some(0), .. }));
}

#[test]
fn test_depth_blend_and_depth_stencil_states() {
    let mut f = fixture();
    let depth = f.registry.create_texture_2d(&Texture2dDesc::depth_buffer(64, 64)).unwrap();
    let blend = f.registry.create_blend_state(&BlendDesc::default()).unwrap();
    let dss = f.registry.create_depth_stencil_state(&DepthStencilDesc::stencil_write()).unwrap();

    let om = f.pipeline.output_merger_mut();
    om.set_depth_target(depth.dsv);
    om.set_blend_state(blend, [1.0; 4], u32::MAX);
    om.set_depth_stencil_state(dss, 1);
    f.pipeline.apply_all(&f.registry).unwrap();

    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetDepthStencilView,
        DeviceCall::SetBlendState,
        DeviceCall::SetDepthStencilState { stencil_ref: 1 },
    ]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_slot_out_of_range() {
    let mut f = fixture();
    let target = render_target(&mut f);
    let err = f.pipeline.output_merger_mut().set_render_target(8, target.rtv).unwrap_err();
    assert!(err.is_programmer_error());
    assert!(matches!(err, Error::SlotRange { stage: StageKind::OutputMerger, slot: 8, capacity: RENDER_TARGET_SLOTS }));

    let err = f.pipeline.shader_stage_mut(ShaderStage::Pixel).set_unordered_access_view(0, target.rtv).unwrap_err();
    assert!(matches!(err, Error::SlotRange { capacity: 0, .. }));

    assert!(f.pipeline.rasterizer_mut().set_viewport_count(17).is_err());
}

#[test]
fn test_wrong_kind_fails_apply_and_stays_dirty() {
    let mut f = fixture();
    let sampler = f.registry.create_sampler_state(&SamplerDesc::default()).unwrap();

    f.pipeline.output_merger_mut().set_render_target(0, sampler).unwrap();
    let err = f.pipeline.apply_all(&f.registry).unwrap_err();

    assert!(matches!(err, Error::PipelineState { stage: StageKind::OutputMerger, slot: Some(0), .. }));
    assert!(f.pipeline.is_dirty(StageKind::OutputMerger));
    assert_eq!(f.log.binding_count(), 0);
}

#[test]
fn test_partial_apply_keeps_earlier_stages() {
    let mut f = fixture();
    let vs = shader(&mut f, ShaderStage::Vertex);
    let target = render_target(&mut f);
    f.registry.destroy(target.rtv);

    f.pipeline.shader_stage_mut(ShaderStage::Vertex).set_shader(vs);
    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    let err = f.pipeline.apply_all(&f.registry).unwrap_err();

    assert!(matches!(err, Error::PipelineState { stage: StageKind::OutputMerger, .. }));
    assert!(!f.pipeline.is_dirty(StageKind::Vertex));
    assert_eq!(f.log.calls(), vec![DeviceCall::SetShader { stage: ShaderStage::Vertex }]);
}

#[test]
fn test_shader_of_wrong_stage_rejected() {
    let mut f = fixture();
    let vs = shader(&mut f, ShaderStage::Vertex);
    f.pipeline.shader_stage_mut(ShaderStage::Pixel).set_shader(vs);
    assert!(matches!(
        f.pipeline.apply_stage(StageKind::Pixel, &f.registry),
        Err(Error::PipelineState { stage: StageKind::Pixel, slot: None, .. })
    ));
}

#[test]
fn test_device_lost_passes_through_apply() {
    let mut f = fixture();
    let target = render_target(&mut f);
    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    f.device.simulate_device_removed();

    assert!(f.pipeline.apply_all(&f.registry).unwrap_err().is_device_lost());
}

fn bind_pixel_srv_then_destroy(f: &mut Fixture) -> ResourceProxy {
    let texture = render_target(f);
    f.pipeline.shader_stage_mut(ShaderStage::Pixel).set_shader_resource(0, texture.srv).unwrap();
    f.pipeline.apply_all(&f.registry).unwrap();
    let native = f.registry
        .resolve_native(texture.srv, ResourceKind::ShaderResourceView)
        .unwrap()
        .unwrap();

    f.registry.destroy(texture.srv);
    f.registry.destroy(texture.rtv);
    f.registry.destroy(texture.resource);
    for _ in 0..4 {
        f.registry.advance_frame();
    }
    assert!(!f.device.is_live(native));
    f.log.clear();
    texture
}

#[test]
fn test_released_binding_cannot_reach_a_draw() {
    let mut f = fixture();
    bind_pixel_srv_then_destroy(&mut f);

    let err = f.pipeline.draw(&f.registry, 3, 0).unwrap_err();

    assert!(matches!(err, Error::PipelineState { stage: StageKind::Pixel, slot: Some(0), .. }));
    assert_eq!(f.log.count(|c| matches!(c, DeviceCall::Draw { .. })), 0);
}

#[test]
fn test_released_binding_is_replaced_before_draw() {
    let mut f = fixture();
    bind_pixel_srv_then_destroy(&mut f);

    f.pipeline.shader_stage_mut(ShaderStage::Pixel).set_shader_resource(0, ResourceHandle::default()).unwrap();
    f.pipeline.draw(&f.registry, 3, 0).unwrap();

    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetShaderResources { stage: ShaderStage::Pixel, start: 0, count: 1 },
        DeviceCall::Draw { vertex_count: 3, start_vertex: 0 },
    ]);
    assert_eq!(
        f.pipeline.shader_stage(ShaderStage::Pixel).bound_shader_resource(0),
        Some(ResourceHandle::default())
    );
}

// ============================================================================
// Clearing
// ============================================================================

#[test]
fn test_clear_render_targets_unbinds() {
    let mut f = fixture();
    let target = render_target(&mut f);
    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    f.pipeline.apply_all(&f.registry).unwrap();

    f.pipeline.clear_render_targets();
    assert_eq!(f.pipeline.apply_render_targets(&f.registry).unwrap().bind_calls, 1);
    assert_eq!(f.pipeline.output_merger().bound_render_target(0), Some(ResourceHandle::default()));
}

#[test]
fn test_clear_pipeline_resources_keeps_shaders() {
    let mut f = fixture();
    let ps = shader(&mut f, ShaderStage::Pixel);
    let sampler = f.registry.create_sampler_state(&SamplerDesc::default()).unwrap();
    let stage = f.pipeline.shader_stage_mut(ShaderStage::Pixel);
    stage.set_shader(ps);
    stage.set_sampler(0, sampler).unwrap();
    f.pipeline.apply_all(&f.registry).unwrap();

    f.pipeline.clear_pipeline_resources();
    assert_eq!(f.pipeline.shader_stage(ShaderStage::Pixel).shader(), ps);
    assert_eq!(f.pipeline.shader_stage(ShaderStage::Pixel).sampler(0), Some(ResourceHandle::default()));
    assert_eq!(f.pipeline.apply_all(&f.registry).unwrap().bind_calls, 1);
}

#[test]
fn test_clear_pipeline_state_resets_everything() {
    let mut f = fixture();
    let vs = shader(&mut f, ShaderStage::Vertex);
    f.pipeline.shader_stage_mut(ShaderStage::Vertex).set_shader(vs);
    f.pipeline.input_assembler_mut().set_primitive_topology(PrimitiveTopology::TriangleStrip);
    f.pipeline.apply_all(&f.registry).unwrap();

    f.pipeline.clear_pipeline_state();
    assert_eq!(f.pipeline.input_assembler().primitive_topology(), PrimitiveTopology::Undefined);
    assert_eq!(f.pipeline.apply_all(&f.registry).unwrap().bind_calls, 2);
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_draw_applies_first_and_counts() {
    let mut f = fixture();
    f.pipeline.input_assembler_mut().set_primitive_topology(PrimitiveTopology::TriangleList);
    f.pipeline.draw(&f.registry, 3, 0).unwrap();
    f.pipeline.draw_indexed(&f.registry, 6, 0, 0).unwrap();

    assert_eq!(f.log.calls(), vec![
        DeviceCall::SetPrimitiveTopology(PrimitiveTopology::TriangleList),
        DeviceCall::Draw { vertex_count: 3, start_vertex: 0 },
        DeviceCall::DrawIndexed { index_count: 6, start_index: 0, base_vertex: 0 },
    ]);

    let stats = f.pipeline.take_stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.bind_calls, 1);
    assert_eq!(f.pipeline.take_stats(), PipelineStats::default());
}

#[test]
fn test_clears_and_buffer_update() {
    let mut f = fixture();
    let target = render_target(&mut f);
    let depth = f.registry.create_texture_2d(&Texture2dDesc::depth_buffer(64, 64)).unwrap();
    let cb = f.registry.create_buffer(&BufferDesc::constant(64)).unwrap();

    f.pipeline.clear_color_target(&f.registry, target.rtv, [0.0, 0.0, 0.0, 1.0]).unwrap();
    f.pipeline.clear_depth_stencil_target(&f.registry, depth.dsv, ClearFlags::DEPTH | ClearFlags::STENCIL, 1.0, 0).unwrap();
    f.pipeline.update_buffer(&f.registry, cb, &[0u8; 64]).unwrap();

    assert!(f.pipeline.clear_color_target(&f.registry, ResourceHandle::default(), [0.0; 4]).is_err());
    assert_eq!(f.pipeline.take_stats().clears, 2);
    assert_eq!(f.log.count(|c| matches!(c, DeviceCall::UpdateSubresource { bytes: 64 })), 1);
}

#[test]
fn test_deferred_context_resets_after_finish() {
    let mut f = fixture();
    let mut deferred = PipelineManager::new(f.device.create_deferred_context().unwrap());
    assert_eq!(deferred.context_kind(), ContextKind::Deferred);

    deferred.input_assembler_mut().set_primitive_topology(PrimitiveTopology::TriangleList);
    deferred.draw(&f.registry, 3, 0).unwrap();
    let list = deferred.finish_command_list().unwrap();

    assert_eq!(deferred.input_assembler().primitive_topology(), PrimitiveTopology::Undefined);
    assert!(!deferred.is_dirty(StageKind::InputAssembler));
    assert!(f.pipeline.finish_command_list().is_err());
    assert!(deferred.execute_command_list(list).is_err());

    f.pipeline.execute_command_list(list).unwrap();
    assert_eq!(f.log.calls_for(IMMEDIATE_CONTEXT), vec![DeviceCall::ExecuteCommandList]);
}

#[test]
fn test_execute_command_list_rebinds_desired_state() {
    let mut f = fixture();
    let target = render_target(&mut f);
    f.pipeline.output_merger_mut().set_render_target(0, target.rtv).unwrap();
    f.pipeline.apply_all(&f.registry).unwrap();

    let mut deferred = PipelineManager::new(f.device.create_deferred_context().unwrap());
    let list = deferred.finish_command_list().unwrap();
    f.pipeline.execute_command_list(list).unwrap();

    assert!(f.pipeline.is_dirty(StageKind::OutputMerger));
    assert_eq!(f.pipeline.apply_all(&f.registry).unwrap().bind_calls, 1);
}
