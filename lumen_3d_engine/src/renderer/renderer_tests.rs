//! Unit tests for renderer.rs
//!
//! Driver fallback runs against `MockDeviceFactory`; everything else uses a
//! `ReferenceDeviceFactory` whose call log shows what reached the device.

use super::*;
use std::sync::Mutex;
use serial_test::serial;
use slotmap::Key;
use crate::device::mock_device::MockDeviceFactory;
use crate::device::{DeviceCall, DeviceCallLog, ReferenceDeviceFactory};
use crate::log::{Logger, LogEntry, LogSeverity, set_logger, reset_logger};
use crate::view::PerspectiveView;

const LEVEL: FeatureLevel = FeatureLevel::LEVEL_11_0;

fn reference_renderer(config: RendererConfig) -> (Renderer, ReferenceDeviceFactory, DeviceCallLog) {
    let factory = ReferenceDeviceFactory::new();
    let log = factory.call_log();
    let mut renderer = Renderer::new(config, Box::new(factory.clone()));
    renderer.initialize(DriverType::Reference, LEVEL).unwrap();
    (renderer, factory, log)
}

/// Perspective view drawing into the back buffer of `swap_chain`
fn back_buffer_view(renderer: &mut Renderer, swap_chain: SwapChainId) -> RenderView {
    let back_buffer = renderer.swap_chain_resource(swap_chain).unwrap();
    let viewport = renderer.create_viewport(Viewport::full(1280, 720)).unwrap();
    let mut view = PerspectiveView::new([0.0, 0.0, 0.0, 1.0]);
    view.set_targets(back_buffer.rtv, ResourceHandle::default(), viewport).unwrap();
    view.into()
}

// ============================================================================
// INITIALIZATION
// ============================================================================

#[test]
fn test_initialize_reference_driver() {
    let (renderer, _, _) = reference_renderer(RendererConfig::default());

    assert!(renderer.is_initialized());
    assert_eq!(renderer.driver_type(), Some(DriverType::Reference));
    assert_eq!(renderer.feature_level(), Some(LEVEL));
    assert_eq!(renderer.registry().unwrap().frame_latency(), 2);
}

#[test]
fn test_hardware_used_when_available() {
    let factory = MockDeviceFactory::with_hardware(&[LEVEL]);
    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(factory.clone()));

    assert_eq!(renderer.initialize(DriverType::Hardware, LEVEL).unwrap(), DriverType::Hardware);
    assert_eq!(factory.attempts(), vec![(DriverType::Hardware, LEVEL)]);
}

#[test]
fn test_hardware_failure_falls_back_to_reference() {
    let factory = MockDeviceFactory::without_hardware();
    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(factory.clone()));

    assert_eq!(renderer.initialize(DriverType::Hardware, LEVEL).unwrap(), DriverType::Reference);
    assert_eq!(factory.attempts(), vec![
        (DriverType::Hardware, LEVEL),
        (DriverType::Reference, LEVEL),
    ]);
}

#[test]
fn test_invalid_feature_level_fails_after_fallback() {
    let bogus = FeatureLevel::new(12, 7);
    let factory = MockDeviceFactory::with_hardware(&[LEVEL]);
    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(factory.clone()));

    let result = renderer.initialize(DriverType::Hardware, bogus);

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    assert_eq!(factory.attempts().len(), 2);
    assert!(!renderer.is_initialized());
}

#[test]
fn test_fallback_can_be_disabled() {
    let factory = MockDeviceFactory::without_hardware();
    let config = RendererConfig { fallback_to_reference: false, ..RendererConfig::default() };
    let mut renderer = Renderer::new(config, Box::new(factory.clone()));

    assert!(matches!(
        renderer.initialize(DriverType::Hardware, LEVEL),
        Err(Error::InitializationFailed(_))
    ));
    assert_eq!(factory.attempts(), vec![(DriverType::Hardware, LEVEL)]);
}

#[test]
fn test_no_fallback_from_reference_request() {
    let factory = MockDeviceFactory::broken();
    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(factory.clone()));

    assert!(renderer.initialize(DriverType::Reference, LEVEL).is_err());
    assert_eq!(factory.attempts().len(), 1);
}

#[test]
fn test_initialize_twice_fails() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());
    assert!(matches!(
        renderer.initialize(DriverType::Reference, LEVEL),
        Err(Error::InvalidOperation(_))
    ));
}

#[test]
fn test_calls_before_initialize() {
    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(ReferenceDeviceFactory::new()));

    assert!(matches!(renderer.create_buffer(&BufferDesc::constant(16)), Err(Error::InvalidOperation(_))));
    assert!(matches!(renderer.render_views(&mut [], 0.0), Err(Error::InvalidOperation(_))));
    assert!(renderer.registry().is_err());
    assert!(!renderer.destroy(ResourceHandle::default()));
    assert_eq!(renderer.shutdown(), 0);
}

#[derive(Clone, Default)]
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

#[test]
#[serial]
fn test_fallback_is_logged_as_warning() {
    let logger = CaptureLogger::default();
    set_logger(logger.clone());

    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(MockDeviceFactory::without_hardware()));
    renderer.initialize(DriverType::Hardware, LEVEL).unwrap();
    reset_logger();

    let entries = logger.entries.lock().unwrap();
    assert!(entries.iter().any(|e| {
        e.source == "lumen3d::Renderer"
            && e.severity == LogSeverity::Warn
            && e.message.contains("falling back")
    }));
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
fn test_create_and_destroy_resources() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());

    let buffer = renderer.create_buffer(&BufferDesc::constant(64)).unwrap();
    assert!(renderer.registry().unwrap().contains(buffer));

    assert!(renderer.destroy(buffer));
    assert!(!renderer.destroy(buffer));
    assert!(matches!(renderer.registry().unwrap().resolve(buffer), Err(Error::InvalidHandle(_))));
}

#[test]
fn test_rejected_descriptor_is_recoverable() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());
    let before = renderer.registry().unwrap().len();

    let result = renderer.create_texture_2d(&Texture2dDesc::render_target(0, 0, crate::device::Format::R8G8B8A8_UNORM));

    assert!(matches!(result, Err(Error::ResourceCreation(_))));
    assert_eq!(renderer.registry().unwrap().len(), before);
}

#[test]
fn test_load_texture_creates_shader_resource() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());

    let proxy = renderer.load_texture(TextureImage::solid(8, 8, [10, 20, 30, 255]).unwrap()).unwrap();

    assert!(!proxy.srv.is_null());
    assert!(proxy.rtv.is_null());
    assert!(renderer.registry().unwrap().contains(proxy.resource));
}

#[test]
fn test_deferred_release_after_frame_latency() {
    let (mut renderer, _, log) = reference_renderer(RendererConfig::default());
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(64, 64)).unwrap();
    let buffer = renderer.create_buffer(&BufferDesc::constant(16)).unwrap();
    let releases = || log.count(|c| matches!(c, DeviceCall::Release(_)));

    renderer.destroy(buffer);
    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::Presented);
    assert_eq!(releases(), 0);
    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::Presented);
    assert_eq!(releases(), 1);
}

// ============================================================================
// SWAP CHAINS
// ============================================================================

#[test]
fn test_swap_chain_back_buffer() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());

    let id = renderer.create_swap_chain(&SwapChainDesc::new(1280, 720)).unwrap();
    let back_buffer = renderer.swap_chain_resource(id).unwrap();

    assert!(!back_buffer.rtv.is_null());
    assert!(back_buffer.srv.is_null());
    assert!(renderer.registry().unwrap().contains(back_buffer.rtv));
}

#[test]
fn test_resize_swap_chain_unbinds_and_replaces_back_buffer() {
    let (mut renderer, _, log) = reference_renderer(RendererConfig::default());
    let id = renderer.create_swap_chain(&SwapChainDesc::new(1280, 720)).unwrap();
    let old = renderer.swap_chain_resource(id).unwrap();
    {
        let frame = renderer.frame().unwrap();
        frame.pipeline.output_merger_mut().set_render_target(0, old.rtv).unwrap();
        frame.pipeline.apply_render_targets(frame.registry).unwrap();
    }
    log.clear();

    let new = renderer.resize_swap_chain(id, 640, 480).unwrap();

    assert_eq!(log.calls()[0], DeviceCall::SetRenderTargets { start: 0, count: 1 });
    assert_ne!(new, old);
    assert!(renderer.registry().unwrap().resolve(old.rtv).is_err());
    assert_eq!(renderer.swap_chain_resource(id).unwrap(), new);
    assert_eq!(
        renderer.pipeline().unwrap().output_merger().bound_render_target(0),
        Some(ResourceHandle::default())
    );
}

/// Programmer errors come back as values instead of panicking
fn returning_config() -> RendererConfig {
    RendererConfig { panic_on_programmer_error: false, ..RendererConfig::default() }
}

#[test]
fn test_programmer_errors_panic_by_default_in_debug_builds() {
    assert_eq!(RendererConfig::default().panic_on_programmer_error, cfg!(debug_assertions));
}

#[test]
fn test_unknown_swap_chain() {
    let (mut renderer, _, _) = reference_renderer(returning_config());

    assert!(matches!(renderer.swap_chain_resource(SwapChainId(3)), Err(Error::InvalidHandle(_))));
    assert!(matches!(renderer.present(SwapChainId(3)), Err(Error::InvalidHandle(_))));
    assert!(!renderer.destroy_swap_chain(SwapChainId(3)));
}

#[test]
#[should_panic(expected = "programmer error")]
fn test_programmer_error_panics_when_configured() {
    let config = RendererConfig { panic_on_programmer_error: true, ..RendererConfig::default() };
    let (renderer, _, _) = reference_renderer(config);
    let _ = renderer.swap_chain_resource(SwapChainId(9));
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
fn test_render_views_draws_configured_views() {
    let (mut renderer, _, log) = reference_renderer(RendererConfig::default());
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(1280, 720)).unwrap();
    let mut views = vec![back_buffer_view(&mut renderer, swap_chain)];

    assert_eq!(renderer.render_views(&mut views, 0.5).unwrap(), 1);
    assert_eq!(views[0].state(), crate::view::ViewState::Drawn);
    assert_eq!(log.count(|c| *c == DeviceCall::SetRenderTargets { start: 0, count: 1 }), 1);

    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::Presented);
    assert_eq!(renderer.registry().unwrap().frame_index(), 1);
}

#[test]
fn test_render_views_skips_pipeline_state_failures() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(1280, 720)).unwrap();
    let back_buffer = renderer.swap_chain_resource(swap_chain).unwrap();

    let mut broken = PerspectiveView::new([0.0; 4]);
    broken.set_targets(back_buffer.rtv, ResourceHandle::default(), ViewportId(42)).unwrap();
    let mut views = vec![RenderView::from(broken), back_buffer_view(&mut renderer, swap_chain)];

    assert_eq!(renderer.render_views(&mut views, 0.0).unwrap(), 1);
}

#[test]
fn test_render_views_reports_unconfigured_view() {
    let (mut renderer, _, _) = reference_renderer(RendererConfig::default());
    let mut views = vec![RenderView::from(PerspectiveView::new([0.0; 4]))];

    assert!(matches!(renderer.render_views(&mut views, 0.0), Err(Error::UnconfiguredView(_))));
}

#[test]
fn test_deferred_pipeline_submission() {
    let (mut renderer, _, log) = reference_renderer(returning_config());
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(256, 256)).unwrap();
    let back_buffer = renderer.swap_chain_resource(swap_chain).unwrap();

    let id = renderer.create_deferred_pipeline().unwrap();
    {
        let frame = renderer.deferred_frame(id).unwrap();
        frame.pipeline.output_merger_mut().set_render_target(0, back_buffer.rtv).unwrap();
        frame.pipeline.apply_all(frame.registry).unwrap();
    }
    renderer.submit_deferred(id).unwrap();

    let calls = log.calls();
    assert!(calls.contains(&DeviceCall::FinishCommandList));
    assert!(calls.contains(&DeviceCall::ExecuteCommandList));
    assert_eq!(
        renderer.deferred_pipeline_mut(id).unwrap().output_merger().render_target(0),
        Some(ResourceHandle::default())
    );

    assert!(renderer.destroy_deferred_pipeline(id));
    assert!(matches!(renderer.submit_deferred(id), Err(Error::InvalidHandle(_))));
}

// ============================================================================
// DEVICE LOSS
// ============================================================================

#[test]
fn test_device_loss_and_recovery() {
    let (mut renderer, factory, _) = reference_renderer(RendererConfig::default());
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(1280, 720)).unwrap();
    let buffer = renderer.create_buffer(&BufferDesc::constant(16)).unwrap();
    let mut views = vec![back_buffer_view(&mut renderer, swap_chain)];

    factory.last_device().unwrap().simulate_device_removed();

    assert!(matches!(renderer.create_buffer(&BufferDesc::constant(16)), Err(Error::DeviceLost(_))));
    assert!(renderer.is_device_lost());
    assert_eq!(renderer.render_views(&mut views, 0.0).unwrap(), 0);

    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::DeviceReset);
    assert!(!renderer.is_device_lost());
    assert_eq!(renderer.device_generation(), 1);

    let registry = renderer.registry().unwrap();
    assert!(!registry.contains(buffer));
    let back_buffer = renderer.swap_chain_resource(swap_chain).unwrap();
    assert!(renderer.registry().unwrap().contains(back_buffer.rtv));
    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::Presented);
}

#[test]
fn test_lost_device_detected_at_present() {
    let (mut renderer, factory, _) = reference_renderer(RendererConfig::default());
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(64, 64)).unwrap();

    factory.last_device().unwrap().simulate_device_removed();

    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::DeviceReset);
    assert_eq!(renderer.device_generation(), 1);
}

#[test]
fn test_failed_output_rebuild_keeps_device_lost() {
    let factory = MockDeviceFactory { swap_chain_failures: vec![1], ..MockDeviceFactory::without_hardware() };
    let mut renderer = Renderer::new(RendererConfig::default(), Box::new(factory.clone()));
    renderer.initialize(DriverType::Reference, LEVEL).unwrap();
    let swap_chain = renderer.create_swap_chain(&SwapChainDesc::new(64, 64)).unwrap();

    factory.last_device().unwrap().simulate_device_removed();

    // The second device cannot host the swap chain
    assert!(matches!(renderer.present(swap_chain), Err(Error::DeviceLost(_))));
    assert!(renderer.is_device_lost());
    assert_eq!(renderer.device_generation(), 0);

    // The third one can
    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::DeviceReset);
    assert!(!renderer.is_device_lost());
    assert_eq!(renderer.device_generation(), 1);
    assert_eq!(factory.attempts().len(), 3);

    let back_buffer = renderer.swap_chain_resource(swap_chain).unwrap();
    assert!(renderer.registry().unwrap().contains(back_buffer.rtv));
    assert_eq!(renderer.present(swap_chain).unwrap(), PresentStatus::Presented);
}

#[test]
fn test_shutdown_releases_everything() {
    let (mut renderer, factory, _) = reference_renderer(RendererConfig::default());
    renderer.create_swap_chain(&SwapChainDesc::new(64, 64)).unwrap();
    renderer.create_buffer(&BufferDesc::constant(16)).unwrap();

    // buffer, back buffer texture and its render target view
    assert_eq!(renderer.shutdown(), 3);
    assert!(!renderer.is_initialized());
    assert_eq!(factory.last_device().unwrap().live_object_count(), 0);
    assert_eq!(renderer.shutdown(), 0);
}
