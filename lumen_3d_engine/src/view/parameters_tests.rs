use super::*;
use glam::{Mat4, Vec3, Vec4};

fn handle(raw: u64) -> ResourceHandle {
    ResourceHandle::from_raw(raw)
}

#[test]
fn test_set_and_get_typed_values() {
    let mut params = ParameterManager::new();
    params.set_vector(TIME, Vec4::new(1.5, 0.0, 0.0, 0.0));
    params.set_matrix(VIEW_MATRIX, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));

    assert_eq!(params.len(), 2);
    assert_eq!(params.vector(TIME), Some(Vec4::new(1.5, 0.0, 0.0, 0.0)));
    assert!(params.matrix(VIEW_MATRIX).is_some());
    // Wrong kind accessor returns None
    assert_eq!(params.matrix(TIME), None);
    assert_eq!(params.vector("Missing"), None);
}

#[test]
fn test_set_replaces_value_of_other_kind() {
    let mut params = ParameterManager::new();
    params.set_vector("Color", Vec4::ONE);
    params.set_shader_resource("Color", handle(1 | (1 << 32)));

    assert_eq!(params.len(), 1);
    assert_eq!(params.get("Color").map(|v| v.kind()), Some(ParameterKind::ShaderResource));
    assert_eq!(params.vector("Color"), None);
}

#[test]
fn test_handle_values() {
    let h = handle(3 | (1 << 32));
    assert_eq!(ParameterValue::Sampler(h).handle(), Some(h));
    assert_eq!(ParameterValue::ConstantBuffer(h).handle(), Some(h));
    assert_eq!(ParameterValue::UnorderedAccess(h).handle(), Some(h));
    assert_eq!(ParameterValue::Vector(Vec4::ZERO).handle(), None);
}

#[test]
fn test_constant_bytes_sizes() {
    let v = ParameterValue::Vector(Vec4::new(1.0, 2.0, 3.0, 4.0));
    let m = ParameterValue::Matrix(Mat4::IDENTITY);
    assert_eq!(v.constant_bytes().map(|b| b.len()), Some(16));
    assert_eq!(m.constant_bytes().map(|b| b.len()), Some(64));
    assert_eq!(&v.constant_bytes().unwrap()[0..4], &1.0f32.to_ne_bytes());
    assert!(ParameterValue::Sampler(ResourceHandle::default()).constant_bytes().is_none());
}

#[test]
fn test_remove_and_clear() {
    let mut params = ParameterManager::new();
    params.set_vector("A", Vec4::ZERO);
    params.set_vector("B", Vec4::ZERO);

    assert!(params.remove("A").is_some());
    assert!(!params.contains("A"));
    params.clear();
    assert!(params.is_empty());
}

#[test]
fn test_gbuffer_target_names() {
    assert_eq!(gbuffer_target(0), "GBufferTarget0");
    assert_eq!(gbuffer_target(3), "GBufferTarget3");
}
