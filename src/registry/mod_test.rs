use super::*;

#[test]
fn builtin_registry_loads_and_resolves_fast_edit() {
    let registry = ModelRegistry::builtin().unwrap();
    let spec = registry.resolve("fast-edit").unwrap();
    assert_eq!(spec.name, "fast-edit");
    assert_eq!(spec.endpoint, "fal-ai/flux/dev/image-to-image");
    assert_eq!(spec.defaults.num_inference_steps, Some(28));
    assert!(registry.resolve("nonexistent-model").is_none());
}

#[test]
fn list_preserves_file_order() {
    let registry = ModelRegistry::from_json(
        r#"{"models":{"zeta":{"endpoint":"a/z"},"alpha":{"endpoint":"a/a"},"mid":{"endpoint":"a/m"}}}"#,
    )
    .unwrap();
    let names: Vec<&str> = registry.list().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn to_params_merges_typed_and_extra_defaults() {
    let registry = ModelRegistry::from_json(
        r#"{"models":{"m":{"endpoint":"fal-ai/m","defaults":{"strength":0.5,"num_inference_steps":10,"guidance_scale":2.0,"output_format":"png"}}}}"#,
    )
    .unwrap();
    let params = registry.resolve("m").unwrap().defaults.to_params();
    assert_eq!(params.get("strength").and_then(Value::as_f64), Some(0.5));
    assert_eq!(params.get("num_inference_steps").and_then(Value::as_u64), Some(10));
    assert_eq!(params.get("guidance_scale").and_then(Value::as_f64), Some(2.0));
    assert_eq!(params.get("output_format").and_then(Value::as_str), Some("png"));
}

#[test]
fn endpoint_slashes_are_trimmed() {
    let registry = ModelRegistry::from_json(r#"{"models":{"m":{"endpoint":" /fal-ai/m/ "}}}"#).unwrap();
    assert_eq!(registry.resolve("m").unwrap().endpoint, "fal-ai/m");
}

#[test]
fn empty_registry_is_rejected() {
    let err = ModelRegistry::from_json(r#"{"models":{}}"#).unwrap_err();
    assert!(matches!(err, RegistryError::Invalid(_)));
}

#[test]
fn empty_endpoint_is_rejected() {
    let err = ModelRegistry::from_json(r#"{"models":{"m":{"endpoint":"  "}}}"#).unwrap_err();
    assert!(err.to_string().contains("endpoint must not be empty"));
}

#[test]
fn out_of_range_strength_is_rejected() {
    let err = ModelRegistry::from_json(r#"{"models":{"m":{"endpoint":"x","defaults":{"strength":1.5}}}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("strength"));
}

#[test]
fn zero_steps_is_rejected() {
    let err =
        ModelRegistry::from_json(r#"{"models":{"m":{"endpoint":"x","defaults":{"num_inference_steps":0}}}}"#)
            .unwrap_err();
    assert!(err.to_string().contains("num_inference_steps"));
}

#[test]
fn negative_guidance_is_rejected() {
    let err = ModelRegistry::from_json(r#"{"models":{"m":{"endpoint":"x","defaults":{"guidance_scale":-1}}}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("guidance_scale"));
}

#[test]
fn malformed_json_is_parse_error() {
    let err = ModelRegistry::from_json("{not json").unwrap_err();
    assert!(matches!(err, RegistryError::Parse(_)));
}

#[test]
fn load_reads_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.json");
    std::fs::write(&path, r#"{"models":{"local":{"endpoint":"fal-ai/local"}}}"#).unwrap();

    let registry = ModelRegistry::load(Some(&path)).unwrap();
    assert!(registry.resolve("local").is_some());
    assert!(registry.resolve("fast-edit").is_none());
}

#[test]
fn load_missing_file_is_io_error() {
    let err = ModelRegistry::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
}

#[test]
fn load_without_path_uses_builtin() {
    let registry = ModelRegistry::load(None).unwrap();
    assert!(registry.resolve("fast-edit").is_some());
}
