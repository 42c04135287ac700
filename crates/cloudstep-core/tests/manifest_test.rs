use cloudstep_core::{AppManifest, Error};
use tempfile::TempDir;

#[test]
fn parses_flex_manifest() {
    let manifest = AppManifest::parse(
        r#"
runtime: go122
env: flex
service: api
entrypoint: ./server
env_variables:
  MODE: prod
  LOG_LEVEL: debug
automatic_scaling:
  min_num_instances: 1
"#,
    )
    .unwrap();

    assert_eq!(manifest.runtime(), Some("go122"));
    assert_eq!(manifest.service_name(), "api");
    assert_eq!(manifest.entrypoint.as_deref(), Some("./server"));
    assert_eq!(manifest.env_variables["MODE"], "prod");
    assert_eq!(manifest.env_variables.len(), 2);
    assert!(manifest.validate_flex().is_ok());
}

#[test]
fn accepts_flexible_spelling() {
    let manifest = AppManifest::parse("runtime: python\nenv: flexible\n").unwrap();
    assert!(manifest.validate_flex().is_ok());
}

#[test]
fn missing_runtime_is_rejected() {
    let manifest = AppManifest::parse("env: flex\n").unwrap();
    let err = manifest.validate_flex().unwrap_err();

    assert!(matches!(err, Error::RuntimeRequired));
    assert_eq!(err.to_string(), "runtime is required");
    assert!(err.is_validation());
}

#[test]
fn standard_env_is_rejected() {
    let manifest = AppManifest::parse("runtime: go122\nenv: standard\n").unwrap();
    assert!(matches!(
        manifest.validate_flex(),
        Err(Error::UnsupportedEnv { env: Some(ref e) }) if e == "standard"
    ));
}

#[test]
fn missing_env_is_rejected() {
    let manifest = AppManifest::parse("runtime: go122\n").unwrap();
    assert!(matches!(
        manifest.validate_flex(),
        Err(Error::UnsupportedEnv { env: None })
    ));
}

#[test]
fn env_match_is_exact() {
    let manifest = AppManifest::parse("runtime: go122\nenv: Flex\n").unwrap();
    assert!(manifest.validate_flex().is_err());
}

#[test]
fn service_defaults_to_default() {
    let manifest = AppManifest::parse("runtime: go122\nenv: flex\n").unwrap();
    assert_eq!(manifest.service_name(), "default");
}

#[test]
fn empty_document_parses_to_defaults() {
    let manifest = AppManifest::parse("").unwrap();
    assert_eq!(manifest, AppManifest::default());
}

#[test]
fn load_reports_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = AppManifest::load(&tmp.path().join("app.yaml")).unwrap_err();
    assert!(matches!(err, Error::ManifestRead { .. }));
}

#[test]
fn load_reports_malformed_yaml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("app.yaml");
    std::fs::write(&path, "runtime: [unclosed\n").unwrap();

    let err = AppManifest::load(&path).unwrap_err();
    assert!(matches!(err, Error::ManifestParse { .. }));
}
