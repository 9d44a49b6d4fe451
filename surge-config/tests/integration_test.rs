//! Integration tests for surge-config

use std::io::Write;
use std::time::Duration;
use surge_config::*;
use temp_env::{with_vars, with_vars_unset};

const LOAD_VARS: [&str; 6] = [
    "SURGE_HTTP_TIMEOUT",
    "SURGE_START_RATE",
    "SURGE_MAX_WORKERS",
    "SURGE_PRE_ALLOCATED_WORKERS",
    "SURGE_LOG_LEVEL",
    "SURGE_LOG_FORMAT",
];

#[test]
fn test_default_config_validation() {
    let config = SurgeConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("SURGE_HTTP_TIMEOUT", Some("5")),
        ("SURGE_BASE_URL", Some("http://127.0.0.1:8080")),
        ("SURGE_START_RATE", Some("750")),
        ("SURGE_MAX_WORKERS", Some("20")),
        ("SURGE_PRE_ALLOCATED_WORKERS", Some("10")),
        ("SURGE_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::new();
        let config = loader.from_env().unwrap();

        assert_eq!(config.http.timeout, Duration::from_secs(5));
        assert_eq!(config.target.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.load.start_request_rate, 750.0);
        assert!(config
            .load
            .stages
            .iter()
            .all(|s| s.target_request_rate == 750.0));
        assert_eq!(config.load.max_workers, 20);
        assert_eq!(config.load.pre_allocated_workers, 10);
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_invalid_env_value_is_reported() {
    with_vars(vec![("SURGE_MAX_WORKERS", Some("many"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("LOADGEN_PASSWORD", Some("s3cret"))], || {
        let config = ConfigLoader::with_prefix("LOADGEN").from_env().unwrap();
        assert_eq!(config.target.password, "s3cret");
    });
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = SurgeConfig::generate_sample();
    let parsed: SurgeConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.load.stages, SurgeConfig::default().load.stages);
}

#[test]
fn test_comprehensive_config() {
    let yaml = r#"
target:
  base_url: "http://localhost:3000"
  password: "heslo"
  session_cookie: "katastr_session"

http:
  timeout: 10
  user_agent: "surge-test"

load:
  start_request_rate: 1000
  requests_per_iteration: 50
  pre_allocated_workers: 5
  max_workers: 25
  graceful_stop: 5
  lag_warning: 250
  stages:
    - target_request_rate: 2000
      duration: 60
    - target_request_rate: 500
      duration: 30

thresholds:
  http_req_failed: ["rate<0.05"]
  post_kraj: ["p(99)<800", "avg<200"]

logging:
  level: warn
  format: json
"#;

    let config = with_vars_unset(LOAD_VARS, || ConfigLoader::new().from_yaml_str(yaml).unwrap());

    assert_eq!(config.http.timeout, Duration::from_secs(10));
    assert_eq!(config.load.start_request_rate, 1000.0);
    assert_eq!(config.load.stages.len(), 2);
    assert_eq!(config.load.total_duration(), Duration::from_secs(90));
    assert_eq!(config.load.lag_warning, Duration::from_millis(250));
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.thresholds.pairs().count(), 3);
    assert!(!config.thresholds.rules.contains_key("http_req_duration"));
}

#[test]
fn test_invalid_file_config_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "load:\n  pre_allocated_workers: 10\n  max_workers: 2\n"
    )
    .unwrap();

    let err = with_vars_unset(LOAD_VARS, || {
        ConfigLoader::new().from_file(file.path()).unwrap_err()
    });
    match err {
        ConfigError::Domain { domain, .. } => assert_eq!(domain, "load"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ConfigLoader::new()
        .from_file("/definitely/not/here/surge.yaml")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
