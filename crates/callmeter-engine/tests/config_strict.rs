#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use callmeter_core::call::CallTarget;
use callmeter_engine::config::CallMeterConfig;
use callmeter_engine::{config, InMemoryRegistry, InstrumentedCallEngine, Interceptor};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
operations:
  - unit: "StockManager"
    method: "add_items"
    histgram: true # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIGURATION");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert!(cfg.operations.is_empty());
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn odd_extra_tags_fail_at_load_time() {
    let bad = r#"
version: 1
operations:
  - unit: "StockManager"
    method: "add_items"
    extra_tags: ["team"]
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIGURATION");
    assert!(err.to_string().contains("StockManager.add_items"));
}

#[test]
fn bad_percentile_and_empty_unit_fail() {
    let bad = r#"
version: 1
operations:
  - unit: "StockManager"
    percentiles: [0.5, 2.0]
"#;
    assert!(config::load_from_str(bad).is_err());

    let bad = r#"
version: 1
operations:
  - unit: ""
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn apply_installs_method_and_unit_specs() {
    let yaml = r#"
version: 1
operations:
  - unit: "StockManager"
    histogram: true
    percentiles: [0.9, 0.95, 0.9999]
  - unit: "StockManager"
    method: "rebuild"
    metric_name: "stock.rebuild"
    long_task: true
    description: "rebuild in flight"
  - unit: "StockManager"
    method: "add_items"
    extra_tags: ["team", "inventory"]
    logging_enabled: true
"#;
    let cfg = config::load_from_str(yaml).unwrap();

    let engine = Arc::new(InstrumentedCallEngine::new(Arc::new(InMemoryRegistry::new())));
    let interceptor = Interceptor::new(engine);
    assert_eq!(cfg.apply(&interceptor).unwrap(), 3);

    let rebuild = interceptor.resolve(&CallTarget::new("StockManager", "rebuild")).unwrap();
    assert!(rebuild.is_long_task());
    assert_eq!(rebuild.resolved_metric_name(), "stock.rebuild");
    assert_eq!(rebuild.description(), Some("rebuild in flight"));

    let add = interceptor.resolve(&CallTarget::new("StockManager", "add_items")).unwrap();
    assert!(add.logging_enabled());
    assert_eq!(add.extra_tags().get("team"), Some("inventory"));

    let other = interceptor.resolve(&CallTarget::new("StockManager", "get_items")).unwrap();
    assert!(other.histogram());
    assert_eq!(other.percentiles(), &[0.9, 0.95, 0.9999]);
}

#[test]
fn apply_installs_nothing_when_any_operation_is_invalid() {
    let yaml = r#"
version: 1
operations:
  - unit: "StockManager"
    method: "add_items"
  - unit: "StockManager"
    method: "rebuild"
    percentiles: [0.5, 2.0]
"#;
    let cfg: CallMeterConfig = serde_yaml::from_str(yaml).unwrap();

    let engine = Arc::new(InstrumentedCallEngine::new(Arc::new(InMemoryRegistry::new())));
    let interceptor = Interceptor::new(engine);
    let err = cfg.apply(&interceptor).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIGURATION");
    assert!(interceptor.registered_methods().is_empty());
    assert!(interceptor.registered_units().is_empty());
}

#[test]
fn missing_file_is_an_internal_error() {
    let err = config::load_from_file("does/not/exist.yaml").expect_err("must fail");
    assert_eq!(err.code().as_str(), "INTERNAL");
}
