//! End-to-end taint scenarios, forward and bidirectional

mod common;

use codegraph_ifds::features::analyzers::new_taint_runner_from_config;
use codegraph_ifds::features::ifds::infrastructure::{
    BidiMode, ClassUnitResolver, MethodUnitResolver, SingletonUnitResolver,
};
use codegraph_ifds::features::ifds::IfdsUnitManager;
use codegraph_ifds::IfdsConfig;
use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn config_with_bidi(mode: BidiMode) -> IfdsConfig {
    IfdsConfig::default().bidi_mode(mode)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_recursion_terminates_without_findings() {
    init_tracing();
    let manager = taint_manager(fixture_recursive_taint(), MethodUnitResolver, &IfdsConfig::default());

    let outcome = manager
        .run(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert!(!outcome.timed_out);
    assert!(outcome.vulnerabilities.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_source_reaches_sink_across_units() {
    init_tracing();
    let manager = taint_manager(fixture_cross_unit_taint(), ClassUnitResolver, &IfdsConfig::default());

    let vulnerabilities = manager
        .analyze(&[method("app.web.Controller.handle")], Duration::from_secs(30))
        .await
        .unwrap();

    assert_single_finding(&vulnerabilities, "SQLI", &stmt("app.db.Repo.find", 1));
    assert_trace_visits(
        &vulnerabilities[0],
        &[method("app.web.Controller.handle"), method("app.db.Repo.find")],
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parameter_flow_needs_backward_pass() {
    init_tracing();
    let start = [method("app.Web.handle")];
    let timeout = Duration::from_secs(30);

    for mode in [BidiMode::Parallel, BidiMode::Sequential] {
        let manager = taint_manager(fixture_parameter_to_sink(), SingletonUnitResolver, &config_with_bidi(mode));
        let vulnerabilities = manager.analyze(&start, timeout).await.unwrap();
        assert_eq!(vulnerabilities.len(), 1, "mode {mode:?}");
        assert_eq!(vulnerabilities[0].rule, "SQLI");
        assert_eq!(vulnerabilities[0].trace_graph.sink.statement, stmt("app.Web.handle", 1));
    }

    let manager = taint_manager(
        fixture_parameter_to_sink(),
        SingletonUnitResolver,
        &config_with_bidi(BidiMode::Disabled),
    );
    assert!(manager.analyze(&start, timeout).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rules_loaded_from_yaml() {
    init_tracing();
    let yaml = r#"
taint:
  sources:
    - pattern: "^lib\\.Http\\.param$"
      mark: TAINT
  sinks:
    - pattern: "^lib\\.Db\\.query$"
      rule: SQL_INJECTION
"#;
    let config = IfdsConfig::from_yaml_str(yaml).unwrap();
    let factory = new_taint_runner_from_config(&config).unwrap();
    let manager = IfdsUnitManager::new(
        Arc::new(fixture_cross_unit_taint()),
        Arc::new(ClassUnitResolver),
        factory,
        test_options(),
    );

    let vulnerabilities = manager
        .analyze(&[method("app.web.Controller.handle")], Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(vulnerabilities.len(), 1);
    assert_eq!(vulnerabilities[0].rule, "SQL_INJECTION");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_alias_runner_follows_value_through_field() {
    init_tracing();
    let outcome = alias_manager(fixture_field_alias(), SingletonUnitResolver)
        .run(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert!(!outcome.timed_out);
    // the escaped copy reaching the second query is not reported
    assert_single_finding(&outcome.vulnerabilities, "SQLI", &stmt("app.Main.main", 3));
    assert_trace_visits(&outcome.vulnerabilities[0], &[method("app.Main.main")]);
}
