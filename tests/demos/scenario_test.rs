/*!
 * Scenario Runner Tests
 * Name parsing and JSON reports for the quick scenarios
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use sync_toolkit::core::sync::{QUEUE_TIMEOUT_ENV, SPIN_PROFILE_ENV};
use sync_toolkit::demos::{run_scenario, Scenario, ScenarioReport};
use sync_toolkit::SyncConfig;
use std::collections::HashMap;

fn config_from(vars: &[(&str, &str)]) -> SyncConfig {
    let vars: HashMap<String, String> =
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    SyncConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_unknown_scenario_has_diagnostic_code() {
    use miette::Diagnostic;

    let err = "opera".parse::<Scenario>().unwrap_err();
    assert_eq!(err.to_string(), "Unknown scenario: opera");
    assert_eq!(err.code().map(|code| code.to_string()).as_deref(), Some("demo::unknown_scenario"));
}

#[test]
#[serial]
fn test_deadlock_scenario_reports_timeouts() {
    let report = run_scenario(Scenario::Deadlock, &SyncConfig::default()).unwrap();

    let ScenarioReport::Deadlock(deadlock) = &report else {
        panic!("wrong report variant: {report:?}");
    };
    assert!(deadlock.timeouts() >= 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenario"], "deadlock");
    assert!(json["report"]["first_then_second"]["outcome"].is_string());
}

#[test]
#[serial]
fn test_character_scenario_settles() {
    let report = run_scenario(Scenario::Character, &SyncConfig::default()).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenario"], "character");
    assert_eq!(json["report"]["armor"], 0);
    assert_eq!(json["report"]["health"], 100);
    assert_eq!(json["report"]["weapon"]["name"], "sword");
    assert_eq!(json["report"]["empowered_armor"], 256);
}

#[test]
#[serial]
fn test_character_scenario_uses_configured_spin_profile() {
    let config = config_from(&[(SPIN_PROFILE_ENV, "long_wait")]);
    let ScenarioReport::Character(report) = run_scenario(Scenario::Character, &config).unwrap()
    else {
        panic!("wrong report variant");
    };
    assert_eq!(report.empowered_armor, 256);
}

#[test]
#[serial]
fn test_dishes_scenario_honours_queue_timeout() {
    // The eater outpaces the washer, so 1ms of patience on a full rack runs out
    let config = config_from(&[(QUEUE_TIMEOUT_ENV, "1")]);
    let ScenarioReport::Dishes(report) = run_scenario(Scenario::Dishes, &config).unwrap() else {
        panic!("wrong report variant");
    };

    assert!(report.stalls > 0, "no stalls with a 1ms queue timeout");
    assert_eq!(report.dirtied, report.washed + report.left_on_rack);
}

#[test]
#[serial]
fn test_terminal_scenario_completes() {
    let report = run_scenario(Scenario::Terminal, &SyncConfig::default()).unwrap();
    assert!(matches!(report, ScenarioReport::Terminal(receipt) if receipt.amount == 100));
}
