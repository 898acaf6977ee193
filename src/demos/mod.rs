/*!
 * Demo Scenarios
 *
 * Small programs built on the toolkit's primitives:
 * - **bank**: read/write-locked balances and ordered two-card transfers
 * - **nightclub**: semaphore admission with atomic occupancy tracking
 * - **dishes**: LIFO producer/consumer pipeline with cancellation
 * - **character**: lock-free health/armor and CAS retry loops
 * - **stock**: concurrent map shared by sales workers
 * - **terminal**: completion signaling from a device thread
 * - **deadlock**: inconsistent lock ordering surfacing as timeouts
 */

pub mod bank;
pub mod character;
pub mod deadlock;
pub mod dishwashing;
pub mod nightclub;
pub mod stock;
pub mod terminal;

use crate::core::errors::SyncResult;
use crate::core::sync::SyncConfig;
use crate::monitoring::span_scenario;
use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Scenario names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    Bank,
    Nightclub,
    Dishes,
    Character,
    Stock,
    Terminal,
    Deadlock,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::Bank,
        Scenario::Nightclub,
        Scenario::Dishes,
        Scenario::Character,
        Scenario::Stock,
        Scenario::Terminal,
        Scenario::Deadlock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Bank => "bank",
            Scenario::Nightclub => "nightclub",
            Scenario::Dishes => "dishes",
            Scenario::Character => "character",
            Scenario::Stock => "stock",
            Scenario::Terminal => "terminal",
            Scenario::Deadlock => "deadlock",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[error("Unknown scenario: {0}")]
#[diagnostic(
    code(demo::unknown_scenario),
    help("Expected one of: bank, nightclub, dishes, character, stock, terminal, deadlock, all")
)]
pub struct UnknownScenario(pub String);

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

/// Outcome of one scenario, tagged with its name
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "scenario", content = "report", rename_all = "snake_case")]
pub enum ScenarioReport {
    Bank(bank::BankReport),
    Nightclub(nightclub::NightReport),
    Dishes(dishwashing::PipelineReport),
    Character(character::CharacterReport),
    Stock(stock::StockReport),
    Terminal(terminal::PurchaseReceipt),
    Deadlock(deadlock::DeadlockReport),
}

/// Run one scenario with the given configuration
pub fn run_scenario(scenario: Scenario, config: &SyncConfig) -> SyncResult<ScenarioReport> {
    let lock_timeout = config.timeouts.lock_timeout().duration().unwrap_or(Duration::MAX);
    let signal_timeout = config.timeouts.signal_timeout().duration().unwrap_or(Duration::MAX);

    let mut span = span_scenario(scenario.name());
    let _entered = span.enter();

    let result = match scenario {
        Scenario::Bank => bank::run(&bank::BankPlan::default(), lock_timeout).map(ScenarioReport::Bank),
        Scenario::Nightclub => nightclub::open_night(
            &nightclub::NightPlan::default(),
            crate::core::guard::TimeoutPolicy::None,
        )
        .map(ScenarioReport::Nightclub),
        Scenario::Dishes => dishwashing::run(&dishwashing::PipelinePlan {
            rack_capacity: config.queue_capacity,
            patience: config.timeouts.queue_timeout().duration(),
            ..dishwashing::PipelinePlan::default()
        })
        .map(ScenarioReport::Dishes),
        Scenario::Character => Ok(ScenarioReport::Character(character::armor_storm(
            100,
            10,
            &config.escalation,
        ))),
        Scenario::Stock => Ok(ScenarioReport::Stock(stock::run(
            &["Bob", "Alice", "Rob"],
            Duration::from_millis(200),
            42,
        ))),
        Scenario::Terminal => {
            terminal::run(Duration::from_millis(300), signal_timeout).map(ScenarioReport::Terminal)
        }
        Scenario::Deadlock => {
            deadlock::run(Duration::from_millis(250)).map(ScenarioReport::Deadlock)
        }
    };

    drop(_entered);
    span.record_result(result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenarios() {
        assert_eq!("bank".parse::<Scenario>().unwrap(), Scenario::Bank);
        assert_eq!(" Dishes ".parse::<Scenario>().unwrap(), Scenario::Dishes);
        assert_eq!(
            "opera".parse::<Scenario>().unwrap_err(),
            UnknownScenario("opera".to_string())
        );
    }

    #[test]
    fn test_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
    }
}
