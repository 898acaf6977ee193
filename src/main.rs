/*!
 * Sync Toolkit - Demo Entry Point
 *
 * Runs the demo scenarios:
 * - bank, nightclub, dishes, character, stock, terminal, deadlock
 * - `all` runs every scenario in order
 *
 * Each report is printed to stdout as JSON; logs go through tracing.
 */

use miette::{IntoDiagnostic, Result};
use tracing::info;

use sync_toolkit::demos::{run_scenario, Scenario};
use sync_toolkit::monitoring::init_tracing;
use sync_toolkit::SyncConfig;

fn main() -> Result<()> {
    // Initialize structured tracing
    init_tracing();

    let arg = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());
    let scenarios = if arg.eq_ignore_ascii_case("all") {
        Scenario::ALL.to_vec()
    } else {
        vec![arg.parse::<Scenario>()?]
    };

    let config = SyncConfig::from_env();
    info!(
        lock_timeout = ?config.timeouts.lock_timeout(),
        queue_capacity = config.queue_capacity,
        "sync toolkit demo starting"
    );

    for scenario in scenarios {
        info!("================================================");
        info!(%scenario, "running scenario");
        let report = run_scenario(scenario, &config)?;
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    }

    info!("all scenarios finished");
    Ok(())
}
