/*!
 * Structured Tracing
 * Subscriber setup and scenario spans using the tracing crate
 *
 * Features:
 * - `EnvFilter` driven by `RUST_LOG`
 * - JSON output for machine parsing, compact output for terminals
 * - Scenario spans that report duration and outcome on drop
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set to `1` or `true` for JSON log lines
pub const TRACE_JSON_ENV: &str = "SYNC_TOOLKIT_TRACE_JSON";

/// Scenarios running longer than this are reported at warn level
const SLOW_SCENARIO: Duration = Duration::from_secs(5);

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNC_TOOLKIT_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let initialized = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
    };

    if initialized.is_ok() {
        debug!(json = use_json, "tracing initialized");
    }
}

/// Debug-level subscriber for tests; ignores "already set"
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer().compact())
        .try_init();
}

/// Span covering one demo scenario run
pub struct ScenarioSpan {
    span: tracing::Span,
    start: Instant,
    scenario: &'static str,
    run_id: u64,
    succeeded: Option<bool>,
}

impl ScenarioSpan {
    pub fn new(scenario: &'static str) -> Self {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let span = span!(
            Level::INFO,
            "scenario",
            scenario = scenario,
            run_id = run_id,
            duration_ms = tracing::field::Empty,
            result = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            scenario,
            run_id,
            succeeded: None,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Enter the span so events on this thread are attributed to it
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn record_result(&mut self, success: bool) {
        self.succeeded = Some(success);
        self.span.record("result", if success { "success" } else { "error" });
    }
}

impl Drop for ScenarioSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);

        if duration > SLOW_SCENARIO {
            warn!(
                scenario = self.scenario,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow scenario"
            );
        } else {
            info!(
                scenario = self.scenario,
                duration_ms = duration.as_millis() as u64,
                success = ?self.succeeded,
                "scenario finished"
            );
        }
    }
}

/// Open a span for a demo scenario
pub fn span_scenario(scenario: &'static str) -> ScenarioSpan {
    ScenarioSpan::new(scenario)
}
