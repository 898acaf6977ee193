/*!
 * Monitoring
 * Tracing subscriber setup and scenario spans
 */

mod tracer;

pub use tracer::{init_test_tracing, init_tracing, span_scenario, ScenarioSpan, TRACE_JSON_ENV};
