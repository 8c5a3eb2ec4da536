//! Metrics/tracing hooks.
//!
//! Events are plain `tracing` records under the `tabseek` target; wire a
//! subscriber in the binary layer to collect them.

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::trace_span!(target: "tabseek", "metric", event);
    let _guard = span.enter();
    for (k, v) in key_values {
        tracing::trace!(target: "tabseek", %event, %k, %v, "metric");
    }
}
