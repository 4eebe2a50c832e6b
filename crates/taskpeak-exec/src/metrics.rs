//! Tracing hooks for drained stage peaks.
//!
//! Wire these up to a real collector in the binary layer.

use std::collections::HashMap;

use taskpeak_core::{MetricLayout, MetricVector, StageKey};

pub fn emit_stage_peaks(layout: &MetricLayout, peaks: &HashMap<StageKey, MetricVector>) {
    let span = tracing::trace_span!("taskpeak", event = "stage_peaks", stages = peaks.len());
    let _entered = span.enter();
    for (key, values) in peaks {
        tracing::trace!(stage = %key, peaks = ?layout.named(values), "drained stage peaks");
    }
}
