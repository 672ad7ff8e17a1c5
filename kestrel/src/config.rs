//! Ambient, non-functional knobs for `simulate`/`simulate_incremental`.
//!
//! Gathered into one builder rather than threaded as a growing list of
//! optional positional parameters, so a future knob doesn't touch every call
//! site.

/// Engine-wide configuration for one simulation run.
#[derive(Clone, Debug, Default)]
pub struct SimulationConfig {
    stop_time: Option<u64>,
}

impl SimulationConfig {
    pub fn new() -> Self {
        SimulationConfig::default()
    }

    /// Stop once the next scheduled batch's time would be `>=` this value,
    /// retaining the rest of the schedule unrun.
    pub fn with_stop_time(mut self, stop_time: u64) -> Self {
        self.stop_time = Some(stop_time);
        self
    }

    pub fn stop_time(&self) -> Option<u64> {
        self.stop_time
    }
}
