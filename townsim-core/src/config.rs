//! Simulation configuration.

use crate::clock::DEFAULT_STEP_MINUTES;
use std::time::Duration;

/// Tunables for a simulation context.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Minutes per hop, per tick and per schedule bucket.
    pub step_minutes: u16,

    /// Number of lines requested for each talk pool refill.
    pub talk_pool_size: usize,

    /// How many of an actor's latest memories go into a talk pool prompt.
    pub recent_memory_window: usize,

    /// Upper bound on a single enrichment call. `None` waits indefinitely.
    pub enrichment_timeout: Option<Duration>,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self {
            step_minutes: DEFAULT_STEP_MINUTES,
            talk_pool_size: 4,
            recent_memory_window: 5,
            enrichment_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Set the minutes one step takes.
    pub fn with_step_minutes(mut self, minutes: u16) -> Self {
        self.step_minutes = minutes.max(1);
        self
    }

    /// Set how many lines a talk pool refill asks for.
    pub fn with_talk_pool_size(mut self, size: usize) -> Self {
        self.talk_pool_size = size.max(1);
        self
    }

    /// Set how many recent memories feed talk prompts.
    pub fn with_recent_memory_window(mut self, window: usize) -> Self {
        self.recent_memory_window = window;
        self
    }

    /// Set or clear the per-call enrichment timeout.
    pub fn with_enrichment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.enrichment_timeout = timeout;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}
