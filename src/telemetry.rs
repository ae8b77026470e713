use std::time::Duration;

/// Telemetry events sent from the executor to the coordinator
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Executor spawned a suite's test command
    SuiteStarted { suite: String },
    /// A suite's test command exited
    SuiteFinished {
        suite: String,
        exit_code: i32,
        duration: Duration,
    },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub suites_started: usize,
    pub suites_passed: usize,
    pub suites_failed: usize,
    pub suite_durations: Vec<(String, Duration)>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::SuiteStarted { .. } => {
                self.suites_started += 1;
            }
            TelemetryEvent::SuiteFinished {
                suite,
                exit_code,
                duration,
            } => {
                if *exit_code == 0 {
                    self.suites_passed += 1;
                } else {
                    self.suites_failed += 1;
                }
                self.suite_durations.push((suite.clone(), *duration));
            }
        }
    }

    /// Time spent inside suite commands
    pub fn total_suite_time(&self) -> Duration {
        self.suite_durations.iter().map(|(_, d)| *d).sum()
    }

    /// Longest-running suite so far
    pub fn slowest(&self) -> Option<(&str, Duration)> {
        self.suite_durations
            .iter()
            .max_by_key(|(_, d)| *d)
            .map(|(name, d)| (name.as_str(), *d))
    }
}
