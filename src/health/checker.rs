//! Periodic executor for compiled health schedules.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CheckDefinition, ScheduledProbe};

/// Availability of a single probe or of the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    /// No result yet
    Unknown,
    Up,
    Down,
}

/// Latest known state of one probe.
#[derive(Debug, Clone, Serialize)]
pub struct CheckState {
    pub status: AvailabilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub contiguous_fails: u32,
    #[serde(skip)]
    first_failure: Option<Instant>,
}

impl Default for CheckState {
    fn default() -> Self {
        Self {
            status: AvailabilityStatus::Unknown,
            timestamp: None,
            error: None,
            contiguous_fails: 0,
            first_failure: None,
        }
    }
}

impl CheckState {
    fn record(&mut self, definition: &CheckDefinition, outcome: Result<(), String>) {
        let now = Instant::now();
        self.timestamp = Some(Utc::now());

        match outcome {
            Ok(()) => {
                self.status = AvailabilityStatus::Up;
                self.error = None;
                self.contiguous_fails = 0;
                self.first_failure = None;
            }
            Err(message) => {
                self.contiguous_fails = self.contiguous_fails.saturating_add(1);
                let first_failure = *self.first_failure.get_or_insert(now);
                self.error = Some(message);

                let enough_failures =
                    self.contiguous_fails >= definition.max_contiguous_failures.max(1);
                let long_enough = now.duration_since(first_failure) >= definition.max_time_in_error;
                if enough_failures && long_enough {
                    self.status = AvailabilityStatus::Down;
                }
            }
        }
    }
}

/// Aggregated result served by the liveness endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CheckerResult {
    pub status: AvailabilityStatus,
    pub details: BTreeMap<String, CheckState>,
}

/// Runs every scheduled probe on its own task and keeps the latest states.
///
/// Tasks are aborted when the checker is stopped or dropped.
pub struct HealthChecker {
    states: Arc<RwLock<BTreeMap<String, CheckState>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthChecker {
    /// Spawn one periodic task per probe. Must be called inside a tokio runtime.
    pub fn start(schedule: Vec<ScheduledProbe>) -> Self {
        let states: BTreeMap<String, CheckState> = schedule
            .iter()
            .map(|probe| (probe.check.name.clone(), CheckState::default()))
            .collect();
        let states = Arc::new(RwLock::new(states));

        let tasks = schedule
            .into_iter()
            .map(|probe| tokio::spawn(run_periodic(probe, Arc::clone(&states))))
            .collect();

        Self { states, tasks }
    }

    /// Current aggregate result.
    pub fn result(&self) -> CheckerResult {
        let details = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let status = if details
            .values()
            .any(|state| state.status == AvailabilityStatus::Down)
        {
            AvailabilityStatus::Down
        } else if details
            .values()
            .any(|state| state.status == AvailabilityStatus::Unknown)
        {
            AvailabilityStatus::Unknown
        } else {
            AvailabilityStatus::Up
        };

        CheckerResult { status, details }
    }

    /// Abort all probe tasks.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_periodic(probe: ScheduledProbe, states: Arc<RwLock<BTreeMap<String, CheckState>>>) {
    tokio::time::sleep(probe.initial_delay).await;

    let period = probe.period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let definition = &probe.check;
        let outcome = match tokio::time::timeout(definition.timeout, (definition.check)()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "check timed out after {}ms",
                definition.timeout.as_millis()
            )),
        };

        match &outcome {
            Ok(()) => debug!(probe = %definition.name, "Health probe passed"),
            Err(error) => warn!(probe = %definition.name, error = %error, "Health probe failed"),
        }

        let mut states = states.write().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(definition.name.clone())
            .or_default()
            .record(definition, outcome);
    }
}
