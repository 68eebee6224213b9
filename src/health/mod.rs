//! Health probe registry.
//!
//! Subsystems contribute named periodic probes through
//! [`HealthRegistry::register_checks`] without knowing about each other. The
//! registry never runs a probe: [`HealthRegistry::compile_schedule`]
//! translates the registered set into the [`ScheduledProbe`] list consumed by
//! the periodic [`HealthChecker`].

mod checker;

pub use checker::*;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

/// Future returned by a probe's check function.
pub type CheckFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Shareable check function. An `Err` means the checked service is unavailable.
pub type CheckFn = Arc<dyn Fn() -> CheckFuture + Send + Sync>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(10);

/// A named periodic check contributed by a subsystem.
#[derive(Clone)]
pub struct Probe {
    /// Must be unique across the registry.
    pub name: String,
    pub check: CheckFn,
    pub timeout: Duration,
    pub refresh_period: Duration,
    pub initial_delay: Duration,
    /// Contiguous failures before the probe is considered down.
    pub max_contiguous_failures: Option<u32>,
    /// Time spent failing before the probe is considered down.
    pub max_time_in_error: Option<Duration>,
}

impl Probe {
    /// Create a probe with default timing.
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(move || Box::pin(check()) as CheckFuture),
            timeout: DEFAULT_TIMEOUT,
            refresh_period: DEFAULT_REFRESH_PERIOD,
            initial_delay: Duration::ZERO,
            max_contiguous_failures: None,
            max_time_in_error: None,
        }
    }

    /// Abort a single check after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval between two checks.
    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    /// Wait before the first check.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Consider the probe down after this many failures in a row.
    pub fn with_max_contiguous_failures(mut self, failures: u32) -> Self {
        self.max_contiguous_failures = Some(failures);
        self
    }

    /// Consider the probe down after failing for this long.
    pub fn with_max_time_in_error(mut self, duration: Duration) -> Self {
        self.max_time_in_error = Some(duration);
        self
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("refresh_period", &self.refresh_period)
            .field("initial_delay", &self.initial_delay)
            .field("max_contiguous_failures", &self.max_contiguous_failures)
            .field("max_time_in_error", &self.max_time_in_error)
            .finish_non_exhaustive()
    }
}

/// Check definition in the shape the periodic checker consumes.
#[derive(Clone)]
pub struct CheckDefinition {
    pub name: String,
    pub timeout: Duration,
    /// Zero means a single failure is enough.
    pub max_contiguous_failures: u32,
    /// Zero means no grace period.
    pub max_time_in_error: Duration,
    pub check: CheckFn,
}

/// A check paired with its periodic schedule.
#[derive(Clone)]
pub struct ScheduledProbe {
    pub period: Duration,
    pub initial_delay: Duration,
    pub check: CheckDefinition,
}

impl fmt::Debug for ScheduledProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledProbe")
            .field("name", &self.check.name)
            .field("period", &self.period)
            .field("initial_delay", &self.initial_delay)
            .field("timeout", &self.check.timeout)
            .finish_non_exhaustive()
    }
}

/// Registry of health probes keyed by name.
///
/// Thread-safe; registering a probe under an existing name replaces it.
#[derive(Default)]
pub struct HealthRegistry {
    probes: RwLock<HashMap<String, Probe>>,
}

impl HealthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace probes by name. Probes with an empty name are dropped.
    pub fn register_checks(&self, probes: impl IntoIterator<Item = Probe>) {
        let mut registered = self.probes.write().unwrap_or_else(PoisonError::into_inner);

        for probe in probes {
            if probe.name.is_empty() {
                warn!("Ignoring health probe with empty name");
                continue;
            }

            // TODO: surface duplicate names as an error once every caller can handle it
            if registered.contains_key(&probe.name) {
                warn!(probe = %probe.name, "Replacing health probe registered under the same name");
            }

            debug!(probe = %probe.name, "Registered health probe");
            registered.insert(probe.name.clone(), probe);
        }
    }

    /// Translate the currently registered probes into the checker's schedule.
    ///
    /// Sorted by probe name.
    pub fn compile_schedule(&self) -> Vec<ScheduledProbe> {
        let registered = self.probes.read().unwrap_or_else(PoisonError::into_inner);

        let mut schedule: Vec<ScheduledProbe> = registered
            .values()
            .map(|probe| ScheduledProbe {
                period: probe.refresh_period,
                initial_delay: probe.initial_delay,
                check: CheckDefinition {
                    name: probe.name.clone(),
                    timeout: probe.timeout,
                    max_contiguous_failures: probe.max_contiguous_failures.unwrap_or(0),
                    max_time_in_error: probe.max_time_in_error.unwrap_or(Duration::ZERO),
                    check: Arc::clone(&probe.check),
                },
            })
            .collect();

        schedule.sort_by(|a, b| a.check.name.cmp(&b.check.name));
        schedule
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.probes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no probe is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
