//! Engine module.
//!
//! Reconciles one flow against many firewalls at once. Each firewall is
//! planned independently on a bounded pool of workers and the verdicts are
//! grouped for reporting.

use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::aggregate::aggregate;
use crate::catalog::AppDefaultCatalog;
use crate::error::{PolicyError, Result};
use crate::planner::plan_firewall;
use crate::types::{CandidateFlow, FirewallSnapshot, GroupedVerdict, Verdict};

/// Fallback worker count when available parallelism is unknown
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Engine options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum number of firewalls evaluated concurrently
    pub worker_threads: usize,
    /// Default ports for flows that name an application but no ports
    pub app_defaults: Option<Arc<AppDefaultCatalog>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            worker_threads: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(DEFAULT_WORKER_THREADS),
            app_defaults: None,
        }
    }
}

/// Options as written in a JSON config file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OptionsFile {
    worker_threads: Option<usize>,
    app_defaults_path: Option<PathBuf>,
}

impl EngineOptions {
    /// Create new engine options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set worker count.
    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    /// Set the application default-port catalog.
    pub fn with_app_defaults(mut self, catalog: AppDefaultCatalog) -> Self {
        self.app_defaults = Some(Arc::new(catalog));
        self
    }

    /// Load options from JSON, e.g.
    /// `{"worker_threads": 8, "app_defaults_path": "/etc/policy/apps.json"}`.
    /// Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: OptionsFile = serde_json::from_str(json)?;
        let mut options = Self::default();

        if let Some(workers) = file.worker_threads {
            if workers == 0 {
                return Err(PolicyError::ConfigError(
                    "worker_threads must be at least 1".to_string(),
                ));
            }
            options.worker_threads = workers;
        }
        if let Some(path) = file.app_defaults_path {
            options = options.with_app_defaults(AppDefaultCatalog::from_file(path)?);
        }
        Ok(options)
    }

    /// Load options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PolicyError::ConfigError(format!(
                "Failed to read options file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&text)
    }
}

/// Policy engine: plans a flow against every firewall's rulebase.
///
/// Holds no state between calls, so repeated calls with the same inputs
/// return the same verdicts.
pub struct PolicyEngine {
    options: EngineOptions,
}

impl PolicyEngine {
    /// Create a new engine.
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Plan the flow on every firewall and group identical verdicts.
    pub fn evaluate(
        &self,
        flow: &CandidateFlow,
        firewalls: &[FirewallSnapshot],
    ) -> Vec<GroupedVerdict> {
        aggregate(self.evaluate_each(flow, firewalls))
    }

    /// Plan the flow on every firewall, one verdict per firewall id.
    pub fn evaluate_each(
        &self,
        flow: &CandidateFlow,
        firewalls: &[FirewallSnapshot],
    ) -> BTreeMap<String, Verdict> {
        self.evaluate_with(flow, firewalls, |_, _| {})
    }

    /// Like `evaluate_each`, calling `on_result` as soon as each firewall finishes.
    ///
    /// Every firewall owns one result slot, written once by whichever worker
    /// planned it. The call returns after all workers are done.
    pub fn evaluate_with<F>(
        &self,
        flow: &CandidateFlow,
        firewalls: &[FirewallSnapshot],
        on_result: F,
    ) -> BTreeMap<String, Verdict>
    where
        F: Fn(&str, &Verdict) + Sync,
    {
        let flow = self.prepare(flow);
        let slots: Mutex<Vec<Option<Verdict>>> = Mutex::new(vec![None; firewalls.len()]);
        let next = AtomicUsize::new(0);
        let workers = self.options.worker_threads.clamp(1, firewalls.len().max(1));

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let slot = next.fetch_add(1, Ordering::Relaxed);
                    let Some(firewall) = firewalls.get(slot) else {
                        break;
                    };

                    let verdict = plan_firewall(&flow, firewall);
                    debug!(firewall = %firewall.id, ?verdict, "firewall planned");
                    on_result(&firewall.id, &verdict);
                    slots.lock()[slot] = Some(verdict);
                });
            }
        });

        collect_slots(firewalls, slots.into_inner())
    }

    /// Async variant of `evaluate`: each firewall is planned on tokio's
    /// blocking pool, at most `worker_threads` at a time. A task that fails
    /// yields `NoCandidate` for its firewall.
    #[cfg(feature = "async")]
    pub async fn evaluate_async(
        &self,
        flow: &CandidateFlow,
        firewalls: Vec<FirewallSnapshot>,
    ) -> Vec<GroupedVerdict> {
        use std::collections::HashSet;
        use tokio::sync::Semaphore;

        let flow = Arc::new(self.prepare(flow));
        let permits = Arc::new(Semaphore::new(self.options.worker_threads.max(1)));

        let mut handles = Vec::with_capacity(firewalls.len());
        for firewall in firewalls {
            let permit = Arc::clone(&permits).acquire_owned().await.ok();
            let flow = Arc::clone(&flow);
            let id = firewall.id.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                plan_firewall(&flow, &firewall)
            });
            handles.push((id, handle));
        }

        let mut verdicts = Vec::with_capacity(handles.len());
        let mut seen = HashSet::with_capacity(handles.len());
        for (id, handle) in handles {
            if !seen.insert(id.clone()) {
                warn!(firewall = %id, "duplicate firewall id, keeping the last snapshot");
            }
            let verdict = match handle.await {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(firewall = %id, error = %e, "firewall planning task failed");
                    Verdict::NoCandidate
                }
            };
            debug!(firewall = %id, ?verdict, "firewall planned");
            verdicts.push((id, verdict));
        }

        aggregate(verdicts)
    }

    /// Resolve application default ports once for all firewalls
    fn prepare(&self, flow: &CandidateFlow) -> CandidateFlow {
        match &self.options.app_defaults {
            Some(catalog) => catalog.resolve_ports(flow),
            None => flow.clone(),
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

fn collect_slots(
    firewalls: &[FirewallSnapshot],
    slots: Vec<Option<Verdict>>,
) -> BTreeMap<String, Verdict> {
    let mut verdicts = BTreeMap::new();
    for (firewall, verdict) in firewalls.iter().zip(slots) {
        let verdict = verdict.unwrap_or(Verdict::NoCandidate);
        if verdicts.insert(firewall.id.clone(), verdict).is_some() {
            warn!(firewall = %firewall.id, "duplicate firewall id, keeping the last snapshot");
        }
    }
    verdicts
}
