// Replay engine: drives the baseline-request x other-roles matrix
// One run at a time, off the caller's thread. The work list is frozen from a
// registry snapshot at start, so concurrent capture cannot reshape a run.

use crate::classifier;
use crate::errors::MatrixError;
use crate::models::{TestResult, Verdict};
use crate::normalizer;
use crate::results::ResultStore;
use crate::roles::{Role, RoleStore};
use crate::transport::Transport;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Lifecycle of one testing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Idle | RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Cancelled => write!(f, "cancelled"),
            RunState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Progress sink observed by the controlling surface. Called from the replay
/// task after every processed pair.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, method: &str, url: &str);

    /// Called once when the run reaches a terminal state, with the number of
    /// results produced.
    fn on_finished(&self, _state: &RunState, _produced: usize) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_progress(&self, _completed: usize, _total: usize, _method: &str, _url: &str) {}
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Retain raw request/response bytes on each result.
    pub store_full_messages: bool,
    /// Fixed pause after each replayed pair; throttles request rate.
    pub request_delay: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            store_full_messages: true,
            request_delay: Duration::from_millis(20),
        }
    }
}

struct RunShared {
    cancel: AtomicBool,
    state: Mutex<RunState>,
}

impl RunShared {
    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn state(&self) -> RunState {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Cheap clonable cancellation trigger for a single run.
#[derive(Clone)]
pub struct Canceller {
    shared: Arc<RunShared>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }
}

/// Handle to an in-flight or finished run.
pub struct RunHandle {
    shared: Arc<RunShared>,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Request cooperative cancellation. The flag is checked before each
    /// pair; the in-flight transport call is never aborted mid-request.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    /// Cancellation trigger usable after the handle is consumed by [`wait`].
    ///
    /// [`wait`]: RunHandle::wait
    pub fn canceller(&self) -> Canceller {
        Canceller {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> RunState {
        if let Err(join_err) = self.task.await {
            // A panic that escaped the run loop; partial results are intact.
            if !self.shared.state().is_terminal() {
                self.shared
                    .set_state(RunState::Failed(format!("replay task aborted: {}", join_err)));
            }
        }
        self.shared.state()
    }
}

/// Executes replay runs against a transport.
pub struct ReplayEngine {
    transport: Arc<dyn Transport>,
    config: ReplayConfig,
    active: Arc<AtomicBool>,
}

impl ReplayEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ReplayConfig::default(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a testing run. Requires a baseline role and at least two roles;
    /// rejects a second run while one is active. Results accumulate into
    /// `results`, which is cleared first.
    pub fn start(
        &self,
        roles: &RoleStore,
        results: Arc<ResultStore>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<RunHandle, MatrixError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MatrixError::RunActive);
        }

        let snapshot = roles.snapshot();
        let precondition_failure = if snapshot.baseline.is_none() {
            Some("no baseline role is set")
        } else if snapshot.roles.len() < 2 {
            Some("at least two captured roles are required")
        } else if snapshot.baseline_role().is_none() {
            Some("baseline role no longer exists")
        } else {
            None
        };
        if let Some(reason) = precondition_failure {
            self.active.store(false, Ordering::SeqCst);
            return Err(MatrixError::Precondition(reason.to_string()));
        }

        let baseline = snapshot
            .baseline_role()
            .cloned()
            .expect("baseline checked above");
        let others: Vec<Role> = snapshot.other_roles().into_iter().cloned().collect();
        let total = baseline.requests.len() * others.len();

        results.clear();
        info!(
            baseline = %baseline.name,
            requests = baseline.requests.len(),
            roles = others.len(),
            total,
            "testing run started"
        );

        let shared = Arc::new(RunShared {
            cancel: AtomicBool::new(false),
            state: Mutex::new(RunState::Running),
        });

        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        let active = Arc::clone(&self.active);
        let task_shared = Arc::clone(&shared);

        let task = tokio::spawn(async move {
            let outcome = run_matrix(
                &baseline,
                &others,
                total,
                transport.as_ref(),
                &config,
                &results,
                observer.as_ref(),
                &task_shared,
            )
            .await;

            let produced = results.len();
            let final_state = match outcome {
                Ok(true) => RunState::Completed,
                Ok(false) => {
                    warn!(produced, "testing run cancelled");
                    RunState::Cancelled
                }
                Err(err) => {
                    error!(produced, error = %err, "testing run failed");
                    RunState::Failed(err.to_string())
                }
            };
            task_shared.set_state(final_state.clone());
            active.store(false, Ordering::SeqCst);
            observer.on_finished(&final_state, produced);
            info!(state = %final_state, produced, "testing run finished");
        });

        Ok(RunHandle { shared, task })
    }
}

/// Process the ordered work list. `Ok(true)` means completed, `Ok(false)`
/// cancelled; any `Err` transitions the run to FAILED with results appended
/// so far left intact.
#[allow(clippy::too_many_arguments)]
async fn run_matrix(
    baseline: &Role,
    others: &[Role],
    total: usize,
    transport: &dyn Transport,
    config: &ReplayConfig,
    results: &ResultStore,
    observer: &dyn ProgressObserver,
    shared: &RunShared,
) -> anyhow::Result<bool> {
    let mut completed = 0usize;

    for request in &baseline.requests {
        for role in others {
            if shared.cancel.load(Ordering::SeqCst) {
                return Ok(false);
            }

            let replay = normalizer::build_replay_request(request, role);
            let result = match transport.send(&replay.service, &replay).await {
                Ok(response) => {
                    let (verdict, details) =
                        classifier::classify(response.status, &response.headers);
                    info!(
                        verdict = %verdict,
                        method = %request.method,
                        url = %request.url,
                        role = %role.name,
                        status = response.status,
                        "pair replayed"
                    );
                    TestResult {
                        endpoint: request.url.clone(),
                        method: request.method.clone(),
                        role: role.name.clone(),
                        status: response.status,
                        verdict,
                        details,
                        request_bytes: config.store_full_messages.then(|| replay.to_bytes()),
                        response_bytes: config.store_full_messages.then(|| response.to_bytes()),
                        service: replay.service.clone(),
                    }
                }
                Err(err) => {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        role = %role.name,
                        error = %err,
                        "transport failure recorded as ERROR"
                    );
                    TestResult {
                        endpoint: request.url.clone(),
                        method: request.method.clone(),
                        role: role.name.clone(),
                        status: 0,
                        verdict: Verdict::Error,
                        details: format!("Request failed: {}", err),
                        request_bytes: config.store_full_messages.then(|| replay.to_bytes()),
                        response_bytes: None,
                        service: replay.service.clone(),
                    }
                }
            };

            results.append(result);
            completed += 1;

            // The observer is outside code; a panic there is an unexpected
            // run failure, not a reason to corrupt stored results.
            let notified = catch_unwind(AssertUnwindSafe(|| {
                observer.on_progress(completed, total, &request.method, &request.url);
            }));
            if notified.is_err() {
                anyhow::bail!("progress observer panicked after {} of {} pairs", completed, total);
            }

            tokio::time::sleep(config.request_delay).await;
        }
    }

    Ok(true)
}
