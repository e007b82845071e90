//! Run orchestrator
//!
//! Expands trader profiles into independent path tasks and runs them in
//! sequential batches. Each task gets its own blocking thread and its own
//! generator; a batch is joined as a whole before the next one is
//! dispatched, so at most `concurrency_limit` paths are in flight.
//!
//! Results accumulate on the orchestrator after every batch join. A failed
//! or cancelled run keeps whatever earlier batches produced.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::simulator::simulate_with_entropy;
use crate::types::{GlobalParams, SimulationResult, SimulationTask, TraderProfile};

const MAX_PREALLOCATED_TASKS: usize = 1 << 16;

/// Build one task per requested path, in profile order
pub fn expand_tasks(global: &GlobalParams, profiles: &[TraderProfile]) -> Vec<SimulationTask> {
    let total = profiles
        .iter()
        .fold(0usize, |acc, p| acc.saturating_add(p.path_count));
    let mut tasks = Vec::with_capacity(total.min(MAX_PREALLOCATED_TASKS));

    for profile in profiles {
        let params = profile.merge(global);
        for index in 0..profile.path_count {
            tasks.push(SimulationTask {
                profile_id: profile.id.clone(),
                label: format!("{} #{}", profile.name, index + 1),
                params: params.clone(),
            });
        }
    }

    tasks
}

/// Paths finished so far out of the run total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub completed: usize,
    pub total: usize,
}

impl RunProgress {
    /// Fraction complete in [0, 1]; an empty run counts as complete
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Simulation task '{label}' failed: {message}")]
    TaskFailed { label: String, message: String },

    #[error("Run cancelled after {completed} of {total} paths")]
    Cancelled { completed: usize, total: usize },
}

/// Runs simulation tasks in bounded parallel batches
pub struct RunOrchestrator {
    config: RunnerConfig,
    cancel: CancellationToken,
    results: Vec<SimulationResult>,
}

impl RunOrchestrator {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            results: Vec::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Token that stops the next (or current) run at a batch boundary when
    /// cancelled. Every run ends by swapping in a fresh token, so a token
    /// only ever applies to one run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Results accumulated by the latest run, batch by batch
    pub fn results(&self) -> &[SimulationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<SimulationResult> {
        self.results
    }

    /// Simulate every path requested by `profiles`.
    ///
    /// `on_progress` is called after each batch with the overall progress and
    /// the results that batch appended. Returns the number of completed paths.
    pub async fn run<P>(
        &mut self,
        global: &GlobalParams,
        profiles: &[TraderProfile],
        on_progress: P,
    ) -> Result<usize, RunError>
    where
        P: FnMut(RunProgress, &[SimulationResult]),
    {
        let tasks = expand_tasks(global, profiles);
        self.run_tasks(tasks, on_progress, |task| {
            simulate_with_entropy(&task.params, &task.label, &task.profile_id)
        })
        .await
    }

    /// Run prepared tasks through `simulate_path`, one blocking thread per task.
    ///
    /// A batch is all-or-nothing: if any of its tasks fails, none of its
    /// results are kept and no later batch is dispatched.
    pub async fn run_tasks<P, S>(
        &mut self,
        tasks: Vec<SimulationTask>,
        on_progress: P,
        simulate_path: S,
    ) -> Result<usize, RunError>
    where
        P: FnMut(RunProgress, &[SimulationResult]),
        S: Fn(&SimulationTask) -> SimulationResult + Send + Sync + 'static,
    {
        let outcome = self.run_batches(tasks, on_progress, simulate_path).await;
        self.cancel = CancellationToken::new();
        outcome
    }

    async fn run_batches<P, S>(
        &mut self,
        mut tasks: Vec<SimulationTask>,
        mut on_progress: P,
        simulate_path: S,
    ) -> Result<usize, RunError>
    where
        P: FnMut(RunProgress, &[SimulationResult]),
        S: Fn(&SimulationTask) -> SimulationResult + Send + Sync + 'static,
    {
        self.results.clear();

        let total = tasks.len();
        if total == 0 {
            info!("No simulation tasks, nothing to run");
            on_progress(RunProgress { completed: 0, total: 0 }, &[]);
            return Ok(0);
        }

        let batch_size = self.config.batch_size();
        let simulate_path = Arc::new(simulate_path);
        let start = Instant::now();
        let mut completed = 0usize;

        info!(
            "Running {} paths in batches of {} ({} batches)",
            total,
            batch_size,
            total.div_ceil(batch_size)
        );

        while !tasks.is_empty() {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled after {}/{} paths", completed, total);
                return Err(RunError::Cancelled { completed, total });
            }

            let rest = tasks.split_off(batch_size.min(tasks.len()));
            let batch = std::mem::replace(&mut tasks, rest);
            let labels: Vec<String> = batch.iter().map(|t| t.label.clone()).collect();

            let handles = batch.into_iter().map(|task| {
                let simulate_path = Arc::clone(&simulate_path);
                tokio::task::spawn_blocking(move || simulate_path(&task))
            });
            let joined = join_all(handles).await;

            let mut batch_results = Vec::with_capacity(joined.len());
            for (label, outcome) in labels.into_iter().zip(joined) {
                match outcome {
                    Ok(result) => batch_results.push(result),
                    Err(e) => {
                        let message = join_error_message(e);
                        error!("Path {} failed: {}", label, message);
                        return Err(RunError::TaskFailed { label, message });
                    }
                }
            }

            let appended_from = self.results.len();
            completed += batch_results.len();
            self.results.extend(batch_results);

            let progress = RunProgress { completed, total };
            debug!(
                "[{}/{}] {:.1}% after {:.2}s",
                completed,
                total,
                progress.percent(),
                start.elapsed().as_secs_f64()
            );
            on_progress(progress, &self.results[appended_from..]);

            // Let progress consumers run before the next batch
            tokio::task::yield_now().await;
        }

        info!(
            "Completed {} paths in {:.2}s",
            completed,
            start.elapsed().as_secs_f64()
        );

        Ok(completed)
    }
}

fn join_error_message(e: JoinError) -> String {
    if e.is_panic() {
        let payload = e.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            return msg.to_string();
        }
        if let Some(msg) = payload.downcast_ref::<String>() {
            return msg.clone();
        }
        return "task panicked".to_string();
    }
    e.to_string()
}
