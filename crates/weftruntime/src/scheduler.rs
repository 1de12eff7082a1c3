//! Job scheduling and dispatch.
//!
//! The scheduler is the single owner of job bookkeeping: registration,
//! readiness checks, parking of blocked jobs and resumption all happen
//! under one lock, so a job can never miss the write that unblocks it.
//! Task functions themselves run outside that lock, inline in synchronous
//! mode or on blocking worker threads in parallel mode.

use crate::data_node::DataNodeId;
use crate::error::{ExecutionError, PipelineError, SchedulingError};
use crate::graph;
use crate::job::{Job, JobCallback, JobId};
use crate::pipeline::Pipeline;
use crate::task::{Task, TaskId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use weftcore::{JobConfig, JobMode, TaskOutput, Value};

/// Asynchronous submission surface of the scheduler.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn submit_task(&self, task: &Task, callbacks: &[JobCallback]) -> Job;

    async fn submit_pipeline(
        &self,
        pipeline: &Pipeline,
        callbacks: &[JobCallback],
    ) -> Result<Vec<Job>, PipelineError>;
}

enum Executor {
    /// Runs each runnable job inline on the submitting thread, draining
    /// resumed jobs from a worklist.
    Synchronous,
    /// Spawns each job onto the tokio runtime; the semaphore caps how many
    /// task functions run at once.
    Parallel { workers: Arc<Semaphore> },
}

#[derive(Default)]
struct DispatchState {
    jobs: HashMap<JobId, Job>,
    /// Jobs waiting for a data node to become ready, keyed by that node.
    /// A job waiting on several nodes is parked under each of them.
    blocked: HashMap<DataNodeId, Vec<Job>>,
}

struct SchedulerInner {
    executor: Executor,
    state: Mutex<DispatchState>,
}

/// Dispatches jobs according to the job configuration it was built from.
/// Cloning is cheap and shares the same instance.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(config: &JobConfig) -> Self {
        let executor = match config.mode() {
            JobMode::Synchronous => Executor::Synchronous,
            JobMode::Parallel => Executor::Parallel {
                workers: Arc::new(Semaphore::new(config.nb_of_workers())),
            },
        };
        Self {
            inner: Arc::new(SchedulerInner {
                executor,
                state: Mutex::new(DispatchState::default()),
            }),
        }
    }

    /// Submits one task for execution and returns its job.
    ///
    /// If any input node is not ready for reading the job is parked as
    /// `Blocked`; it is resumed automatically once every input is ready.
    /// In synchronous mode a runnable job (and any job it unblocks) has
    /// finished by the time this returns.
    pub fn submit_task(&self, task: &Task, callbacks: &[JobCallback]) -> Job {
        let job = Job::new(task.clone());
        for callback in callbacks {
            job.on_status_change(callback.clone());
        }
        tracing::info!(job_id = %job.id(), task = task.config_name(), "job submitted");
        let runnable = {
            let mut state = self.inner.state.lock();
            state.jobs.insert(job.id(), job.clone());
            let unready: Vec<DataNodeId> = task
                .inputs()
                .iter()
                .filter(|node| !node.is_ready_for_reading())
                .map(|node| node.id())
                .collect();
            for node_id in &unready {
                state.blocked.entry(*node_id).or_default().push(job.clone());
            }
            unready.is_empty()
        };
        if runnable {
            self.dispatch(job.clone());
        } else {
            job.blocked();
        }
        job
    }

    /// Submits every task of the pipeline in dependency order and returns
    /// the jobs, one per task, in that order.
    ///
    /// An inconsistent (cyclic) pipeline is refused before any job is
    /// created.
    pub fn submit_pipeline(
        &self,
        pipeline: &Pipeline,
        callbacks: &[JobCallback],
    ) -> Result<Vec<Job>, PipelineError> {
        let waves = graph::sort_into_waves(pipeline.tasks()).map_err(|error| match error {
            PipelineError::CyclicDependency => {
                PipelineError::Inconsistent(pipeline.config_name().to_string())
            }
            other => other,
        })?;
        tracing::info!(
            pipeline_id = pipeline.id(),
            waves = waves.len(),
            "pipeline submitted"
        );
        let mut jobs = Vec::with_capacity(pipeline.tasks().len());
        for wave in waves {
            for task in wave {
                jobs.push(self.submit_task(&task, callbacks));
            }
        }
        Ok(jobs)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job, SchedulingError> {
        self.inner
            .state
            .lock()
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| SchedulingError::JobNotFound(id.to_string()))
    }

    /// All known jobs, oldest first.
    pub fn get_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.state.lock().jobs.values().cloned().collect();
        jobs.sort();
        jobs
    }

    /// The most recently created job for the given task, if any.
    pub fn get_latest_job(&self, task_id: TaskId) -> Option<Job> {
        self.inner
            .state
            .lock()
            .jobs
            .values()
            .filter(|job| job.task().id() == task_id)
            .max()
            .cloned()
    }

    /// Cancels a job that has not started running yet. Returns whether the
    /// cancellation took effect.
    pub fn cancel_job(&self, id: JobId) -> Result<bool, SchedulingError> {
        let job = self.get_job(id)?;
        let cancelled = job.try_cancel();
        if cancelled {
            let mut state = self.inner.state.lock();
            for parked in state.blocked.values_mut() {
                parked.retain(|blocked| blocked.id() != id);
            }
            state.blocked.retain(|_, parked| !parked.is_empty());
            tracing::info!(job_id = %id, "job cancelled");
        }
        Ok(cancelled)
    }

    /// Removes a finished job from the scheduler's bookkeeping.
    pub fn delete_job(&self, id: JobId) -> Result<(), SchedulingError> {
        let mut state = self.inner.state.lock();
        match state.jobs.get(&id) {
            None => Err(SchedulingError::JobNotFound(id.to_string())),
            Some(job) if !job.is_finished() => {
                Err(SchedulingError::JobNotFinished(id.to_string()))
            }
            Some(_) => {
                state.jobs.remove(&id);
                Ok(())
            }
        }
    }

    /// Removes every finished job.
    pub fn delete_finished_jobs(&self) {
        self.inner
            .state
            .lock()
            .jobs
            .retain(|_, job| !job.is_finished());
    }
}

#[async_trait]
impl Orchestrator for Scheduler {
    async fn submit_task(&self, task: &Task, callbacks: &[JobCallback]) -> Job {
        Scheduler::submit_task(self, task, callbacks)
    }

    async fn submit_pipeline(
        &self,
        pipeline: &Pipeline,
        callbacks: &[JobCallback],
    ) -> Result<Vec<Job>, PipelineError> {
        Scheduler::submit_pipeline(self, pipeline, callbacks)
    }
}

impl Scheduler {
    fn dispatch(&self, job: Job) {
        job.pending();
        match &self.inner.executor {
            Executor::Synchronous => self.run_synchronous(job),
            Executor::Parallel { workers } => self.spawn_parallel(job, workers.clone()),
        }
    }

    /// Inline execution: runs the job, then keeps draining every job its
    /// outputs unblocked.
    fn run_synchronous(&self, job: Job) {
        let mut queue = VecDeque::from([job]);
        while let Some(job) = queue.pop_front() {
            if !job.start_running() {
                continue;
            }
            let result = run_function(job.task());
            let resumed = self.finish(&job, result);
            for job in resumed {
                job.pending();
                queue.push_back(job);
            }
        }
    }

    fn spawn_parallel(&self, job: Job, workers: Arc<Semaphore>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore lives as long as the scheduler.
                Err(_) => return,
            };
            if !job.start_running() {
                return;
            }
            let task = job.task().clone();
            let outcome = tokio::task::spawn_blocking(move || run_function(&task)).await;
            drop(permit);
            let result = match outcome {
                Ok(result) => result,
                Err(join_error) => Err(ExecutionError::Panicked(join_error.to_string())),
            };
            let resumed = scheduler.finish(&job, result);
            for job in resumed {
                scheduler.dispatch(job);
            }
        });
    }

    /// Records the outcome of a run, writes outputs, and returns the jobs
    /// that became runnable because of those writes.
    fn finish(&self, job: &Job, result: Result<TaskOutput, ExecutionError>) -> Vec<Job> {
        let output = match result {
            Ok(output) => output,
            Err(error) => {
                tracing::error!(job_id = %job.id(), error = %error, "job failed");
                job.record_exception(error);
                job.failed();
                return Vec::new();
            }
        };
        let resumed = {
            let mut state = self.inner.state.lock();
            let outputs = job.task().outputs();
            let values: Option<Vec<Value>> = match output {
                TaskOutput::Single(value) if outputs.len() == 1 => Some(vec![value]),
                TaskOutput::Many(values) if values.len() == outputs.len() => Some(values),
                other => {
                    tracing::error!(
                        job_id = %job.id(),
                        task = job.task().config_name(),
                        returned = other.arity(),
                        expected = outputs.len(),
                        "task returned a different number of values than it has outputs; \
                         nothing was written"
                    );
                    None
                }
            };
            let mut candidates: Vec<Job> = Vec::new();
            if let Some(values) = values {
                for (node, value) in outputs.iter().zip(values) {
                    node.write_with_job(value, job.id());
                    if let Some(parked) = state.blocked.remove(&node.id()) {
                        for blocked in parked {
                            if !candidates.iter().any(|c| c.id() == blocked.id()) {
                                candidates.push(blocked);
                            }
                        }
                    }
                }
            }
            // A resumed candidate must have every input ready, not just the
            // one that woke it; otherwise it stays parked under the inputs
            // still missing.
            let mut resumed: Vec<Job> = Vec::new();
            for candidate in candidates {
                let unready: Vec<DataNodeId> = candidate
                    .task()
                    .inputs()
                    .iter()
                    .filter(|node| !node.is_ready_for_reading())
                    .map(|node| node.id())
                    .collect();
                if unready.is_empty() {
                    for parked in state.blocked.values_mut() {
                        parked.retain(|blocked| blocked.id() != candidate.id());
                    }
                    state.blocked.retain(|_, parked| !parked.is_empty());
                    resumed.push(candidate);
                } else {
                    for node_id in unready {
                        let parked = state.blocked.entry(node_id).or_default();
                        if !parked.iter().any(|blocked| blocked.id() == candidate.id()) {
                            parked.push(candidate.clone());
                        }
                    }
                }
            }
            resumed
        };
        job.completed();
        tracing::debug!(job_id = %job.id(), resumed = resumed.len(), "job completed");
        resumed
    }
}

/// Reads the task's inputs in order, runs its function, and folds failures
/// (including panics) into an execution error.
fn run_function(task: &Task) -> Result<TaskOutput, ExecutionError> {
    let args: Vec<Value> = task
        .inputs()
        .iter()
        .map(|node| node.read().unwrap_or(Value::Null))
        .collect();
    let function = task.function().clone();
    match catch_unwind(AssertUnwindSafe(move || function(args))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(message)) => Err(ExecutionError::FunctionFailed(message)),
        Err(payload) => Err(ExecutionError::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
